//! Base64 decoding for XML-embedded waveform text.
//!
//! The waveform element content is standard-alphabet base64 wrapped in
//! arbitrary whitespace (line breaks, indentation). Only bytes in the
//! range `'+'..='z'` (43..=122) are looked up; everything else is
//! skipped without consuming an output slot.
//!
//! The output length is computed before decoding:
//! `significant / 4 * 3 - trailing_padding`, where `significant` counts
//! alphabet characters and `=`.

use crate::{Error, Result};

/// First byte covered by the decode table (`'+'`).
const TABLE_FIRST: u8 = 43;

/// Last byte covered by the decode table (`'z'`).
const TABLE_LAST: u8 = 122;

const TABLE_LEN: usize = (TABLE_LAST - TABLE_FIRST + 1) as usize;

/// Table entry: byte is ignored.
const IGNORE: u8 = 0xFF;

/// Table entry: padding character `=`.
const PAD: u8 = 0xFE;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Offset table for bytes 43..=122: 6-bit value, [`PAD`] or [`IGNORE`].
static DECODE_TABLE: [u8; TABLE_LEN] = build_decode_table();

const fn build_decode_table() -> [u8; TABLE_LEN] {
    let mut table = [IGNORE; TABLE_LEN];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[(ALPHABET[i] - TABLE_FIRST) as usize] = i as u8;
        i += 1;
    }
    table[(b'=' - TABLE_FIRST) as usize] = PAD;
    table
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Symbol {
    Value(u8),
    Pad,
    Ignore,
}

#[inline(always)]
fn classify(byte: u8) -> Symbol {
    if !(TABLE_FIRST..=TABLE_LAST).contains(&byte) {
        return Symbol::Ignore;
    }
    match DECODE_TABLE[(byte - TABLE_FIRST) as usize] {
        IGNORE => Symbol::Ignore,
        PAD => Symbol::Pad,
        v => Symbol::Value(v),
    }
}

/// Computes the exact decoded length of `input`.
///
/// Fails with `InvalidBase64` when padding is inconsistent: more than two
/// `=`, data after `=`, or a significant character count that is not a
/// multiple of four.
pub fn decoded_len(input: &[u8]) -> Result<usize> {
    let mut significant = 0usize;
    let mut padding = 0usize;

    for &byte in input {
        match classify(byte) {
            Symbol::Ignore => {}
            Symbol::Pad => {
                padding += 1;
                significant += 1;
                if padding > 2 {
                    return Err(Error::invalid_base64("more than two padding characters"));
                }
            }
            Symbol::Value(_) => {
                if padding > 0 {
                    return Err(Error::invalid_base64("data after padding"));
                }
                significant += 1;
            }
        }
    }

    // Eine unvollständige Endgruppe wird abgewiesen, nicht auf count/4*3 abgerundet.
    if significant % 4 != 0 {
        return Err(Error::invalid_base64(format!(
            "{significant} significant characters is not a multiple of 4"
        )));
    }
    // "A===" wurde oben abgewiesen; "AB==" / "ABC=" sind die einzigen Formen.
    Ok(significant / 4 * 3 - padding)
}

/// Decodes base64 `input`, skipping whitespace and bytes outside the alphabet.
///
/// Empty input (or input without a single alphabet character) decodes to
/// an empty buffer.
pub fn decode(input: &[u8]) -> Result<Vec<u8>> {
    let len = decoded_len(input)?;
    let mut out = Vec::with_capacity(len + 2);

    let mut group = [0u8; 4];
    let mut filled = 0usize;
    for &byte in input {
        let value = match classify(byte) {
            Symbol::Ignore => continue,
            Symbol::Pad => 0,
            Symbol::Value(v) => v,
        };
        group[filled] = value;
        filled += 1;
        if filled == 4 {
            out.push((group[0] << 2) | (group[1] >> 4));
            out.push((group[1] << 4) | (group[2] >> 2));
            out.push((group[2] << 6) | group[3]);
            filled = 0;
        }
    }

    // Padding-Bytes wurden als 0 dekodiert und werden hier abgeschnitten.
    out.truncate(len);
    debug_assert_eq!(out.len(), len);
    Ok(out)
}
