//! XLI chunk sequencer.
//!
//! The base64-decoded waveform buffer is a concatenation of one chunk per
//! lead, in canonical lead order:
//!
//! ```text
//! offset  size  field
//! 0       4     payload length L (u32, little endian)
//! 4       2     code (unused)
//! 6       2     seed (i16, little endian), first difference term
//! 8       L     10-bit LZW payload
//! ```
//!
//! Decoding runs in two phases: every chunk is expanded and delta-decoded
//! into its lead, then the derived leads are rebuilt from I and II.

use log::{debug, warn};

use crate::options::{DecodeOptions, LayoutHints, LeadLayout};
use crate::record::{DocumentVersion, EcgRecord, Lead, LEAD_NAMES, MAX_SAMPLES_PER_LEAD};
use crate::{base64, delta, lzw, reconstruct, Error, Result};

/// Size of the fixed chunk header.
pub const CHUNK_HEADER_LEN: usize = 8;

/// A view of one chunk inside the decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedChunk<'a> {
    offset: usize,
    code: i16,
    seed: i16,
    payload: &'a [u8],
}

impl<'a> EncodedChunk<'a> {
    /// Reads the chunk starting at `offset`.
    ///
    /// # Errors
    ///
    /// `TruncatedChunk` if the header or the declared payload extends past
    /// the end of `buffer`.
    pub fn parse(buffer: &'a [u8], offset: usize) -> Result<Self> {
        let rest = buffer.get(offset..).unwrap_or_default();
        let Some(header) = rest.first_chunk::<CHUNK_HEADER_LEN>() else {
            return Err(Error::TruncatedChunk {
                offset,
                needed: CHUNK_HEADER_LEN,
                available: rest.len(),
            });
        };

        let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let code = i16::from_le_bytes([header[4], header[5]]);
        let seed = i16::from_le_bytes([header[6], header[7]]);

        let needed = size.saturating_add(CHUNK_HEADER_LEN);
        if needed > rest.len() {
            return Err(Error::TruncatedChunk { offset, needed, available: rest.len() });
        }

        Ok(Self {
            offset,
            code,
            seed,
            payload: &rest[CHUNK_HEADER_LEN..needed],
        })
    }

    /// Offset of the chunk in the decoded buffer.
    pub fn offset(&self) -> usize { self.offset }
    /// Header bytes 4..6; carried but not interpreted.
    pub fn code(&self) -> i16 { self.code }
    /// Initial difference term.
    pub fn seed(&self) -> i16 { self.seed }
    /// Compressed LZW payload.
    pub fn payload(&self) -> &'a [u8] { self.payload }

    /// Bytes this chunk occupies in the buffer (`L + 8`).
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + CHUNK_HEADER_LEN
    }
}

/// Expands and delta-decodes one chunk into `samples` values.
///
/// Expansions shorter than `2 * samples` bytes are zero-filled, or
/// rejected with `ShortExpansion` when `strict_length` is set.
///
/// # Errors
///
/// `InvalidOptions` if `samples` exceeds [`MAX_SAMPLES_PER_LEAD`].
pub fn decode_chunk(chunk: &EncodedChunk<'_>, samples: usize, strict_length: bool) -> Result<Vec<i16>> {
    if samples > MAX_SAMPLES_PER_LEAD {
        return Err(Error::InvalidOptions(
            format!("samples per lead must be at most {MAX_SAMPLES_PER_LEAD}, got {samples}").into(),
        ));
    }
    let capacity = samples * 2;
    let mut expanded = lzw::expand(chunk.payload(), capacity)?;
    if expanded.len() < capacity {
        if strict_length {
            return Err(Error::ShortExpansion { expected: capacity, actual: expanded.len() });
        }
        warn!(
            "chunk at offset {} expanded to {} of {} bytes, zero-filling",
            chunk.offset(),
            expanded.len(),
            capacity
        );
        expanded.resize(capacity, 0);
    }
    Ok(delta::decode_deltas(&expanded, samples, chunk.seed()))
}

/// Decodes all leads in `buffer` using defaults for anything `options`
/// leaves unset.
pub fn decode_leads(buffer: &[u8], version: DocumentVersion, options: &DecodeOptions) -> Result<EcgRecord> {
    let layout = options.resolve(LayoutHints::default())?;
    decode_with_layout(buffer, version, &layout, options.strict_length())
}

/// Decodes up to `layout.lead_count` leads, then rebuilds the derived leads.
///
/// Stops early when the buffer is exhausted; the record then holds fewer
/// leads. The first failing chunk aborts the whole record.
pub fn decode_with_layout(
    buffer: &[u8],
    version: DocumentVersion,
    layout: &LeadLayout,
    strict_length: bool,
) -> Result<EcgRecord> {
    let mut record = EcgRecord::new(version);
    let mut offset = 0usize;

    for (index, &name) in LEAD_NAMES.iter().enumerate().take(layout.lead_count) {
        if offset >= buffer.len() {
            break;
        }
        let chunk = EncodedChunk::parse(buffer, offset).map_err(|e| e.in_lead(index, name))?;
        debug!(
            "lead {name}: chunk at {offset}, {} payload bytes, seed {}",
            chunk.payload().len(),
            chunk.seed()
        );
        let samples = decode_chunk(&chunk, layout.samples_per_lead, strict_length)
            .map_err(|e| e.in_lead(index, name))?;
        record.push(Lead::named(index, layout.lead_name(index), samples, layout.duration_ms));
        offset += chunk.encoded_len();
    }

    if offset < buffer.len() {
        debug!("{} trailing bytes after {} leads ignored", buffer.len() - offset, record.valid());
    }

    reconstruct::reconstruct_derived_leads(&mut record);
    Ok(record)
}

/// How the waveform text is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformEncoding {
    /// `dataencoding == "Base64"`.
    pub is_base64: bool,
    /// The waveforms are XLI-compressed.
    pub is_xli: bool,
    /// Document schema version.
    pub version: DocumentVersion,
    /// Counts and labels declared by the document.
    pub hints: LayoutHints,
}

impl WaveformEncoding {
    /// Base64 + XLI with no document hints.
    pub fn xli(version: DocumentVersion) -> Self {
        Self {
            is_base64: true,
            is_xli: true,
            version,
            hints: LayoutHints::default(),
        }
    }
}

/// Decodes base64 XLI waveform text into a record.
///
/// # Errors
///
/// `UnsupportedEncoding` unless the text is Base64 + XLI; nothing is
/// decoded in that case.
pub fn decode_waveforms(text: &str, encoding: &WaveformEncoding, options: &DecodeOptions) -> Result<EcgRecord> {
    if !encoding.is_base64 || !encoding.is_xli {
        return Err(Error::unsupported_encoding(
            if encoding.is_base64 { "Base64" } else { "" },
            if encoding.is_xli { "XLI" } else { "" },
        ));
    }
    let layout = options.resolve(encoding.hints.clone())?;

    let buffer = base64::decode(text.as_bytes())?;
    if buffer.is_empty() {
        return Err(Error::EmptyWaveformData);
    }
    debug!(
        "decoded {} waveform bytes, expecting {} leads x {} samples",
        buffer.len(),
        layout.lead_count,
        layout.samples_per_lead
    );
    decode_with_layout(&buffer, encoding.version, &layout, options.strict_length())
}
