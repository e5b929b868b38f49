//! Bit-level code reader and bounded byte sink for the XLI decompressor.
//!
//! XLI packs LZW codes MSB-first: the first code occupies the most
//! significant bits of the first payload byte.

use crate::{Error, Result};

/// Bits held in the accumulator.
const ACCUM_BITS: u8 = 32;

/// Refill while at most this many bits are buffered.
const REFILL_THRESHOLD: u8 = 24;

/// Reads fixed-width codes from a byte slice, MSB first.
///
/// Verwendet einen u32-Akkumulator: Bytes werden linksbündig nachgeladen,
/// solange höchstens 24 Bits gepuffert sind. Am Ende der Eingabe wird
/// nicht über das Slice hinaus gelesen.
#[derive(Clone, Copy, Debug)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    /// Nächstes ungelesenes Byte in data.
    byte_pos: usize,
    /// Akkumulator: `accum_bits` gültige Bits, linksbündig (Bit 31 = ältestes).
    accum: u32,
    /// Anzahl gültiger Bits im Akkumulator (0..=32).
    accum_bits: u8,
}

impl<'a> BitCursor<'a> {
    /// Creates a new cursor over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, byte_pos: 0, accum: 0, accum_bits: 0 }
    }

    #[inline(always)]
    fn refill(&mut self) {
        while self.accum_bits <= REFILL_THRESHOLD && self.byte_pos < self.data.len() {
            self.accum |= u32::from(self.data[self.byte_pos]) << (REFILL_THRESHOLD - self.accum_bits);
            self.byte_pos += 1;
            self.accum_bits += 8;
        }
    }

    /// Reads the next `width`-bit code.
    ///
    /// Returns `None` once fewer than `width` bits are left; trailing
    /// padding bits are never interpreted as a code.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `width` is 0 or greater than 16.
    #[inline]
    pub fn read_code(&mut self, width: u8) -> Option<u16> {
        debug_assert!((1..=16).contains(&width), "code width must be 1..=16, got {width}");
        self.refill();
        if self.accum_bits < width {
            return None;
        }
        let code = self.accum >> (ACCUM_BITS - width);
        self.accum <<= width;
        self.accum_bits -= width;
        Some(code as u16)
    }

    /// Returns the number of bits consumed so far.
    pub(crate) fn bit_position(&self) -> usize {
        self.byte_pos * 8 - self.accum_bits as usize
    }

    /// Returns the number of unread bits.
    #[cfg(test)]
    pub(crate) fn remaining_bits(&self) -> usize {
        (self.data.len() - self.byte_pos) * 8 + self.accum_bits as usize
    }
}

/// Largest up-front allocation of a [`BoundedWriter`].
const PREALLOC_LIMIT: usize = 1 << 16;

/// Byte sink with a hard capacity.
///
/// Jeder Schreibzugriff prüft vorher die Kapazität; bei Überschreitung
/// wird `OutputOverflow` zurückgegeben und nichts geschrieben.
#[derive(Debug)]
pub struct BoundedWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl BoundedWriter {
    /// Creates an empty writer that accepts at most `capacity` bytes.
    ///
    /// Reserviert vorab höchstens 64 KiB, unabhängig von `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity.min(PREALLOC_LIMIT)), capacity }
    }

    /// Appends one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() >= self.capacity {
            return Err(Error::OutputOverflow { capacity: self.capacity });
        }
        self.buf.push(byte);
        Ok(())
    }

    /// Appends `bytes` in reverse order (LZW decode stacks are last-byte-first).
    pub fn extend_reversed(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.remaining() {
            return Err(Error::OutputOverflow { capacity: self.capacity });
        }
        self.buf.extend(bytes.iter().rev());
        Ok(())
    }

    /// Bytes written so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of bytes this writer accepts.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes that may still be written.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Returns the written bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
