//! 10-bit LZW expansion used by XLI chunks.
//!
//! Classic Nelson-style LZW: codes 0..=255 are literal bytes, the
//! dictionary grows from [`FIRST_CODE`] up to [`MAX_CODE`] and then stays
//! frozen, and [`MAX_VALUE`] terminates the stream.
//!
//! ```text
//! payload ──BitCursor──▶ code ──DictionaryTable──▶ decode stack ──reverse──▶ BoundedWriter
//! ```

use log::{debug, trace};

use crate::bitstream::{BitCursor, BoundedWriter};
use crate::{Error, Result};

/// Width of every code in the stream.
pub const CODE_BITS: u8 = 10;

/// End-of-data sentinel (all code bits set).
pub const MAX_VALUE: u16 = (1 << CODE_BITS) - 1;

/// Highest code the dictionary may define.
pub const MAX_CODE: u16 = MAX_VALUE - 1;

/// First non-literal code.
pub const FIRST_CODE: u16 = 256;

const TABLE_SIZE: usize = MAX_CODE as usize + 1;

/// LZW string table: `prefix_of[code]` + `append_char_of[code]`.
///
/// Einträge unter [`FIRST_CODE`] sind implizit (Literal-Bytes) und werden
/// nie gelesen.
#[derive(Clone)]
pub struct DictionaryTable {
    prefix_of: [u16; TABLE_SIZE],
    append_char_of: [u8; TABLE_SIZE],
    next_code: u16,
}

impl DictionaryTable {
    /// Creates a table containing only the 256 literal codes.
    pub fn new() -> Self {
        Self {
            prefix_of: [0; TABLE_SIZE],
            append_char_of: [0; TABLE_SIZE],
            next_code: FIRST_CODE,
        }
    }

    /// The code the next [`insert`](Self::insert) will define.
    pub fn next_code(&self) -> u16 {
        self.next_code
    }

    /// Number of non-literal entries defined so far.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        usize::from(self.next_code - FIRST_CODE)
    }

    /// True if no non-literal entry is defined.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.next_code == FIRST_CODE
    }

    /// True once [`MAX_CODE`] has been defined; further inserts are ignored.
    pub fn is_saturated(&self) -> bool {
        self.next_code > MAX_CODE
    }

    /// True if `code` is a literal or an already defined entry.
    pub(crate) fn contains(&self, code: u16) -> bool {
        code < self.next_code
    }

    /// Defines `next_code` as `string(prefix) + ch`.
    ///
    /// Returns `false` (and changes nothing) when the table is saturated.
    pub fn insert(&mut self, prefix: u16, ch: u8) -> bool {
        if self.is_saturated() {
            return false;
        }
        let code = usize::from(self.next_code);
        self.prefix_of[code] = prefix;
        self.append_char_of[code] = ch;
        self.next_code += 1;
        if self.is_saturated() {
            trace!("LZW dictionary saturated at code {MAX_CODE}");
        }
        true
    }

    /// Pushes the string for `code` onto `stack`, last byte first, and
    /// returns its first byte.
    ///
    /// The walk is bounded by [`MAX_CODE`] steps; a longer chain can only
    /// come from a corrupted table and yields `PrefixChainOverrun`.
    pub fn push_string(&self, code: u16, stack: &mut Vec<u8>) -> Result<u8> {
        debug_assert!(self.contains(code), "push_string({code}) on undefined code");
        let mut current = code;
        let mut steps: u16 = 0;
        while current >= FIRST_CODE {
            if steps >= MAX_CODE {
                return Err(Error::PrefixChainOverrun { code });
            }
            let idx = usize::from(current);
            stack.push(self.append_char_of[idx]);
            current = self.prefix_of[idx];
            steps += 1;
        }
        let first = current as u8;
        stack.push(first);
        Ok(first)
    }
}

impl Default for DictionaryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DictionaryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryTable")
            .field("next_code", &self.next_code)
            .field("saturated", &self.is_saturated())
            .finish()
    }
}

/// Expands one LZW payload.
///
/// Owns its cursor, table and decode stack; nothing is shared between
/// decoders.
pub struct LzwDecoder<'a> {
    cursor: BitCursor<'a>,
    table: DictionaryTable,
    stack: Vec<u8>,
}

impl<'a> LzwDecoder<'a> {
    /// Creates a decoder over a compressed payload.
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            cursor: BitCursor::new(payload),
            table: DictionaryTable::new(),
            // Längster möglicher String: MAX_CODE Kettenglieder + Literal + KwKwK-Byte.
            stack: Vec::with_capacity(TABLE_SIZE + 2),
        }
    }

    /// The dictionary in its current state.
    pub fn dictionary(&self) -> &DictionaryTable {
        &self.table
    }

    /// Decodes the whole payload into at most `capacity` bytes.
    ///
    /// Stops at the [`MAX_VALUE`] sentinel or when the payload runs out
    /// of complete codes.
    pub fn decode(&mut self, capacity: usize) -> Result<Vec<u8>> {
        let mut out = BoundedWriter::new(capacity);

        let first = self.cursor.read_code(CODE_BITS).ok_or(Error::EmptyCodeStream)?;
        if first >= FIRST_CODE {
            return Err(Error::InvalidFirstCode(first));
        }
        let mut old_code = first;
        let mut character = first as u8;
        out.push(character)?;

        let mut terminated = false;
        while let Some(new_code) = self.cursor.read_code(CODE_BITS) {
            if new_code == MAX_VALUE {
                terminated = true;
                break;
            }

            self.stack.clear();
            let next_code = self.table.next_code();
            if new_code < next_code {
                character = self.table.push_string(new_code, &mut self.stack)?;
            } else if new_code == next_code {
                // KwKwK: string(old) + erstes Byte von string(old)
                self.stack.push(character);
                character = self.table.push_string(old_code, &mut self.stack)?;
            } else {
                return Err(Error::UndefinedCode { code: new_code, next_code });
            }

            out.extend_reversed(&self.stack)?;
            self.table.insert(old_code, character);
            old_code = new_code;
        }

        if !terminated {
            debug!(
                "LZW payload ended without sentinel after {} bits",
                self.cursor.bit_position()
            );
        }
        Ok(out.into_vec())
    }
}

/// Expands `payload` into at most `capacity` bytes.
pub fn expand(payload: &[u8], capacity: usize) -> Result<Vec<u8>> {
    LzwDecoder::new(payload).decode(capacity)
}
