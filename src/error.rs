//! Central error types for the Sierra ECG decoder.
//!
//! Every variant belongs to exactly one [`ErrorKind`]. The kind is what
//! callers match on; the variant carries the context for the message.

use core::fmt;
use std::borrow::Cow;

/// Coarse classification of every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Base64 alphabet/padding violation or a chunk header that does not
    /// fit the remaining buffer.
    MalformedInput,
    /// LZW code stream references an undefined entry or overruns the
    /// prefix chain.
    CorruptStream,
    /// Waveforms are not Base64 + XLI, or the document version is unknown.
    UnsupportedEncoding,
    /// Expansion would exceed the declared output capacity.
    BufferOverflow,
    /// The XML document is not shaped like a Sierra ECG document.
    Document,
    /// Invalid [`DecodeOptions`](crate::options::DecodeOptions).
    Config,
    /// Reading or writing failed.
    Io,
}

/// All errors produced while decoding a Sierra ECG document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Base64 text violates the padding rules.
    InvalidBase64(Cow<'static, str>),
    /// The waveform element decoded to zero bytes.
    EmptyWaveformData,
    /// A chunk header or payload extends past the end of the decoded buffer.
    TruncatedChunk {
        /// Offset of the chunk in the decoded buffer.
        offset: usize,
        /// Bytes the chunk claims (header + payload).
        needed: usize,
        /// Bytes left in the buffer from `offset`.
        available: usize,
    },
    /// The LZW expansion produced fewer bytes than the lead requires
    /// (only raised with `strict_length`).
    ShortExpansion { expected: usize, actual: usize },
    /// The LZW payload does not contain a single complete code.
    EmptyCodeStream,
    /// The first LZW code must be a literal byte (< 256).
    InvalidFirstCode(u16),
    /// A code references a dictionary entry that was never defined.
    ///
    /// `code == next_code` is the legal KwKwK case and never reported.
    UndefinedCode { code: u16, next_code: u16 },
    /// Walking the prefix chain of `code` took more than `MAX_CODE` steps.
    PrefixChainOverrun { code: u16 },
    /// The expansion would write past `capacity` bytes.
    OutputOverflow { capacity: usize },
    /// Waveform data is not Base64-encoded XLI.
    UnsupportedEncoding {
        /// Value of `dataencoding` (empty when missing).
        encoding: Cow<'static, str>,
        /// Compression method (empty when missing or not compressed).
        compression: Cow<'static, str>,
    },
    /// `documentversion` is neither 1.03 nor 1.04.
    UnsupportedVersion(String),
    /// `documenttype` is neither `SierraECG` nor `PhilipsECG`.
    UnsupportedDocumentType(String),
    /// XML parsing failed.
    XmlParseError(String),
    /// A required element is missing.
    MissingElement(Cow<'static, str>),
    /// An element that must be unique appears more than once.
    DuplicateElement(Cow<'static, str>),
    /// Invalid decode options.
    InvalidOptions(Cow<'static, str>),
    /// An IO error while reading or writing a document.
    IoError(String),
    /// Decoding a single lead failed; wraps the underlying error.
    Lead {
        /// Canonical lead index (0 = I).
        index: usize,
        /// Lead name.
        name: &'static str,
        /// Underlying failure.
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the taxonomy kind of this error.
    ///
    /// [`Error::Lead`] reports the kind of the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBase64(_)
            | Self::EmptyWaveformData
            | Self::TruncatedChunk { .. }
            | Self::ShortExpansion { .. } => ErrorKind::MalformedInput,
            Self::EmptyCodeStream
            | Self::InvalidFirstCode(_)
            | Self::UndefinedCode { .. }
            | Self::PrefixChainOverrun { .. } => ErrorKind::CorruptStream,
            Self::OutputOverflow { .. } => ErrorKind::BufferOverflow,
            Self::UnsupportedEncoding { .. }
            | Self::UnsupportedVersion(_)
            | Self::UnsupportedDocumentType(_) => ErrorKind::UnsupportedEncoding,
            Self::XmlParseError(_) | Self::MissingElement(_) | Self::DuplicateElement(_) => {
                ErrorKind::Document
            }
            Self::InvalidOptions(_) => ErrorKind::Config,
            Self::IoError(_) => ErrorKind::Io,
            Self::Lead { source, .. } => source.kind(),
        }
    }

    /// Erstellt einen `InvalidBase64` Fehler mit Nachricht.
    pub fn invalid_base64(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidBase64(msg.into())
    }

    /// Erstellt einen `UnsupportedEncoding` Fehler aus den Attributwerten.
    pub fn unsupported_encoding(
        encoding: impl Into<Cow<'static, str>>,
        compression: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedEncoding {
            encoding: encoding.into(),
            compression: compression.into(),
        }
    }

    /// Wraps `self` with the lead it occurred in.
    pub fn in_lead(self, index: usize, name: &'static str) -> Self {
        Self::Lead {
            index,
            name,
            source: Box::new(self),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBase64(msg) => write!(f, "malformed base64 input: {msg}"),
            Self::EmptyWaveformData => write!(f, "malformed input: waveform data decoded to zero bytes"),
            Self::TruncatedChunk { offset, needed, available } => write!(
                f,
                "malformed input: chunk at offset {offset} needs {needed} bytes, only {available} available"
            ),
            Self::ShortExpansion { expected, actual } => write!(
                f,
                "malformed input: lead expanded to {actual} bytes, expected {expected}"
            ),
            Self::EmptyCodeStream => write!(f, "corrupt LZW stream: no codes in payload"),
            Self::InvalidFirstCode(code) => {
                write!(f, "corrupt LZW stream: first code {code} is not a literal byte")
            }
            Self::UndefinedCode { code, next_code } => write!(
                f,
                "corrupt LZW stream: code {code} referenced before definition (next free code {next_code})"
            ),
            Self::PrefixChainOverrun { code } => write!(
                f,
                "corrupt LZW stream: prefix chain of code {code} exceeds the dictionary size"
            ),
            Self::OutputOverflow { capacity } => {
                write!(f, "buffer overflow: expansion exceeds {capacity} bytes")
            }
            Self::UnsupportedEncoding { encoding, compression } => {
                let encoding = if encoding.is_empty() { "<none>" } else { encoding };
                let compression = if compression.is_empty() { "<none>" } else { compression };
                write!(
                    f,
                    "unsupported encoding: dataencoding={encoding}, compression={compression} (only Base64 + XLI)"
                )
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported encoding: document version '{version}' (expected 1.03 or 1.04)")
            }
            Self::UnsupportedDocumentType(doc_type) => {
                write!(f, "unsupported encoding: document type '{doc_type}'")
            }
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::MissingElement(name) => write!(f, "missing element <{name}>"),
            Self::DuplicateElement(name) => write!(f, "element <{name}> must appear exactly once"),
            Self::InvalidOptions(msg) => write!(f, "invalid options: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Lead { index, name, source } => write!(f, "lead {name} (#{index}): {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Lead { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
