//! sierraecg – Philips Sierra ECG XML decoder (XLI waveform decompression)
//!
//! # Beispiel
//!
//! ```no_run
//! use sierraecg::{decode_document, DecodeOptions, LeadId};
//!
//! let xml = std::fs::read_to_string("ecg.xml").unwrap();
//! let record = decode_document(&xml, &DecodeOptions::default()).unwrap();
//!
//! assert_eq!(record.valid(), 12);
//! let avr = record.lead(LeadId::AVR).unwrap();
//! println!("{}: {} samples", avr.name(), avr.samples().len());
//! ```
//!
//! Pipeline: base64 text → [`base64::decode`] → one chunk per lead →
//! [`lzw::expand`] → [`delta::decode_deltas`] →
//! [`reconstruct::reconstruct_derived_leads`] → [`EcgRecord`].

pub mod base64;
pub mod bitstream;
pub mod delta;
pub mod document;
pub mod error;
pub mod lzw;
pub mod options;
pub mod reconstruct;
pub mod record;
pub mod xli;
pub mod xml_serializer;

pub use error::{Error, ErrorKind, Result};

// Public API: Options
pub use options::{DecodeOptions, LayoutHints, LeadLayout};

// Public API: Record
pub use record::{
    DocumentVersion, EcgRecord, Lead, LeadDerivation, LeadId, LEAD_NAMES, MAX_LEADS,
    MAX_SAMPLES_PER_LEAD,
};

// Public API: Decoder
pub use xli::{decode_leads, decode_waveforms, EncodedChunk, WaveformEncoding};
pub use document::{decode_document, WaveformDocument};

// Public API: XML
pub use xml_serializer::{decompress_document, format_samples, rewrite_document};
