//! Decode options and lead layout resolution.
//!
//! Lead count and samples per lead come from three sources, in order:
//! explicit options, hints found in the document, built-in defaults
//! (12 leads, 5500 samples, 11000 ms).
//!
//! # Beispiel
//!
//! ```
//! use sierraecg::options::DecodeOptions;
//!
//! let opts = DecodeOptions::default()
//!     .with_lead_count(8)
//!     .with_samples_per_lead(2500)
//!     .with_strict_length();
//!
//! assert_eq!(opts.lead_count(), Some(8));
//! assert_eq!(opts.samples_per_lead(), Some(2500));
//! assert!(opts.strict_length());
//! assert!(opts.validate().is_ok());
//! ```

use std::borrow::Cow;

use crate::record::{
    DEFAULT_DURATION_MS, DEFAULT_SAMPLES_PER_LEAD, LEAD_NAMES, MAX_LEADS, MAX_SAMPLES_PER_LEAD,
    STD_LEAD_COUNT,
};
use crate::{Error, Result};

/// Options controlling how waveform data is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub(crate) lead_count: Option<usize>,
    pub(crate) samples_per_lead: Option<usize>,
    pub(crate) duration_ms: Option<u32>,
    pub(crate) strict_length: bool,
}

impl DecodeOptions {
    // --- Getter ---

    /// Number of leads to decode; `None` uses the document hint.
    pub fn lead_count(&self) -> Option<usize> { self.lead_count }
    /// Samples per lead; `None` uses the document hint.
    pub fn samples_per_lead(&self) -> Option<usize> { self.samples_per_lead }
    /// Lead duration in milliseconds; `None` uses 11000.
    pub fn duration_ms(&self) -> Option<u32> { self.duration_ms }
    /// Short LZW expansions are errors instead of being zero-filled.
    pub fn strict_length(&self) -> bool { self.strict_length }

    // --- Builder-Setter (Fluent API) ---

    /// Setzt die Anzahl der Leads.
    pub fn with_lead_count(mut self, count: usize) -> Self { self.lead_count = Some(count); self }
    /// Setzt die Samples pro Lead.
    pub fn with_samples_per_lead(mut self, count: usize) -> Self { self.samples_per_lead = Some(count); self }
    /// Setzt die Dauer in Millisekunden.
    pub fn with_duration_ms(mut self, ms: u32) -> Self { self.duration_ms = Some(ms); self }
    /// Aktiviert strikte Längenprüfung.
    pub fn with_strict_length(mut self) -> Self { self.strict_length = true; self }

    // --- Mutable Setter ---

    /// Setzt die Anzahl der Leads.
    pub fn set_lead_count(&mut self, count: Option<usize>) { self.lead_count = count; }
    /// Setzt die Samples pro Lead.
    pub fn set_samples_per_lead(&mut self, count: Option<usize>) { self.samples_per_lead = count; }
    /// Setzt die Dauer in Millisekunden.
    pub fn set_duration_ms(&mut self, ms: Option<u32>) { self.duration_ms = ms; }
    /// Setzt strikte Längenprüfung.
    pub fn set_strict_length(&mut self, val: bool) { self.strict_length = val; }

    /// Validates explicitly set values.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptions` if:
    /// - `lead_count` is 0 or greater than 16
    /// - `samples_per_lead` is 0 or greater than [`MAX_SAMPLES_PER_LEAD`]
    pub fn validate(&self) -> Result<()> {
        if let Some(count) = self.lead_count {
            if count == 0 || count > MAX_LEADS {
                return Err(Error::InvalidOptions(
                    format!("lead count must be 1..={MAX_LEADS}, got {count}").into(),
                ));
            }
        }
        if let Some(count) = self.samples_per_lead {
            if count == 0 || count > MAX_SAMPLES_PER_LEAD {
                return Err(Error::InvalidOptions(
                    format!("samples per lead must be 1..={MAX_SAMPLES_PER_LEAD}, got {count}").into(),
                ));
            }
        }
        Ok(())
    }

    /// Resolves the effective layout from these options and document hints.
    ///
    /// Hints that are out of range are ignored (0 or too many samples) or
    /// clamped (> 16 leads) with a warning; explicit options must pass [`validate`](Self::validate).
    pub fn resolve(&self, hints: LayoutHints) -> Result<LeadLayout> {
        self.validate()?;

        let lead_count = match self.lead_count {
            Some(count) => count,
            None => match hints.lead_count {
                Some(0) => {
                    log::warn!("document declares 0 leads, using {STD_LEAD_COUNT}");
                    STD_LEAD_COUNT
                }
                Some(count) if count > MAX_LEADS => {
                    log::warn!("document declares {count} leads, clamping to {MAX_LEADS}");
                    MAX_LEADS
                }
                Some(count) => count,
                None => STD_LEAD_COUNT,
            },
        };

        let samples_per_lead = match self.samples_per_lead {
            Some(count) => count,
            None => match hints.samples_per_lead {
                Some(0) => {
                    log::warn!("document declares 0 samples per lead, using {DEFAULT_SAMPLES_PER_LEAD}");
                    DEFAULT_SAMPLES_PER_LEAD
                }
                Some(count) if count > MAX_SAMPLES_PER_LEAD => {
                    log::warn!(
                        "document declares {count} samples per lead (max {MAX_SAMPLES_PER_LEAD}), using {DEFAULT_SAMPLES_PER_LEAD}"
                    );
                    DEFAULT_SAMPLES_PER_LEAD
                }
                Some(count) => count,
                None => DEFAULT_SAMPLES_PER_LEAD,
            },
        };

        Ok(LeadLayout {
            lead_count,
            samples_per_lead,
            duration_ms: self.duration_ms.unwrap_or(DEFAULT_DURATION_MS),
            lead_labels: hints.lead_labels.unwrap_or_default(),
        })
    }
}

/// Counts and labels declared by the document, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutHints {
    /// `numberofleads` (1.04) or `numberchannelsvalid` (1.03).
    pub lead_count: Option<usize>,
    /// `samplingrate * durationperchannel / 1000`.
    pub samples_per_lead: Option<usize>,
    /// Lead labels in storage order (`leadlabels` in 1.04, derived from
    /// the acquisition type in 1.03).
    pub lead_labels: Option<Vec<String>>,
}

/// Effective lead layout used by the chunk sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadLayout {
    /// Leads to decode (1..=16).
    pub lead_count: usize,
    /// Samples per lead; the LZW capacity is twice this.
    pub samples_per_lead: usize,
    /// Duration stored on every lead.
    pub duration_ms: u32,
    /// Document lead labels; missing entries use [`LEAD_NAMES`].
    pub lead_labels: Vec<String>,
}

impl LeadLayout {
    /// Name of the lead stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= MAX_LEADS` and the document gave no label for it.
    pub fn lead_name(&self, index: usize) -> Cow<'static, str> {
        match self.lead_labels.get(index) {
            Some(label) => Cow::Owned(label.clone()),
            None => Cow::Borrowed(LEAD_NAMES[index]),
        }
    }
}

impl Default for LeadLayout {
    fn default() -> Self {
        Self {
            lead_count: STD_LEAD_COUNT,
            samples_per_lead: DEFAULT_SAMPLES_PER_LEAD,
            duration_ms: DEFAULT_DURATION_MS,
            lead_labels: Vec::new(),
        }
    }
}
