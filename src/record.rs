//! ECG record model: leads, lead identities, document versions.

use core::fmt;
use core::str::FromStr;
use std::borrow::Cow;

use crate::{Error, Result};

/// Maximum number of leads a record can hold.
pub const MAX_LEADS: usize = 16;

/// Lead count of a standard 12-lead ECG.
pub const STD_LEAD_COUNT: usize = 12;

/// Samples per lead when neither options nor document say otherwise.
pub const DEFAULT_SAMPLES_PER_LEAD: usize = 5500;

/// Upper bound for samples per lead (about 35 minutes at 500 Hz).
///
/// Bounds the per-lead LZW output buffer to 2 MiB.
pub const MAX_SAMPLES_PER_LEAD: usize = 1 << 20;

/// Lead duration in milliseconds when not configured.
pub const DEFAULT_DURATION_MS: u32 = 11_000;

/// Lead names in canonical (storage) order.
pub const LEAD_NAMES: [&str; MAX_LEADS] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
    "Channel 13", "Channel 14", "Channel 15", "Channel 16",
];

/// The twelve standard leads, in canonical order.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadId {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl LeadId {
    /// Index in the record.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display name (`"aVR"`, `"V1"`, ...).
    pub const fn name(self) -> &'static str {
        LEAD_NAMES[self as usize]
    }
}

/// How a lead's stored samples come about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadDerivation {
    /// Samples are decoded directly.
    Recorded,
    /// Decoded samples are a residual; the final value is computed from
    /// the listed leads.
    Derived(&'static [LeadId]),
}

/// Returns the derivation of the lead at `index`.
pub const fn derivation_for(index: usize) -> LeadDerivation {
    const III_DEPS: &[LeadId] = &[LeadId::I, LeadId::II];
    const AUGMENTED_DEPS: &[LeadId] = &[LeadId::I, LeadId::II, LeadId::III];
    match index {
        2 | 3 => LeadDerivation::Derived(III_DEPS),
        4 | 5 => LeadDerivation::Derived(AUGMENTED_DEPS),
        _ => LeadDerivation::Recorded,
    }
}

/// A single decoded lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    name: Cow<'static, str>,
    index: usize,
    samples: Vec<i16>,
    duration_ms: u32,
}

impl Lead {
    /// Creates a lead at canonical `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= MAX_LEADS`.
    pub fn new(index: usize, samples: Vec<i16>, duration_ms: u32) -> Self {
        Self::named(index, LEAD_NAMES[index], samples, duration_ms)
    }

    /// Creates a lead at canonical `index` carrying the document's label.
    pub fn named(
        index: usize,
        name: impl Into<Cow<'static, str>>,
        samples: Vec<i16>,
        duration_ms: u32,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            samples,
            duration_ms,
        }
    }

    /// Label from the document, or the canonical name of `index`.
    pub fn name(&self) -> &str { &self.name }
    pub fn index(&self) -> usize { self.index }
    pub fn samples(&self) -> &[i16] { &self.samples }
    pub fn duration_ms(&self) -> u32 { self.duration_ms }
    pub fn derivation(&self) -> LeadDerivation { derivation_for(self.index) }

    /// Smallest and largest sample, `None` for an empty lead.
    pub fn min_max(&self) -> Option<(i16, i16)> {
        let min = *self.samples.iter().min()?;
        let max = *self.samples.iter().max()?;
        Some((min, max))
    }

    pub(crate) fn samples_mut(&mut self) -> &mut Vec<i16> {
        &mut self.samples
    }
}

/// A decoded ECG: leads in canonical order plus the document version.
///
/// `leads().len()` equals [`valid`](Self::valid); a record with fewer
/// than 16 leads holds the first `valid` canonical leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcgRecord {
    version: DocumentVersion,
    leads: Vec<Lead>,
}

impl EcgRecord {
    /// Creates an empty record.
    pub fn new(version: DocumentVersion) -> Self {
        Self { version, leads: Vec::with_capacity(MAX_LEADS) }
    }

    pub fn version(&self) -> DocumentVersion { self.version }

    /// Number of populated leads.
    pub fn valid(&self) -> usize { self.leads.len() }

    pub fn leads(&self) -> &[Lead] { &self.leads }

    /// Lead by identity, `None` if it was not decoded.
    pub fn lead(&self, id: LeadId) -> Option<&Lead> {
        self.leads.get(id.index())
    }

    /// First lead labelled `name`.
    pub fn lead_by_name(&self, name: &str) -> Option<&Lead> {
        self.leads.iter().find(|lead| lead.name() == name)
    }

    /// Returns true if the lead with canonical `index` is present.
    pub fn has_lead(&self, index: usize) -> bool {
        index < self.leads.len()
    }

    /// Appends the next lead in canonical order.
    pub(crate) fn push(&mut self, lead: Lead) {
        debug_assert_eq!(lead.index(), self.leads.len(), "leads must be pushed in canonical order");
        self.leads.push(lead);
    }

    pub(crate) fn leads_mut(&mut self) -> &mut [Lead] {
        &mut self.leads
    }
}

/// Schema version of a Sierra ECG document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentVersion {
    /// 1.03: `compressflag` + `compressmethod` attributes.
    V1_03,
    /// 1.04 (and 1.04.01, 1.04.02): `compression` attribute.
    V1_04,
}

impl DocumentVersion {
    /// Canonical version string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1_03 => "1.03",
            Self::V1_04 => "1.04",
        }
    }

    /// Parses a `documentversion` value.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "1.03" => Ok(Self::V1_03),
            "1.04" | "1.04.01" | "1.04.02" => Ok(Self::V1_04),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl FromStr for DocumentVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
