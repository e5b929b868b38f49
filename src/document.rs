//! Sierra ECG XML document access.
//!
//! Scans a `<restingecgdata>` document once with quick-xml and collects
//! what the decoder needs: document version and type, the
//! `<parsedwaveforms>` attributes and text, and lead/sample count hints.
//!
//! Elements are matched by local name along their path from the root, so
//! both prefixed and default-namespace documents work:
//!
//! ```text
//! restingecgdata/documentinfo/documentversion
//! restingecgdata/documentinfo/documenttype
//! restingecgdata/dataacquisition/signalcharacteristics/samplingrate
//! restingecgdata/dataacquisition/signalcharacteristics/numberchannelsvalid   (1.03)
//! restingecgdata/dataacquisition/signalcharacteristics/acquisitiontype       (1.03)
//! restingecgdata/dataacquisition/signalcharacteristics/leadset               (1.03)
//! restingecgdata/waveforms/parsedwaveforms
//! ```

use std::borrow::Cow;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::options::{DecodeOptions, LayoutHints};
use crate::record::{DocumentVersion, EcgRecord, LEAD_NAMES, MAX_LEADS};
use crate::xli::{self, WaveformEncoding};
use crate::{Error, Result};

/// Philips medical XML namespace.
pub const SIERRA_NAMESPACE: &str = "http://www3.medical.philips.com";

const VERSION_PATH: &[&str] = &["restingecgdata", "documentinfo", "documentversion"];
const TYPE_PATH: &[&str] = &["restingecgdata", "documentinfo", "documenttype"];
pub(crate) const WAVEFORMS_PATH: &[&str] = &["restingecgdata", "waveforms", "parsedwaveforms"];
const SAMPLING_RATE_PATH: &[&str] =
    &["restingecgdata", "dataacquisition", "signalcharacteristics", "samplingrate"];
const CHANNELS_VALID_PATH: &[&str] =
    &["restingecgdata", "dataacquisition", "signalcharacteristics", "numberchannelsvalid"];
const ACQUISITION_TYPE_PATH: &[&str] =
    &["restingecgdata", "dataacquisition", "signalcharacteristics", "acquisitiontype"];
const LEAD_SET_PATH: &[&str] = &["restingecgdata", "dataacquisition", "signalcharacteristics", "leadset"];

/// 1.03 acquisition types stored in standard 12-lead order.
const STANDARD_LEAD_SETS: &[&str] = &["STD-12", "10-WIRE"];

/// Accepted `documenttype` values.
const DOCUMENT_TYPES: &[&str] = &["SierraECG", "PhilipsECG"];

/// Elements whose text content is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Version,
    Type,
    Waveforms,
    SamplingRate,
    ChannelsValid,
    AcquisitionType,
    LeadSet,
}

impl Field {
    fn at(path: &[String]) -> Option<Self> {
        let matches = |expected: &[&str]| {
            path.len() == expected.len() && path.iter().zip(expected).all(|(a, b)| a.as_str() == *b)
        };
        if matches(VERSION_PATH) {
            Some(Self::Version)
        } else if matches(TYPE_PATH) {
            Some(Self::Type)
        } else if matches(WAVEFORMS_PATH) {
            Some(Self::Waveforms)
        } else if matches(SAMPLING_RATE_PATH) {
            Some(Self::SamplingRate)
        } else if matches(CHANNELS_VALID_PATH) {
            Some(Self::ChannelsValid)
        } else if matches(ACQUISITION_TYPE_PATH) {
            Some(Self::AcquisitionType)
        } else if matches(LEAD_SET_PATH) {
            Some(Self::LeadSet)
        } else {
            None
        }
    }

    fn element_name(self) -> &'static str {
        match self {
            Self::Version => "documentversion",
            Self::Type => "documenttype",
            Self::Waveforms => "parsedwaveforms",
            Self::SamplingRate => "samplingrate",
            Self::ChannelsValid => "numberchannelsvalid",
            Self::AcquisitionType => "acquisitiontype",
            Self::LeadSet => "leadset",
        }
    }
}

/// Attributes of `<parsedwaveforms>` that matter for decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveformAttributes {
    /// `dataencoding` (e.g. `Base64`, `Plain`).
    pub data_encoding: Option<String>,
    /// `compression` (1.04).
    pub compression: Option<String>,
    /// `compressflag` (1.03).
    pub compress_flag: Option<String>,
    /// `compressmethod` (1.03).
    pub compress_method: Option<String>,
    /// `numberofleads` (1.04).
    pub number_of_leads: Option<String>,
    /// `durationperchannel` in milliseconds.
    pub duration_per_channel: Option<String>,
    /// `leadlabels` (1.04), space separated.
    pub lead_labels: Option<String>,
}

/// The decoder-relevant content of a Sierra ECG document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformDocument {
    version: DocumentVersion,
    document_type: Option<String>,
    attributes: WaveformAttributes,
    sampling_rate: Option<u32>,
    channels_valid: Option<usize>,
    acquisition_type: Option<String>,
    waveform_text: String,
}

/// Collected raw values before validation.
#[derive(Default)]
struct Scan {
    version: Vec<String>,
    document_type: Vec<String>,
    waveforms: Vec<(WaveformAttributes, String)>,
    sampling_rate: Option<String>,
    channels_valid: Option<String>,
    acquisition_type: Option<String>,
    lead_set: Option<String>,
}

impl Scan {
    fn text_slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Version => last_slot(&mut self.version),
            Field::Type => last_slot(&mut self.document_type),
            Field::Waveforms => {
                if self.waveforms.is_empty() {
                    self.waveforms.push(Default::default());
                }
                let last = self.waveforms.len() - 1;
                &mut self.waveforms[last].1
            }
            Field::SamplingRate => self.sampling_rate.get_or_insert_with(String::new),
            Field::ChannelsValid => self.channels_valid.get_or_insert_with(String::new),
            Field::AcquisitionType => self.acquisition_type.get_or_insert_with(String::new),
            Field::LeadSet => self.lead_set.get_or_insert_with(String::new),
        }
    }

    fn open(&mut self, field: Field, element: &BytesStart<'_>) -> Result<()> {
        match field {
            Field::Version => self.version.push(String::new()),
            Field::Type => self.document_type.push(String::new()),
            Field::Waveforms => self.waveforms.push((read_attributes(element)?, String::new())),
            Field::SamplingRate => self.sampling_rate = Some(String::new()),
            Field::ChannelsValid => self.channels_valid = Some(String::new()),
            Field::AcquisitionType => self.acquisition_type = Some(String::new()),
            Field::LeadSet => self.lead_set = Some(String::new()),
        }
        Ok(())
    }
}

fn last_slot(values: &mut Vec<String>) -> &mut String {
    if values.is_empty() {
        values.push(String::new());
    }
    let last = values.len() - 1;
    &mut values[last]
}

impl WaveformDocument {
    /// Parses a Sierra ECG XML document.
    ///
    /// # Errors
    ///
    /// - `XmlParseError` if the XML is not well-formed
    /// - `MissingElement` / `DuplicateElement` unless `documentversion`
    ///   and `parsedwaveforms` appear exactly once
    /// - `UnsupportedVersion` / `UnsupportedDocumentType` for unknown
    ///   versions or document types
    pub fn parse(xml: &str) -> Result<Self> {
        let scan = scan(xml)?;

        let version_text = exactly_one(scan.version, Field::Version)?;
        let version = DocumentVersion::parse(&version_text)?;

        let document_type = match scan.document_type.len() {
            0 => None,
            1 => scan.document_type.into_iter().next().map(|t| t.trim().to_string()),
            _ => return Err(Error::DuplicateElement(Field::Type.element_name().into())),
        };
        if let Some(doc_type) = &document_type {
            if !DOCUMENT_TYPES.contains(&doc_type.as_str()) {
                return Err(Error::UnsupportedDocumentType(doc_type.clone()));
            }
        }

        let (attributes, waveform_text) = exactly_one(scan.waveforms, Field::Waveforms)?;

        Ok(Self {
            version,
            document_type,
            attributes,
            sampling_rate: parse_count(scan.sampling_rate.as_deref(), "samplingrate"),
            channels_valid: parse_count(scan.channels_valid.as_deref(), "numberchannelsvalid"),
            // acquisitiontype (Python/C#) vor leadset (JS)
            acquisition_type: scan
                .acquisition_type
                .or(scan.lead_set)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            waveform_text,
        })
    }

    pub fn version(&self) -> DocumentVersion { self.version }
    pub fn document_type(&self) -> Option<&str> { self.document_type.as_deref() }
    pub fn attributes(&self) -> &WaveformAttributes { &self.attributes }
    /// Samples per second from `signalcharacteristics`.
    pub fn sampling_rate(&self) -> Option<u32> { self.sampling_rate }
    /// `acquisitiontype` (or `leadset`) of a 1.03 document.
    pub fn acquisition_type(&self) -> Option<&str> { self.acquisition_type.as_deref() }
    /// Unescaped text content of `<parsedwaveforms>`.
    pub fn waveform_text(&self) -> &str { &self.waveform_text }

    /// `dataencoding == "Base64"`.
    pub fn is_base64(&self) -> bool {
        self.attributes.data_encoding.as_deref() == Some("Base64")
    }

    /// XLI compression, per the attribute convention of the version.
    pub fn is_xli(&self) -> bool {
        let attrs = &self.attributes;
        match self.version {
            DocumentVersion::V1_04 => attrs.compression.as_deref() == Some("XLI"),
            DocumentVersion::V1_03 => {
                attrs.compress_flag.as_deref() == Some("True")
                    && attrs.compress_method.as_deref() == Some("XLI")
            }
        }
    }

    /// Compression method as declared, `None` when uncompressed.
    pub fn compression_method(&self) -> Option<&str> {
        let attrs = &self.attributes;
        match self.version {
            DocumentVersion::V1_04 => attrs.compression.as_deref(),
            DocumentVersion::V1_03 => match attrs.compress_flag.as_deref() {
                Some("True") => attrs.compress_method.as_deref(),
                _ => None,
            },
        }
    }

    /// Lead and sample counts declared by the document.
    pub fn layout_hints(&self) -> LayoutHints {
        let lead_count = match self.version {
            DocumentVersion::V1_04 => {
                parse_count(self.attributes.number_of_leads.as_deref(), "numberofleads")
            }
            DocumentVersion::V1_03 => self.channels_valid,
        };
        let duration: Option<usize> =
            parse_count(self.attributes.duration_per_channel.as_deref(), "durationperchannel");
        let samples_per_lead = match (self.sampling_rate, duration) {
            (Some(rate), Some(ms)) => match (rate as usize).checked_mul(ms) {
                Some(product) => Some(product / 1000),
                None => {
                    log::warn!("ignoring sample count hint: {rate} Hz x {ms} ms overflows");
                    None
                }
            },
            _ => None,
        };
        LayoutHints {
            lead_count,
            samples_per_lead,
            lead_labels: self.lead_labels(),
        }
    }

    /// Lead labels in storage order, `None` for the standard names.
    ///
    /// 1.04 documents list them in `leadlabels`. 1.03 documents only name
    /// the acquisition type; anything other than a standard 12-lead set is
    /// labelled `Channel N`.
    pub fn lead_labels(&self) -> Option<Vec<String>> {
        let labels: Vec<String> = match self.version {
            DocumentVersion::V1_04 => self
                .attributes
                .lead_labels
                .as_deref()?
                .split_whitespace()
                .take(MAX_LEADS)
                .map(str::to_string)
                .collect(),
            DocumentVersion::V1_03 => {
                let acquisition = self.acquisition_type.as_deref()?;
                if STANDARD_LEAD_SETS.contains(&acquisition) {
                    return None;
                }
                (1..=MAX_LEADS).map(|n| format!("Channel {n}")).collect()
            }
        };
        if labels.is_empty() {
            return None;
        }

        // III, aVR, aVL, aVF werden unabhängig vom Label per Index rekonstruiert.
        if let Some((index, label)) = labels
            .iter()
            .enumerate()
            .take(6)
            .find(|(index, label)| label.as_str() != LEAD_NAMES[*index])
        {
            log::warn!(
                "lead {index} is labelled '{label}'; leads are still decoded as standard {}",
                LEAD_NAMES[index]
            );
        }
        Some(labels)
    }

    /// Flags, version and hints for the waveform decoder.
    pub fn encoding(&self) -> WaveformEncoding {
        WaveformEncoding {
            is_base64: self.is_base64(),
            is_xli: self.is_xli(),
            version: self.version,
            hints: self.layout_hints(),
        }
    }

    /// Decodes the waveforms of this document.
    ///
    /// # Errors
    ///
    /// `UnsupportedEncoding` (with the declared attribute values) unless
    /// the waveforms are Base64 + XLI.
    pub fn decode(&self, options: &DecodeOptions) -> Result<EcgRecord> {
        let encoding = self.encoding();
        if !encoding.is_base64 || !encoding.is_xli {
            return Err(Error::unsupported_encoding(
                self.attributes.data_encoding.clone().unwrap_or_default(),
                self.compression_method().map(str::to_string).unwrap_or_default(),
            ));
        }
        xli::decode_waveforms(&self.waveform_text, &encoding, options)
    }
}

/// Parses `xml` and decodes its waveforms.
pub fn decode_document(xml: &str, options: &DecodeOptions) -> Result<EcgRecord> {
    WaveformDocument::parse(xml)?.decode(options)
}

fn exactly_one<T>(values: Vec<T>, field: Field) -> Result<T> {
    let count = values.len();
    let mut values = values.into_iter();
    match (values.next(), count) {
        (Some(value), 1) => Ok(value),
        (None, _) => Err(Error::MissingElement(field.element_name().into())),
        _ => Err(Error::DuplicateElement(field.element_name().into())),
    }
}

/// Parses a non-negative count; unparsable values are ignored with a warning.
fn parse_count<T: std::str::FromStr>(value: Option<&str>, name: &str) -> Option<T> {
    let value = value?.trim();
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("ignoring non-numeric <{name}> value '{value}'");
            None
        }
    }
}

fn scan(xml: &str) -> Result<Scan> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut scan = Scan::default();
    let mut path: Vec<String> = Vec::with_capacity(8);
    let mut current: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(local_name(&e)?);
                current = Field::at(&path);
                if let Some(field) = current {
                    scan.open(field, &e)?;
                }
            }
            Ok(Event::Empty(e)) => {
                path.push(local_name(&e)?);
                if let Some(field) = Field::at(&path) {
                    scan.open(field, &e)?;
                }
                path.pop();
            }
            Ok(Event::End(_)) => {
                if path.pop().is_none() {
                    return Err(Error::XmlParseError("unexpected end tag at depth 0".into()));
                }
                current = Field::at(&path);
            }
            Ok(Event::Text(e)) => {
                if let Some(field) = current {
                    let raw = std::str::from_utf8(&e)
                        .map_err(|er| Error::XmlParseError(er.to_string()))?;
                    let text = quick_xml::escape::unescape(raw)
                        .map_err(|er| Error::XmlParseError(er.to_string()))?;
                    scan.text_slot(field).push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(field) = current {
                    let text = std::str::from_utf8(&e)
                        .map_err(|er| Error::XmlParseError(er.to_string()))?;
                    scan.text_slot(field).push_str(text);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(field) = current {
                    let name = std::str::from_utf8(&e)
                        .map_err(|er| Error::XmlParseError(er.to_string()))?;
                    if let Some(ch) = resolve_reference(name) {
                        scan.text_slot(field).push_str(&ch);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::XmlParseError(format!(
                    "parse XML error at {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !path.is_empty() {
        return Err(Error::XmlParseError(format!("unclosed element <{}>", path.join("/"))));
    }
    Ok(scan)
}

/// Resolves `&name;` for predefined entities and character references.
fn resolve_reference(name: &str) -> Option<Cow<'static, str>> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(|c| Cow::Owned(c.to_string()));
    }
    resolve_predefined_entity(name).map(Cow::Borrowed)
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(e.local_name().as_ref())
        .map(str::to_string)
        .map_err(|er| Error::XmlParseError(er.to_string()))
}

fn read_attributes(e: &BytesStart<'_>) -> Result<WaveformAttributes> {
    let mut attrs = WaveformAttributes::default();
    for attr in e.attributes() {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let raw = std::str::from_utf8(attr.value.as_ref())
            .map_err(|er| Error::XmlParseError(er.to_string()))?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|er| Error::XmlParseError(er.to_string()))?
            .into_owned();
        let slot = match attr.key.local_name().as_ref() {
            b"dataencoding" => &mut attrs.data_encoding,
            b"compression" => &mut attrs.compression,
            b"compressflag" => &mut attrs.compress_flag,
            b"compressmethod" => &mut attrs.compress_method,
            b"numberofleads" => &mut attrs.number_of_leads,
            b"durationperchannel" => &mut attrs.duration_per_channel,
            b"leadlabels" => &mut attrs.lead_labels,
            _ => continue,
        };
        *slot = Some(value);
    }
    Ok(attrs)
}
