//! Plain-text sample grid and `<parsedwaveforms>` rewriting.
//!
//! The rewritten document is the input copied event by event; only the
//! `<parsedwaveforms>` start tag and its content change:
//!
//! - `dataencoding` becomes `Plain`
//! - 1.04: `compression` is removed
//! - 1.03: `compressflag` becomes `False`
//! - the content becomes the sample grid of all leads

use std::fmt::Write as _;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::document::{self, WAVEFORMS_PATH};
use crate::options::DecodeOptions;
use crate::record::{DocumentVersion, EcgRecord};
use crate::{Error, Result};

/// Samples per full grid line.
pub const SAMPLES_PER_LINE: usize = 25;

/// Formats all leads as lines of 25 space-separated samples.
///
/// A lead whose length is not a multiple of 25 ends with a partial line
/// in which every sample is followed by a space.
pub fn format_samples(record: &EcgRecord) -> String {
    let total: usize = record.leads().iter().map(|l| l.samples().len()).sum();
    let mut out = String::with_capacity(total * 6);
    for lead in record.leads() {
        for line in lead.samples().chunks(SAMPLES_PER_LINE) {
            if line.len() == SAMPLES_PER_LINE {
                for (i, sample) in line.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{sample}");
                }
            } else {
                for sample in line {
                    let _ = write!(out, "{sample} ");
                }
            }
            out.push('\n');
        }
    }
    out
}

/// Replaces the waveforms of `xml` with the plain grid of `record`.
///
/// # Errors
///
/// `XmlParseError` for malformed XML, `MissingElement` if the document has
/// no `restingecgdata/waveforms/parsedwaveforms`.
pub fn rewrite_document(xml: &str, record: &EcgRecord) -> Result<String> {
    let grid = format_samples(record);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + grid.len()));

    let mut path: Vec<String> = Vec::with_capacity(8);
    // Tiefe innerhalb des ersetzten Elements; None = normales Kopieren.
    let mut skip_depth: Option<usize> = None;
    let mut replaced = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::XmlParseError(format!("parse XML error at {}: {e}", reader.buffer_position()))
        })?;

        if let Some(depth) = skip_depth {
            match event {
                Event::Start(_) => skip_depth = Some(depth + 1),
                Event::End(e) if depth == 0 => {
                    writer.write_event(Event::End(e))?;
                    skip_depth = None;
                }
                Event::End(_) => skip_depth = Some(depth - 1),
                Event::Eof => return Err(Error::XmlParseError("unclosed <parsedwaveforms>".into())),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                path.push(local_name(&e)?);
                if is_waveforms(&path) {
                    path.pop();
                    writer.write_event(Event::Start(rewrite_start(&e, record.version())?))?;
                    writer.write_event(Event::Text(BytesText::new(&grid)))?;
                    skip_depth = Some(0);
                    replaced = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::Empty(e) => {
                path.push(local_name(&e)?);
                let matched = is_waveforms(&path);
                path.pop();
                if matched {
                    let start = rewrite_start(&e, record.version())?;
                    let end = start.to_end().into_owned();
                    writer.write_event(Event::Start(start))?;
                    writer.write_event(Event::Text(BytesText::new(&grid)))?;
                    writer.write_event(Event::End(end))?;
                    replaced = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                path.pop();
                writer.write_event(Event::End(e))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }

    if !replaced {
        return Err(Error::MissingElement("parsedwaveforms".into()));
    }
    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::IoError("XML output is not valid UTF-8".into()))
}

/// Decodes the waveforms of `xml` and returns the rewritten document.
pub fn decompress_document(xml: &str, options: &DecodeOptions) -> Result<String> {
    let record = document::decode_document(xml, options)?;
    log::debug!("decoded {} leads, rewriting document", record.valid());
    rewrite_document(xml, &record)
}

fn is_waveforms(path: &[String]) -> bool {
    path.len() == WAVEFORMS_PATH.len()
        && path.iter().zip(WAVEFORMS_PATH).all(|(a, b)| a.as_str() == *b)
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(e.local_name().as_ref())
        .map(str::to_string)
        .map_err(|er| Error::XmlParseError(er.to_string()))
}

/// Copies the start tag with the encoding attributes rewritten.
fn rewrite_start(e: &BytesStart<'_>, version: DocumentVersion) -> Result<BytesStart<'static>> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|er| Error::XmlParseError(er.to_string()))?
        .to_string();
    let mut start = BytesStart::new(name);
    let mut has_encoding = false;

    for attr in e.attributes() {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let key = attr.key.as_ref();
        match (attr.key.local_name().as_ref(), version) {
            (b"dataencoding", _) => {
                start.push_attribute((key, b"Plain".as_slice()));
                has_encoding = true;
            }
            (b"compression", DocumentVersion::V1_04) => {}
            (b"compressflag", DocumentVersion::V1_03) => {
                start.push_attribute((key, b"False".as_slice()));
            }
            _ => start.push_attribute((key, attr.value.as_ref())),
        }
    }
    if !has_encoding {
        start.push_attribute(("dataencoding", "Plain"));
    }
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Lead;

    fn record(version: DocumentVersion, leads: &[Vec<i16>]) -> EcgRecord {
        let mut rec = EcgRecord::new(version);
        for (index, samples) in leads.iter().enumerate() {
            rec.push(Lead::new(index, samples.clone(), 1000));
        }
        rec
    }

    #[test]
    fn grid_full_and_partial_lines() {
        let samples: Vec<i16> = (1..=27).collect();
        let rec = record(DocumentVersion::V1_04, &[samples]);
        let grid = format_samples(&rec);
        let expected_first: Vec<String> = (1..=25).map(|n| n.to_string()).collect();
        assert_eq!(grid, format!("{}\n26 27 \n", expected_first.join(" ")));
    }

    #[test]
    fn grid_exact_multiple_has_no_partial_line() {
        let rec = record(DocumentVersion::V1_04, &[vec![-1; 50], vec![7; 3]]);
        let grid = format_samples(&rec);
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(' ').count(), 25);
        assert!(lines[1].starts_with("-1 -1"));
        assert_eq!(lines[2], "7 7 7 ");
        assert!(grid.ends_with("7 7 7 \n"));
    }

    #[test]
    fn grid_empty_record() {
        assert_eq!(format_samples(&record(DocumentVersion::V1_04, &[])), "");
    }

    const DOC_104: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<restingecgdata xmlns="http://www3.medical.philips.com">
  <!-- kept -->
  <documentinfo><documentversion>1.04</documentversion></documentinfo>
  <waveforms>
    <parsedwaveforms dataencoding="Base64" compression="XLI" numberofleads="2" durationperchannel="10">
      QUJD
    </parsedwaveforms>
  </waveforms>
</restingecgdata>"#;

    #[test]
    fn rewrite_104_attributes_and_content() {
        let rec = record(DocumentVersion::V1_04, &[vec![1, 2], vec![-3, 4]]);
        let out = rewrite_document(DOC_104, &rec).unwrap();
        assert!(
            out.contains(r#"<parsedwaveforms dataencoding="Plain" numberofleads="2" durationperchannel="10">1 2 
-3 4 
</parsedwaveforms>"#),
            "{out}"
        );
        assert!(!out.contains("compression"), "{out}");
        assert!(!out.contains("QUJD"), "{out}");
        assert!(out.contains("<!-- kept -->"), "{out}");
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#), "{out}");
        assert!(out.contains("<documentversion>1.04</documentversion>"), "{out}");
    }

    #[test]
    fn rewrite_103_sets_compressflag_false() {
        let xml = r#"<s:restingecgdata xmlns:s="http://www3.medical.philips.com"><s:waveforms><s:parsedwaveforms dataencoding="Base64" compressflag="True" compressmethod="XLI">QUJD</s:parsedwaveforms></s:waveforms></s:restingecgdata>"#;
        let rec = record(DocumentVersion::V1_03, &[vec![5]]);
        let out = rewrite_document(xml, &rec).unwrap();
        assert!(
            out.contains(r#"<s:parsedwaveforms dataencoding="Plain" compressflag="False" compressmethod="XLI">5 
</s:parsedwaveforms>"#),
            "{out}"
        );
    }

    #[test]
    fn rewrite_empty_element() {
        let xml = r#"<restingecgdata><waveforms><parsedwaveforms compression="XLI"/></waveforms></restingecgdata>"#;
        let rec = record(DocumentVersion::V1_04, &[vec![9, 8]]);
        let out = rewrite_document(xml, &rec).unwrap();
        assert_eq!(
            out,
            "<restingecgdata><waveforms><parsedwaveforms dataencoding=\"Plain\">9 8 \n</parsedwaveforms></waveforms></restingecgdata>"
        );
    }

    #[test]
    fn rewrite_skips_nested_content() {
        let xml = "<restingecgdata><waveforms><parsedwaveforms>a<x>b</x>c</parsedwaveforms><after/></waveforms></restingecgdata>";
        let rec = record(DocumentVersion::V1_04, &[vec![1]]);
        let out = rewrite_document(xml, &rec).unwrap();
        assert_eq!(
            out,
            "<restingecgdata><waveforms><parsedwaveforms dataencoding=\"Plain\">1 \n</parsedwaveforms><after/></waveforms></restingecgdata>"
        );
    }

    #[test]
    fn rewrite_requires_waveforms() {
        let rec = record(DocumentVersion::V1_04, &[]);
        let err = rewrite_document("<restingecgdata/>", &rec).unwrap_err();
        assert_eq!(err, Error::MissingElement("parsedwaveforms".into()));
    }
}
