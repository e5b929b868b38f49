//! Integrationstests: XML → Base64 → XLI-Chunks → EcgRecord → Plain-XML.

use sierraecg::{
    decode_document, decode_leads, decompress_document, DecodeOptions, DocumentVersion, Error,
    ErrorKind, LeadId, WaveformDocument, LEAD_NAMES,
};

include!("common/fixtures.rs");

fn opts(leads: usize, samples: usize) -> DecodeOptions {
    DecodeOptions::default().with_lead_count(leads).with_samples_per_lead(samples)
}

// ============================================================================
// Chunk-Sequenz
// ============================================================================

#[test]
fn two_lead_record_end_to_end() {
    let lead_i: Vec<i16> = vec![0, 10, 25, 40, 30, -5, -20, -18];
    let lead_ii: Vec<i16> = vec![100, 90, 80, 70, 60, 50, 40, 30];
    let buffer = encode_record(&[lead_i.clone(), lead_ii.clone()]);

    let record = decode_leads(&buffer, DocumentVersion::V1_04, &opts(12, 8)).unwrap();
    assert_eq!(record.valid(), 2);
    assert_eq!(record.lead(LeadId::I).unwrap().samples(), lead_i.as_slice());
    assert_eq!(record.lead(LeadId::II).unwrap().samples(), lead_ii.as_slice());
}

#[test]
fn twelve_lead_record_with_reconstruction() {
    let leads = synthetic_12_lead(500);
    let buffer = encode_record(&leads);

    let record = decode_leads(&buffer, DocumentVersion::V1_04, &opts(12, 500)).unwrap();
    assert_eq!(record.valid(), 12);
    for (index, expected) in leads.iter().enumerate() {
        let lead = &record.leads()[index];
        assert_eq!(lead.name(), LEAD_NAMES[index]);
        assert_eq!(lead.samples(), expected.as_slice(), "lead {}", lead.name());
    }
}

#[test]
fn saturated_dictionary_keeps_decoding() {
    // 5500 verrauschte Samples füllen das 767-Einträge-Wörterbuch mehrfach.
    let lead_i = synthetic_lead(7, 5500);
    let lead_ii = synthetic_lead(8, 5500);
    let buffer = encode_record(&[lead_i.clone(), lead_ii.clone()]);

    let record = decode_leads(&buffer, DocumentVersion::V1_04, &DecodeOptions::default()).unwrap();
    assert_eq!(record.valid(), 2);
    assert_eq!(record.leads()[0].samples(), lead_i.as_slice());
    assert_eq!(record.leads()[1].samples(), lead_ii.as_slice());
}

#[test]
fn truncated_chunk_is_malformed_input() {
    let mut buffer = encode_record(&[vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
    buffer.truncate(buffer.len() - 3);

    let err = decode_leads(&buffer, DocumentVersion::V1_04, &opts(12, 4)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    let Error::Lead { index, source, .. } = err else {
        panic!("expected lead context");
    };
    assert_eq!(index, 1);
    assert!(matches!(*source, Error::TruncatedChunk { .. }));
}

#[test]
fn undefined_code_is_corrupt_stream() {
    // 'A', dann Code 600 (nie definiert), dann Sentinel.
    let buffer = chunk_from_payload(&pack_codes(&[65, 600, MAX_VALUE]), 0);
    let err = decode_leads(&buffer, DocumentVersion::V1_04, &opts(1, 4)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptStream);
    assert!(err.to_string().contains("600"), "{err}");
}

#[test]
fn kwkwk_code_in_payload() {
    // 65 66 256 258 → "ABABABA", auf 8 Bytes aufgefüllt: hi = ABAB, lo = ABA\0.
    let payload = pack_codes(&[65, 66, 256, 258, MAX_VALUE]);
    let buffer = chunk_from_payload(&payload, 0);
    let record = decode_leads(&buffer, DocumentVersion::V1_04, &opts(1, 4)).unwrap();
    let expected: Vec<i16> = vec![
        i16::from_be_bytes([b'A', b'A']),
        i16::from_be_bytes([b'B', b'B']),
    ];
    assert_eq!(&record.leads()[0].samples()[..2], expected.as_slice());
}

// ============================================================================
// Dokument
// ============================================================================

#[test]
fn document_104_uses_declared_counts() {
    let leads = synthetic_12_lead(250);
    let xml = sierra_xml_104(&encode_record(&leads), 12, 500, 500);

    let record = decode_document(&xml, &DecodeOptions::default()).unwrap();
    assert_eq!(record.version(), DocumentVersion::V1_04);
    assert_eq!(record.valid(), 12);
    assert_eq!(record.leads()[11].samples(), leads[11].as_slice());
    assert_eq!(record.leads()[5].samples(), leads[5].as_slice());
}

#[test]
fn document_103_uses_channels_valid() {
    let leads: Vec<Vec<i16>> = synthetic_12_lead(100).into_iter().take(8).collect();
    let xml = sierra_xml_103(&encode_record(&leads), 8, 250, 400);

    let doc = WaveformDocument::parse(&xml).unwrap();
    assert!(doc.is_base64() && doc.is_xli());
    let record = doc.decode(&DecodeOptions::default()).unwrap();
    assert_eq!(record.version(), DocumentVersion::V1_03);
    assert_eq!(record.valid(), 8);
    assert_eq!(record.lead(LeadId::V2).unwrap().samples(), leads[7].as_slice());
}

#[test]
fn options_override_document_counts() {
    let leads = synthetic_12_lead(40);
    let xml = sierra_xml_104(&encode_record(&leads), 12, 500, 80);
    let record = decode_document(&xml, &opts(3, 40)).unwrap();
    assert_eq!(record.valid(), 3);
    assert_eq!(record.lead(LeadId::III).unwrap().samples(), leads[2].as_slice());
}

#[test]
fn document_104_lead_labels_name_leads() {
    let leads = synthetic_12_lead(20);
    let labels = "I II III aVR aVL aVF V1 V2 V3 V4 V5 V6";
    let xml = sierra_xml_104(&encode_record(&leads), 12, 500, 40)
        .replace("numberofleads=", &format!("leadlabels=\"{}\" numberofleads=", labels.replace("V1", "V1R")));

    let record = decode_document(&xml, &DecodeOptions::default()).unwrap();
    assert_eq!(record.leads()[6].name(), "V1R");
    assert_eq!(record.lead_by_name("V1R").unwrap().samples(), leads[6].as_slice());
    assert_eq!(record.lead(LeadId::AVF).unwrap().name(), "aVF");
    assert_eq!(record.lead(LeadId::AVF).unwrap().samples(), leads[5].as_slice());
}

#[test]
fn document_103_nonstandard_acquisition_uses_channel_names() {
    let leads: Vec<Vec<i16>> = synthetic_12_lead(20).into_iter().take(4).collect();
    let xml = sierra_xml_103(&encode_record(&leads), 4, 500, 40).replace(
        "<numberchannelsvalid>",
        "<acquisitiontype>3-CHANNEL</acquisitiontype><numberchannelsvalid>",
    );

    let record = decode_document(&xml, &DecodeOptions::default()).unwrap();
    let names: Vec<&str> = record.leads().iter().map(|l| l.name()).collect();
    assert_eq!(names, ["Channel 1", "Channel 2", "Channel 3", "Channel 4"]);
    // Rekonstruktion bleibt indexbasiert.
    assert_eq!(record.leads()[3].samples(), leads[3].as_slice());
}

#[test]
fn oversized_duration_attribute_is_not_fatal() {
    let leads = synthetic_12_lead(20);
    let xml = sierra_xml_104(&encode_record(&leads), 12, 500, 40)
        .replace(r#"durationperchannel="40""#, r#"durationperchannel="18446744073709551615""#);

    let record = decode_document(&xml, &opts(12, 20)).unwrap();
    assert_eq!(record.valid(), 12);
    assert_eq!(record.leads()[0].samples(), leads[0].as_slice());

    let err = decode_document(&xml, &DecodeOptions::default().with_samples_per_lead(usize::MAX / 2 + 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn plain_document_is_unsupported() {
    let xml = sierra_xml_104(&[1, 2, 3], 12, 500, 10).replace("Base64", "Plain");
    let err = decode_document(&xml, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedEncoding);
}

#[test]
fn unknown_version_is_unsupported() {
    let xml = sierra_xml_104(&[1, 2, 3], 12, 500, 10).replace(">1.04<", ">1.02<");
    let err = decode_document(&xml, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err, Error::UnsupportedVersion("1.02".into()));
}

#[test]
fn invalid_options_are_rejected_before_decoding() {
    let xml = sierra_xml_104(&encode_record(&[vec![1, 2]]), 1, 500, 4);
    let err = decode_document(&xml, &DecodeOptions::default().with_lead_count(17)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

// ============================================================================
// Dekompression (Plain-XML)
// ============================================================================

#[test]
fn decompress_104_rewrites_waveforms() {
    let leads = synthetic_12_lead(60);
    let xml = sierra_xml_104(&encode_record(&leads), 12, 500, 120);

    let out = decompress_document(&xml, &DecodeOptions::default()).unwrap();
    assert!(out.contains(r#"dataencoding="Plain""#), "{out}");
    assert!(!out.contains("compression="), "{out}");
    assert!(out.contains(r#"numberofleads="12""#), "{out}");
    assert!(out.contains("<documentname>test.xml</documentname>"), "{out}");

    let expected: Vec<i16> = leads.concat();
    assert_eq!(grid_values(&out), expected);
}

#[test]
fn decompress_103_clears_compressflag() {
    let leads: Vec<Vec<i16>> = synthetic_12_lead(30).into_iter().take(2).collect();
    let xml = sierra_xml_103(&encode_record(&leads), 2, 500, 60);

    let out = decompress_document(&xml, &DecodeOptions::default()).unwrap();
    assert!(out.contains(r#"compressflag="False""#), "{out}");
    assert!(out.contains(r#"compressmethod="XLI""#), "{out}");
    assert_eq!(grid_values(&out), leads.concat());
}

#[test]
fn decompression_is_repeatable() {
    let xml = sierra_xml_104(&encode_record(&synthetic_12_lead(75)), 12, 500, 150);
    let first = decompress_document(&xml, &DecodeOptions::default()).unwrap();
    let second = decompress_document(&xml, &DecodeOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn decompressed_document_is_not_decodable_again() {
    let xml = sierra_xml_104(&encode_record(&synthetic_12_lead(25)), 12, 500, 50);
    let out = decompress_document(&xml, &DecodeOptions::default()).unwrap();
    let err = decode_document(&out, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedEncoding);
}
