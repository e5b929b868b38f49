#![no_main]
use libfuzzer_sys::fuzz_target;
use sierraecg::{decode_leads, DecodeOptions, DocumentVersion};

fuzz_target!(|data: &[u8]| {
    let opts = DecodeOptions::default().with_samples_per_lead(64);
    if let Ok(record) = decode_leads(data, DocumentVersion::V1_04, &opts) {
        assert!(record.valid() <= 12);
        assert!(record.leads().iter().all(|l| l.samples().len() == 64));
    }
});
