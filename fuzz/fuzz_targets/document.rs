#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(xml) = std::str::from_utf8(data) {
        let _ = sierraecg::decompress_document(xml, &sierraecg::DecodeOptions::default());
    }
});
