#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(out) = sierraecg::lzw::expand(data, 11_000) {
        assert!(out.len() <= 11_000);
    }
});
