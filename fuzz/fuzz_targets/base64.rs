#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(bytes) = sierraecg::base64::decode(data) {
        assert_eq!(Ok(bytes.len()), sierraecg::base64::decoded_len(data));
    }
});
