#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic — None is fine, panics are bugs.
        let _ = einvoice::core::parse_decimal_str(s);
    }
});
