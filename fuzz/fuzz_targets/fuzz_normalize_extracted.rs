#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(fields) = serde_json::from_slice::<serde_json::Value>(data) {
        // Arbitrary provider JSON must normalize and validate without panicking.
        let invoice = einvoice::extraction::normalize_extracted(
            &fields,
            einvoice::core::FormatId::XrechnungUbl,
        );
        let _ = einvoice::core::validate(&invoice);
    }
});
