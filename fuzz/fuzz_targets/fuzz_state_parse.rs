#![no_main]

use docchat::sessions::Session;
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

// Persisted session documents may be truncated or corrupted on disk;
// revival must reject bad shapes without panicking.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = serde_json::from_str::<HashMap<String, Session>>(text);
    }
});
