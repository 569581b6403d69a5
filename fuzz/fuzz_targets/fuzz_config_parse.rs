#![no_main]

use libfuzzer_sys::fuzz_target;

// Config files are hand-edited; parsing must never panic on arbitrary input.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = toml::from_str::<docchat::Config>(text);
    }
});
