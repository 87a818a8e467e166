#![no_main]
use libfuzzer_sys::fuzz_target;
use maskid_rs::{Codec, Config};

fuzz_target!(|data: &[u8]| {
    let config = Config::default()
        .salt("fuzz-seed")
        .derive("Fuzz", &[])
        .unwrap();
    let codec = Codec::new("Fuzz", &config).unwrap();
    let _ = codec.decode(&String::from_utf8_lossy(data));
});
