//! Compress arbitrary bytes and require a bit-exact round trip through a
//! reference inflater.

#![no_main]

use std::io::Read;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let compressed = ultraflate::compress_to_vec(data, ultraflate::Framing::Zlib, 32768)
        .expect("compression must not fail");

    let mut decoded = Vec::new();
    flate2::read::ZlibDecoder::new(&compressed[..])
        .read_to_end(&mut decoded)
        .expect("emitted stream must inflate");
    assert_eq!(decoded, data);
});
