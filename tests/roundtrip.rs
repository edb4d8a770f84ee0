//! Round-trip and bit-exactness tests against a reference inflater.
//!
//! Every stream this crate emits must be consumable by any conforming
//! decoder; `flate2` stands in as the reference implementation.  The fixed
//! byte sequences asserted here (empty gzip member, one-byte zlib stream)
//! pin the emitter to known-good output.

use std::io::Read;

use ultraflate::{compress_to_vec, memory_bound, Framing};

// ─────────────────────────────────────────────────────────────────────────────
// Reference decoding helpers
// ─────────────────────────────────────────────────────────────────────────────

fn inflate(data: &[u8], framing: Framing) -> Vec<u8> {
    let mut out = Vec::new();
    match framing {
        Framing::Raw => {
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .expect("raw inflate failed");
        }
        Framing::Zlib => {
            flate2::read::ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .expect("zlib inflate failed");
        }
        Framing::Gzip => {
            // GzDecoder verifies the CRC-32 and ISIZE trailer itself.
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .expect("gzip inflate failed");
        }
    }
    out
}

fn roundtrip(input: &[u8], framing: Framing, block_size: usize) -> Vec<u8> {
    let compressed = compress_to_vec(input, framing, block_size).expect("compression failed");
    assert!(
        compressed.len() <= memory_bound(input.len(), framing, block_size),
        "output exceeds memory_bound"
    );
    let decoded = inflate(&compressed, framing);
    assert_eq!(decoded.len(), input.len(), "length mismatch after inflate");
    assert!(decoded == input, "content mismatch after inflate");
    compressed
}

/// Deterministic pseudo-random bytes (xorshift32).
fn random_bytes(len: usize, mut seed: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Seed scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_gzip_member_is_bit_exact() {
    let compressed = compress_to_vec(&[], Framing::Gzip, 0).unwrap();
    assert_eq!(
        compressed,
        [
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, // header
            0x03, 0x00, // empty final static block
            0x00, 0x00, 0x00, 0x00, // CRC-32 of nothing
            0x00, 0x00, 0x00, 0x00, // ISIZE = 0
        ]
    );
    assert_eq!(inflate(&compressed, Framing::Gzip), b"");
}

#[test]
fn one_byte_zlib_stream_is_bit_exact() {
    let compressed = compress_to_vec(b"a", Framing::Zlib, 0).unwrap();
    assert_eq!(
        compressed,
        [0x78, 0x9c, 0x4b, 0x04, 0x00, 0x00, 0x62, 0x00, 0x62]
    );
    assert_eq!(inflate(&compressed, Framing::Zlib), b"a");
}

#[test]
fn short_run_roundtrips_raw() {
    let compressed = roundtrip(b"aaaaaaaa", Framing::Raw, 0);
    // One literal plus a run match beats eight literals even with the
    // 3-bit block header.
    assert!(compressed.len() <= 8);
}

#[test]
fn zero_block_compresses_to_a_few_dozen_bytes() {
    let input = vec![0u8; 65536];
    let compressed = roundtrip(&input, Framing::Raw, 0);
    // ~254 length-258 matches at a couple of bits each, plus one table.
    assert!(
        compressed.len() <= 120,
        "64 KiB of zeros took {} bytes",
        compressed.len()
    );
}

#[test]
fn random_megabyte_roundtrips_gzip() {
    let input = random_bytes(1 << 20, 0x1234_5678);
    let compressed = roundtrip(&input, Framing::Gzip, 0);
    // Random input is incompressible: the stored fallback keeps the
    // expansion within the per-block framing overhead.
    assert!(compressed.len() >= input.len());
    assert!(compressed.len() <= memory_bound(input.len(), Framing::Gzip, 0));
}

#[test]
fn alternating_megabyte_exceeds_500_to_1() {
    let input: Vec<u8> = (0..(1usize << 20)).map(|i| b"ab"[i & 1]).collect();
    let compressed = roundtrip(&input, Framing::Gzip, 0);
    assert!(
        compressed.len() * 500 < input.len(),
        "ratio only {}:1",
        input.len() / compressed.len().max(1)
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn framing_choice_is_deterministic() {
    let input = random_bytes(200_000, 42)
        .iter()
        .map(|&b| b % 16 + b'a')
        .collect::<Vec<u8>>();
    for framing in [Framing::Raw, Framing::Zlib, Framing::Gzip] {
        let first = compress_to_vec(&input, framing, 0).unwrap();
        let second = compress_to_vec(&input, framing, 0).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn multi_block_streams_carry_history() {
    // Smaller than one block-group apart, the repeated phrase must be
    // reachable through the carried history across group boundaries.
    let phrase = b"history carried across block group boundaries! ";
    let input: Vec<u8> = phrase
        .iter()
        .copied()
        .cycle()
        .take(200_000)
        .collect();
    let compressed = roundtrip(&input, Framing::Zlib, 32768);
    assert!(compressed.len() * 20 < input.len());
}

#[test]
fn text_roundtrips_under_all_framings_and_block_sizes() {
    let text: Vec<u8> = b"It is a truth universally acknowledged, that a single \
compressor in possession of a good corpus, must be in want of a decoder. "
        .iter()
        .copied()
        .cycle()
        .take(150_000)
        .collect();
    for framing in [Framing::Raw, Framing::Zlib, Framing::Gzip] {
        for block_size in [32768usize, 65536, 0] {
            roundtrip(&text, framing, block_size);
        }
    }
}

#[test]
fn all_byte_values_roundtrip() {
    let input: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
    roundtrip(&input, Framing::Gzip, 0);
}

#[test]
fn matchless_input_roundtrips() {
    // Few usable repeats: exercises the literal-heavy path and the
    // two-distance-symbol floor in dynamic headers.
    let input: Vec<u8> = (0..5000u32)
        .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
        .collect();
    roundtrip(&input, Framing::Zlib, 0);
}

#[test]
fn sizes_straddling_stored_chunk_limits_roundtrip() {
    for &len in &[65534usize, 65535, 65536, 65537, 131_071] {
        let input = random_bytes(len, len as u32);
        roundtrip(&input, Framing::Raw, 0);
    }
}

#[test]
fn tiny_inputs_roundtrip() {
    for len in 0..=16usize {
        let input: Vec<u8> = (0..len as u8).collect();
        for framing in [Framing::Raw, Framing::Zlib, Framing::Gzip] {
            roundtrip(&input, framing, 0);
        }
    }
}

#[test]
fn gzip_checksum_agrees_with_reference() {
    let input = random_bytes(70_000, 7);
    let compressed = compress_to_vec(&input, Framing::Gzip, 0).unwrap();
    // The trailer carries CRC-32 then ISIZE, little-endian.
    let trailer = &compressed[compressed.len() - 8..];
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&input);
    assert_eq!(&trailer[..4], hasher.finalize().to_le_bytes());
    assert_eq!(&trailer[4..], (input.len() as u32).to_le_bytes());
}
