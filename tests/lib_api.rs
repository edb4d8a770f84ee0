//! API-surface tests: limits, error reporting, streaming behavior.

use ultraflate::{
    compress_in_memory, compress_to_vec, memory_bound, version_number, version_string,
    CompressError, Finalize, Framing, Stream, DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};

#[test]
fn version_constants_agree() {
    assert_eq!(version_number(), 100);
    assert_eq!(version_string(), "0.1.0");
}

#[test]
fn block_size_limits() {
    assert_eq!(MIN_BLOCK_SIZE, 32768);
    assert_eq!(MAX_BLOCK_SIZE, 2_097_152);
    assert_eq!(DEFAULT_BLOCK_SIZE, 1_048_576);
}

#[test]
fn memory_bound_dominates_actual_output() {
    for (len, framing) in [
        (0usize, Framing::Gzip),
        (1, Framing::Zlib),
        (100_000, Framing::Raw),
        (100_000, Framing::Gzip),
    ] {
        let input: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let compressed = compress_to_vec(&input, framing, 0).unwrap();
        assert!(compressed.len() <= memory_bound(len, framing, 0));
    }
}

#[test]
fn undersized_output_reports_output_full() {
    let input = vec![7u8; 100_000];
    let mut out = [0u8; 8];
    assert_eq!(
        compress_in_memory(&input, &mut out, Framing::Gzip, 0),
        Err(CompressError::OutputFull)
    );
}

#[test]
fn streaming_in_chunks_matches_one_shot() {
    let input: Vec<u8> = b"chunked delivery must be invisible in the output. "
        .iter()
        .copied()
        .cycle()
        .take(300_000)
        .collect();

    let one_shot = compress_to_vec(&input, Framing::Gzip, 65536).unwrap();

    let mut stream = Stream::new(Framing::Gzip, 65536).unwrap();
    let mut out = vec![0u8; memory_bound(input.len(), Framing::Gzip, 65536)];
    let mut out_pos = 0usize;
    for chunk in input.chunks(7919) {
        let (consumed, written) = stream
            .compress(chunk, &mut out[out_pos..], Finalize::Continue)
            .unwrap();
        assert_eq!(consumed, chunk.len());
        out_pos += written;
    }
    let (_, written) = stream.compress(&[], &mut out[out_pos..], Finalize::Finish).unwrap();
    out_pos += written;
    assert!(stream.is_finished());

    assert_eq!(&out[..out_pos], &one_shot[..]);
    assert_eq!(stream.total_in(), input.len() as u64);
    assert_eq!(stream.total_out(), out_pos as u64);
}

#[test]
fn zlib_dictionary_stream_declares_dictid() {
    let dict = b"a moderately useful preset dictionary for tests";
    let input = b"a moderately useful preset dictionary for tests, reused";

    let mut stream = Stream::new(Framing::Zlib, 0).unwrap();
    stream.set_dictionary(dict).unwrap();
    let mut out = vec![0u8; memory_bound(input.len(), Framing::Zlib, 0)];
    let (consumed, written) = stream.compress(input, &mut out, Finalize::Finish).unwrap();
    assert_eq!(consumed, input.len());
    assert!(stream.is_finished());
    let out = &out[..written];

    // FDICT set, header pair divisible by 31, DICTID = Adler-32 of the
    // dictionary.
    assert_eq!(out[0], 0x78);
    assert_ne!(out[1] & 0x20, 0);
    assert_eq!(((out[0] as u32) << 8 | out[1] as u32) % 31, 0);
    let mut adler = simd_adler32::Adler32::new();
    adler.write(dict);
    assert_eq!(&out[2..6], adler.finish().to_be_bytes());

    // The dictionary must actually help: the primed stream beats the
    // unprimed one on this input.
    let without = compress_to_vec(input, Framing::Zlib, 0).unwrap();
    assert!(out.len() < without.len());
}

#[test]
fn second_dictionary_is_rejected() {
    let mut stream = Stream::new(Framing::Raw, 0).unwrap();
    stream.set_dictionary(b"one").unwrap();
    assert_eq!(
        stream.set_dictionary(b"two"),
        Err(CompressError::Dictionary)
    );
}

#[test]
fn long_dictionary_keeps_tail() {
    // 40 KiB dictionary: only the last 32 KiB can ever be referenced.
    let dict: Vec<u8> = (0..40_960u32).map(|i| (i % 199) as u8).collect();
    let mut stream = Stream::new(Framing::Raw, 0).unwrap();
    stream.set_dictionary(&dict).unwrap();
    let mut out = vec![0u8; 4096];
    let (_, written) = stream.compress(b"tail", &mut out, Finalize::Finish).unwrap();
    assert!(written > 0);
}

#[test]
fn errors_format_usefully() {
    let err = CompressError::OutputFull;
    assert_eq!(err.to_string(), "output buffer is full");
    assert_eq!(err.name(), "output_full");
}
