//! Optimal DEFLATE compression with zlib and gzip framing.
//!
//! `ultraflate` always runs its optimal path: a suffix-array match finder
//! feeds a backward shortest-path parser, block boundaries are chosen by
//! entropy drift, and Huffman tables are refined over multiple parse passes
//! before bit-exact emission.  Output is a standard RFC 1951 stream
//! readable by any inflater, optionally wrapped per RFC 1950 (zlib) or
//! RFC 1952 (gzip).

pub mod block;
pub mod cli;
pub mod dictionary;
pub mod error;
pub mod file;
pub mod format;
pub mod frame;
pub mod huffman;
pub mod stream;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level re-exports for the common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for all compression operations.
pub use error::CompressError;

/// Stream framing selector (raw DEFLATE / zlib / gzip).
pub use frame::Framing;

/// Streaming compression context.
pub use stream::{Finalize, Stream};

/// Block-size limits and default.
pub use stream::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Worst-case compressed size for a given input size.
pub use stream::memory_bound;

/// One-shot compression into a caller-provided buffer.
pub use stream::compress_in_memory;

/// One-shot compression into a freshly allocated `Vec<u8>`.
pub use stream::compress_to_vec;

/// Streaming compression between `Read` and `Write` endpoints.
pub use file::compress_stream;

/// Preset-dictionary file loader (last 32 KiB of the file).
pub use dictionary::load_dictionary;

// ─────────────────────────────────────────────────────────────────────────────
// Version
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_RELEASE: u32 = 0;
pub const VERSION_STRING: &str = "0.1.0";

/// Library version as one number (e.g. 100 for v0.1.0).
pub fn version_number() -> u32 {
    VERSION_MAJOR * 100 * 100 + VERSION_MINOR * 100 + VERSION_RELEASE
}

/// Library version string.
pub fn version_string() -> &'static str {
    VERSION_STRING
}
