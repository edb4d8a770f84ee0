//! DEFLATE byte-stream format constants (RFC 1951) and compressor tuning
//! parameters shared across the crate.

// ─────────────────────────────────────────────────────────────────────────────
// Match and window geometry (RFC 1951 §3.2.5)
// ─────────────────────────────────────────────────────────────────────────────

/// Shortest representable match.
pub const MIN_MATCH_SIZE: usize = 3;
/// Longest representable match.
pub const MAX_MATCH_SIZE: usize = 258;
/// Smallest representable match offset.
pub const MIN_OFFSET: usize = 1;
/// Largest representable match offset (the DEFLATE window size).
pub const MAX_OFFSET: usize = 32768;
/// Bytes of prior context carried in front of each block group; matches may
/// reach this far back into the previous group or a preset dictionary.
pub const HISTORY_SIZE: usize = 32768;

// ─────────────────────────────────────────────────────────────────────────────
// Alphabet sizes (RFC 1951 §3.2.5–§3.2.7)
// ─────────────────────────────────────────────────────────────────────────────

/// Bits used to transmit each code-length-code length in the block header.
pub const NCODELEN_BITS: u32 = 3;
/// Size of the code-length alphabet (symbols 0..=18).
pub const NCODELEN_SYMS: usize = 19;
/// Size of the literal/length alphabet, including the two reserved symbols.
pub const NLITERAL_SYMS: usize = 288;
/// Literal/length symbols that may legally appear in a header (286/287 are
/// reserved).
pub const NVALID_LITERAL_SYMS: usize = 286;
/// End-of-block marker symbol.
pub const EOD_MARKER_SYM: usize = 256;
/// First match-length symbol.
pub const NMATCHLEN_SYM_START: usize = 257;
/// Number of match-length symbols (257..=285).
pub const NMATCHLEN_SYMS: usize = 29;
/// Size of the distance alphabet, including the two reserved symbols.
pub const NOFFSET_SYMS: usize = 32;
/// Distance symbols that may legally appear in a header (30/31 are reserved).
pub const NVALID_OFFSET_SYMS: usize = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Parser and splitter tuning
// ─────────────────────────────────────────────────────────────────────────────

/// Candidate matches recorded per input position for the optimal parser.
pub const NMATCHES_PER_OFFSET: usize = 8;
/// log2 of [`NMATCHES_PER_OFFSET`], for index arithmetic.
pub const MATCHES_PER_OFFSET_SHIFT: usize = 3;

/// Matches at least this long are never shortened by the optimal parser;
/// evaluating every prefix of long matches costs DP time for no measurable
/// ratio gain.
pub const LEAVE_ALONE_MATCH_SIZE: usize = 40;

/// The last byte of every block is encoded as a literal so the end-of-block
/// marker can follow it.
pub const LAST_LITERALS: usize = 1;
/// Positions past `end − LAST_MATCH_OFFSET` receive no match candidates; a
/// minimum-length match starting there could not leave the final literal.
pub const LAST_MATCH_OFFSET: usize = MIN_MATCH_SIZE + LAST_LITERALS;

/// Maximum number of sub-blocks the splitter may carve out of one block group.
pub const MAX_SPLITS: usize = 64;
