//! Huffman coding layer: bit-level output, canonical code construction, and
//! the code-length-table helpers shared by the block encoder.

pub mod bitwriter;
pub mod encoder;
pub mod rle_opt;

pub use bitwriter::BitWriter;
pub use encoder::{HuffmanEncoder, CODELEN_SYM_ORDER, MAX_CODES_MASK, MAX_SYMBOLS};
