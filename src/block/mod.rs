//! Block-level compression: match finding, optimal parsing, splitting, and
//! DEFLATE block emission.

pub mod deflate;
pub mod matchfinder;
pub mod split;
pub mod suffix_array;
pub mod tables;

pub use matchfinder::Match;

pub(crate) use deflate::{evaluate_dynamic_cost, evaluate_static_cost, BlockCompressor};
pub(crate) use split::block_split;
