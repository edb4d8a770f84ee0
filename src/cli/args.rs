//! Command-line argument definitions.

use clap::{Parser, ValueEnum};

use crate::frame::Framing;

/// Output framing selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// gzip member (RFC 1952), `.gz`.
    Gzip,
    /// zlib stream (RFC 1950), `.zz`.
    Zlib,
    /// bare DEFLATE stream (RFC 1951), `.deflate`.
    Raw,
}

impl FormatArg {
    pub fn framing(self) -> Framing {
        match self {
            FormatArg::Gzip => Framing::Gzip,
            FormatArg::Zlib => Framing::Zlib,
            FormatArg::Raw => Framing::Raw,
        }
    }

    /// Conventional extension appended to output filenames.
    pub fn extension(self) -> &'static str {
        match self {
            FormatArg::Gzip => "gz",
            FormatArg::Zlib => "zz",
            FormatArg::Raw => "deflate",
        }
    }
}

/// Optimal DEFLATE/zlib/gzip compressor.
///
/// Compresses each FILE (or standard input) at the highest ratio this
/// encoder can reach.  There are no speed levels: every stream takes the
/// optimal path.
#[derive(Debug, Parser)]
#[command(name = "ultraflate", version, about, max_term_width = 100)]
pub struct Cli {
    /// Files to compress; reads standard input when empty.
    pub files: Vec<String>,

    /// Output framing.
    #[arg(short, long, value_enum, default_value_t = FormatArg::Gzip)]
    pub format: FormatArg,

    /// Write output to FILE (single input only).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Write to standard output instead of files.
    #[arg(short = 'c', long)]
    pub stdout: bool,

    /// Overwrite existing output files.
    #[arg(short = 'F', long)]
    pub force: bool,

    /// Remove input files after successful compression.
    #[arg(long)]
    pub rm: bool,

    /// Block-group size in bytes (32768..=2097152; 0 = default 1 MiB).
    #[arg(short, long, value_name = "BYTES", default_value_t = 0)]
    pub block_size: usize,

    /// Preset dictionary file (zlib and raw framing only; last 32 KiB used).
    #[arg(short = 'D', long, value_name = "FILE")]
    pub dictionary: Option<String>,

    /// Suppress all messages below errors.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
