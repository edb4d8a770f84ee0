//! Streaming file compression over generic `Read` / `Write` endpoints.
//!
//! A thin adapter between [`crate::Stream`] and `std::io`, used by the CLI
//! and available to library callers that want framing-complete output
//! without managing buffers themselves.

use std::io::{self, Read, Write};

use crate::error::CompressError;
use crate::frame::Framing;
use crate::stream::{Finalize, Stream};

/// Chunk size for reading input and draining output.
const IO_CHUNK_SIZE: usize = 64 * 1024;

fn to_io_error(err: CompressError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

/// Compress everything from `reader` to `writer`; returns
/// `(bytes_read, bytes_written)`.
///
/// `max_block_size` follows the [`Stream::new`] rules (0 = default), and
/// `dictionary` is installed before the first byte when present.
pub fn compress_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    framing: Framing,
    max_block_size: usize,
    dictionary: Option<&[u8]>,
) -> io::Result<(u64, u64)> {
    let mut stream = Stream::new(framing, max_block_size).map_err(to_io_error)?;
    if let Some(dict) = dictionary {
        stream.set_dictionary(dict).map_err(to_io_error)?;
    }

    let mut in_buf = vec![0u8; IO_CHUNK_SIZE];
    let mut out_buf = vec![0u8; IO_CHUNK_SIZE];
    let mut in_len = 0usize;
    let mut in_pos = 0usize;
    let mut eof = false;

    loop {
        if in_pos == in_len && !eof {
            in_len = reader.read(&mut in_buf)?;
            in_pos = 0;
            eof = in_len == 0;
        }

        let finalize = if eof {
            Finalize::Finish
        } else {
            Finalize::Continue
        };
        let (consumed, written) = stream
            .compress(&in_buf[in_pos..in_len], &mut out_buf, finalize)
            .map_err(to_io_error)?;
        in_pos += consumed;
        writer.write_all(&out_buf[..written])?;

        if eof && stream.is_finished() {
            break;
        }
    }

    writer.flush()?;
    Ok((stream.total_in(), stream.total_out()))
}
