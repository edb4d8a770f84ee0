//! Preset-dictionary loading.
//!
//! A dictionary primes the 32 KiB history window so the first block group
//! can reference bytes the decoder is assumed to already hold.  Only the
//! last 32 KiB of a longer file matters — earlier bytes could never be
//! reached by a match offset.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::frame::MAX_DICTIONARY_SIZE;

/// Read the last 32 KiB (at most) of `path` for use as a preset dictionary.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let file_size = file.seek(SeekFrom::End(0))?;

    if file_size > MAX_DICTIONARY_SIZE as u64 {
        file.seek(SeekFrom::End(-(MAX_DICTIONARY_SIZE as i64)))?;
    } else {
        file.seek(SeekFrom::Start(0))?;
    }

    let mut data = Vec::with_capacity(MAX_DICTIONARY_SIZE.min(file_size as usize));
    file.take(MAX_DICTIONARY_SIZE as u64).read_to_end(&mut data)?;
    Ok(data)
}
