//! Stream framing: raw DEFLATE, zlib (RFC 1950) and gzip (RFC 1952)
//! headers, trailers, and the matching running checksums.
//!
//! The compressed payload is identical under all three framings; only the
//! bytes around it and the checksum algorithm differ.  zlib carries a
//! big-endian Adler-32 trailer, gzip a little-endian CRC-32 followed by the
//! little-endian original length (mod 2³²), raw DEFLATE nothing at all.

use crate::error::CompressError;
use crate::format::HISTORY_SIZE;

/// Byte framing around the DEFLATE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum Framing {
    /// Bare RFC 1951 stream, no header or trailer.
    #[default]
    Raw = 0,
    /// RFC 1950: 2-byte header (6 with a preset dictionary), big-endian
    /// Adler-32 trailer.
    Zlib = 1,
    /// RFC 1952: 10-byte header, little-endian CRC-32 + ISIZE trailer.
    Gzip = 2,
}

/// Largest header or footer any framing emits (zlib header with FDICT).
pub(crate) const MAX_FRAME_SIZE: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Headers
// ─────────────────────────────────────────────────────────────────────────────

/// Header size in bytes for the given framing and optional preset
/// dictionary.
pub(crate) fn header_size(framing: Framing, dictionary: Option<&[u8]>) -> usize {
    match framing {
        Framing::Raw => 0,
        Framing::Zlib => {
            if dictionary.is_some() {
                6
            } else {
                2
            }
        }
        Framing::Gzip => 10,
    }
}

/// Encode the stream header into `buf`, returning the number of bytes
/// written.
pub(crate) fn encode_header(
    buf: &mut [u8],
    framing: Framing,
    dictionary: Option<&[u8]>,
) -> Result<usize, CompressError> {
    let size = header_size(framing, dictionary);
    if buf.len() < size {
        return Err(CompressError::OutputFull);
    }

    match framing {
        Framing::Raw => Ok(0),
        Framing::Zlib => {
            // CMF: CM=8 (deflate), CINFO=7 (32 KiB window).
            let cmf: u8 = 0x78;
            // FLG: FLEVEL=2, FDICT per dictionary, FCHECK makes the pair a
            // multiple of 31.
            let mut flg: u8 = 2 << 6;
            if dictionary.is_some() {
                flg |= 1 << 5;
            }
            let value = (cmf as u32) << 8 | flg as u32;
            flg |= ((31 - value % 31) % 31) as u8;
            buf[0] = cmf;
            buf[1] = flg;
            if let Some(dict) = dictionary {
                // DICTID: Adler-32 of the dictionary, big-endian.
                let mut adler = simd_adler32::Adler32::new();
                adler.write(dict);
                buf[2..6].copy_from_slice(&adler.finish().to_be_bytes());
            }
            Ok(size)
        }
        Framing::Gzip => {
            if dictionary.is_some() {
                // RFC 1952 has no preset-dictionary field.
                return Err(CompressError::Dictionary);
            }
            buf[..10].copy_from_slice(&[
                0x1f, 0x8b, // magic
                0x08, // CM = deflate
                0x00, // FLG: no extra fields
                0x00, 0x00, 0x00, 0x00, // MTIME unset
                0x00, // XFL
                0xff, // OS unknown
            ]);
            Ok(10)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Checksums
// ─────────────────────────────────────────────────────────────────────────────

/// Initial checksum value for the framing (Adler-32 starts at 1).
pub(crate) fn init_checksum(framing: Framing) -> u32 {
    match framing {
        Framing::Zlib => 1,
        Framing::Raw | Framing::Gzip => 0,
    }
}

/// Fold `data` into the running checksum.
pub(crate) fn update_checksum(checksum: u32, data: &[u8], framing: Framing) -> u32 {
    match framing {
        Framing::Raw => checksum,
        Framing::Zlib => {
            let mut adler = simd_adler32::Adler32::from_checksum(checksum);
            adler.write(data);
            adler.finish()
        }
        Framing::Gzip => {
            let mut hasher = crc32fast::Hasher::new_with_initial(checksum);
            hasher.update(data);
            hasher.finalize()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Footers
// ─────────────────────────────────────────────────────────────────────────────

/// Footer size in bytes for the given framing.
pub(crate) fn footer_size(framing: Framing) -> usize {
    match framing {
        Framing::Raw => 0,
        Framing::Zlib => 4,
        Framing::Gzip => 8,
    }
}

/// Encode the stream footer into `buf`, returning the number of bytes
/// written.
pub(crate) fn encode_footer(
    buf: &mut [u8],
    checksum: u32,
    original_size: u64,
    framing: Framing,
) -> Result<usize, CompressError> {
    let size = footer_size(framing);
    if buf.len() < size {
        return Err(CompressError::OutputFull);
    }
    match framing {
        Framing::Raw => {}
        Framing::Zlib => buf[..4].copy_from_slice(&checksum.to_be_bytes()),
        Framing::Gzip => {
            buf[..4].copy_from_slice(&checksum.to_le_bytes());
            buf[4..8].copy_from_slice(&(original_size as u32).to_le_bytes());
        }
    }
    Ok(size)
}

/// Largest usable preset dictionary; longer ones are truncated to their tail
/// by the callers.
pub const MAX_DICTIONARY_SIZE: usize = HISTORY_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_header_is_78_9c() {
        let mut buf = [0u8; 10];
        let n = encode_header(&mut buf, Framing::Zlib, None).unwrap();
        assert_eq!(&buf[..n], &[0x78, 0x9c]);
    }

    #[test]
    fn zlib_header_with_dictionary_sets_fdict_and_dictid() {
        let mut buf = [0u8; 10];
        let dict = b"sample dictionary";
        let n = encode_header(&mut buf, Framing::Zlib, Some(dict)).unwrap();
        assert_eq!(n, 6);
        assert_eq!(buf[0], 0x78);
        assert_ne!(buf[1] & 0x20, 0, "FDICT not set");
        // The header pair must still be a multiple of 31.
        assert_eq!(((buf[0] as u32) << 8 | buf[1] as u32) % 31, 0);
        let mut adler = simd_adler32::Adler32::new();
        adler.write(dict);
        assert_eq!(&buf[2..6], &adler.finish().to_be_bytes());
    }

    #[test]
    fn gzip_header_matches_rfc1952() {
        let mut buf = [0u8; 10];
        let n = encode_header(&mut buf, Framing::Gzip, None).unwrap();
        assert_eq!(
            &buf[..n],
            &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff]
        );
    }

    #[test]
    fn gzip_rejects_dictionary() {
        let mut buf = [0u8; 10];
        assert_eq!(
            encode_header(&mut buf, Framing::Gzip, Some(b"dict")),
            Err(CompressError::Dictionary)
        );
    }

    #[test]
    fn adler_of_a_is_00620062() {
        let sum = update_checksum(init_checksum(Framing::Zlib), b"a", Framing::Zlib);
        assert_eq!(sum, 0x0062_0062);
    }

    #[test]
    fn empty_gzip_footer() {
        let mut buf = [0u8; 8];
        let n = encode_footer(&mut buf, 0, 0, Framing::Gzip).unwrap();
        assert_eq!(&buf[..n], &[0u8; 8]);
    }

    #[test]
    fn sizes_are_consistent() {
        for framing in [Framing::Raw, Framing::Zlib, Framing::Gzip] {
            let mut buf = [0u8; MAX_FRAME_SIZE];
            assert_eq!(
                encode_header(&mut buf, framing, None).unwrap(),
                header_size(framing, None)
            );
            assert_eq!(
                encode_footer(&mut buf, 0x1234_5678, 42, framing).unwrap(),
                footer_size(framing)
            );
        }
    }
}
