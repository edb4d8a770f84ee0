//! Streaming compression context and block-group orchestration.
//!
//! A [`Stream`] accepts input incrementally, buffers up to one block group
//! (`max_block_size` bytes) plus 32 KiB of history, and for each full (or
//! final) group runs the pipeline: suffix array → match-finder priming over
//! history → candidate matches over the new bytes → block splitting → per
//! sub-range static/dynamic choice, optimal parse, and emission — with the
//! stored-block fallback whenever a compressed attempt expands.
//!
//! All working memory is allocated once in [`Stream::new`] and reused across
//! block groups; the last 32 KiB of each group shifts into the history slot
//! for the next one.

use crate::block::{block_split, evaluate_dynamic_cost, evaluate_static_cost, BlockCompressor};
use crate::error::CompressError;
use crate::format::{HISTORY_SIZE, MAX_SPLITS};
use crate::frame::{self, Framing, MAX_DICTIONARY_SIZE, MAX_FRAME_SIZE};
use crate::huffman::BitWriter;

/// Smallest accepted block-group size.
pub const MIN_BLOCK_SIZE: usize = 32768;
/// Largest accepted block-group size.
pub const MAX_BLOCK_SIZE: usize = 2_097_152;
/// Block-group size used when the caller passes 0.
pub const DEFAULT_BLOCK_SIZE: usize = 1_048_576;

/// Whether more input follows the current [`Stream::compress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalize {
    /// More data is coming.
    Continue,
    /// This is the last of the data: flush everything and emit the trailer.
    Finish,
}

impl Finalize {
    #[inline]
    fn is_finish(self) -> bool {
        matches!(self, Finalize::Finish)
    }
}

// Compression-state bits.
const CSTATE_HAS_DICTIONARY: u32 = 1;
const CSTATE_HEADER_EMITTED: u32 = 2;
const CSTATE_FINALIZED: u32 = 4;
const CSTATE_FOOTER_EMITTED: u32 = 8;

/// Clamp a requested block size to the supported range; 0 selects the
/// default.
pub(crate) fn clamp_block_size(max_block_size: usize) -> usize {
    if max_block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        max_block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE)
    }
}

/// Staging-buffer size for one block group: the raw bytes, LEN/NLEN and
/// padding for every possible stored chunk, and bit-padding per sub-range.
fn out_buffer_size(block_size: usize) -> usize {
    1 + block_size + (1 + 4 + 1) * MAX_SPLITS + 5 * (block_size / 65535 + 1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Compressor state
// ─────────────────────────────────────────────────────────────────────────────

/// Heap-allocated compressor state behind a [`Stream`].
struct Compressor {
    flags: Framing,
    max_block_size: usize,
    /// Preset dictionary, installed into the history slot before the first
    /// block group.
    dictionary: Option<Vec<u8>>,

    /// Input window: `HISTORY_SIZE` bytes of context, then the block bytes.
    in_data: Vec<u8>,
    /// Bytes buffered in the block slot so far.
    cur_in_bytes: usize,
    /// History bytes valid in front of the block slot.
    previous_block_size: usize,

    /// Staging buffer for one block group of compressed output.
    out_buffer: Vec<u8>,
    cur_out_index: usize,
    pending_out_bytes: usize,
    bitwriter: BitWriter,

    compression_state: u32,

    /// Staging buffer for the frame header/footer.
    frame_buffer: [u8; MAX_FRAME_SIZE],
    cur_frame_index: usize,
    pending_frame_bytes: usize,

    block: BlockCompressor,
    splits: Vec<usize>,
}

/// Streaming compressor.
///
/// Create with [`Stream::new`], optionally call
/// [`set_dictionary`](Self::set_dictionary), then call
/// [`compress`](Self::compress) with input and output slices until all input
/// is consumed and, after a [`Finalize::Finish`] call, all pending output
/// has been drained.  A stream that returned an error is poisoned and must
/// be dropped.
pub struct Stream {
    state: Box<Compressor>,
    total_in: u64,
    total_out: u64,
    checksum: u32,
}

impl Stream {
    /// Allocate a compressor for the given framing and block-group size
    /// (0 = default 1 MiB; clamped to 32 KiB..=2 MiB).
    pub fn new(framing: Framing, max_block_size: usize) -> Result<Self, CompressError> {
        let block_size = clamp_block_size(max_block_size);
        let window_size = HISTORY_SIZE + block_size;

        Ok(Self {
            state: Box::new(Compressor {
                flags: framing,
                max_block_size: block_size,
                dictionary: None,
                in_data: vec![0; window_size],
                cur_in_bytes: 0,
                previous_block_size: 0,
                out_buffer: vec![0; out_buffer_size(block_size)],
                cur_out_index: 0,
                pending_out_bytes: 0,
                bitwriter: BitWriter::new(0, out_buffer_size(block_size)),
                compression_state: 0,
                frame_buffer: [0; MAX_FRAME_SIZE],
                cur_frame_index: 0,
                pending_frame_bytes: 0,
                block: BlockCompressor::new(window_size),
                splits: Vec::with_capacity(MAX_SPLITS),
            }),
            total_in: 0,
            total_out: 0,
            checksum: 0,
        })
    }

    /// Install a preset dictionary.  Must be called before the first
    /// [`compress`](Self::compress); only the last 32 KiB of a longer
    /// dictionary is kept.  Rejected for gzip framing, which cannot signal
    /// a dictionary to the decoder.
    pub fn set_dictionary(&mut self, data: &[u8]) -> Result<(), CompressError> {
        if self.state.compression_state != 0 {
            return Err(CompressError::Dictionary);
        }
        if self.state.flags == Framing::Gzip {
            return Err(CompressError::Dictionary);
        }
        let tail = if data.len() > MAX_DICTIONARY_SIZE {
            &data[data.len() - MAX_DICTIONARY_SIZE..]
        } else {
            data
        };
        self.state.dictionary = Some(tail.to_vec());
        self.state.compression_state |= CSTATE_HAS_DICTIONARY;
        Ok(())
    }

    /// Total uncompressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total compressed bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Running checksum of the consumed input (Adler-32 for zlib, CRC-32
    /// for gzip, 0 for raw).
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// True once a [`Finalize::Finish`] call has flushed every pending byte.
    pub fn is_finished(&self) -> bool {
        self.state.compression_state & CSTATE_FOOTER_EMITTED != 0
            && self.state.pending_frame_bytes == 0
            && self.state.pending_out_bytes == 0
    }

    /// Consume input and produce output; returns `(consumed, written)`.
    ///
    /// May be called repeatedly.  Output is produced in three phases per
    /// stream: header, block groups, trailer.  With `Finalize::Finish`,
    /// keep calling until [`is_finished`](Self::is_finished) reports true
    /// (a single call suffices when `output` is sized by
    /// [`crate::memory_bound`]).
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        finalize: Finalize,
    ) -> Result<(usize, usize), CompressError> {
        let mut in_pos = 0usize;
        let mut out_pos = 0usize;
        loop {
            self.compress_pass(input, &mut in_pos, output, &mut out_pos, finalize)?;
            if in_pos >= input.len() || out_pos >= output.len() {
                break;
            }
        }
        Ok((in_pos, out_pos))
    }

    /// One pass of the compression state machine: emit/drain header, accept
    /// input, compress a due block group, drain output, emit/drain trailer.
    fn compress_pass(
        &mut self,
        input: &[u8],
        in_pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
        finalize: Finalize,
    ) -> Result<(), CompressError> {
        let c = &mut *self.state;

        // Stream header.
        if c.compression_state & CSTATE_HEADER_EMITTED == 0 {
            c.compression_state |= CSTATE_HEADER_EMITTED;
            let n = frame::encode_header(&mut c.frame_buffer, c.flags, c.dictionary.as_deref())?;
            c.cur_frame_index = 0;
            c.pending_frame_bytes = n;
            self.checksum = frame::init_checksum(c.flags);
        }

        drain(
            &c.frame_buffer,
            &mut c.cur_frame_index,
            &mut c.pending_frame_bytes,
            output,
            out_pos,
            &mut self.total_out,
        );

        // A preset dictionary becomes the initial history.
        if c.previous_block_size == 0 {
            if let Some(dict) = c.dictionary.as_deref() {
                if !dict.is_empty() {
                    c.in_data[HISTORY_SIZE - dict.len()..HISTORY_SIZE].copy_from_slice(dict);
                    c.previous_block_size = dict.len();
                }
            }
        }

        // Accept input; compress the buffered group when it is full and more
        // input is waiting, or when finishing.
        if c.pending_frame_bytes == 0 && c.pending_out_bytes == 0 {
            let take = (input.len() - *in_pos).min(c.max_block_size - c.cur_in_bytes);
            c.in_data[HISTORY_SIZE + c.cur_in_bytes..HISTORY_SIZE + c.cur_in_bytes + take]
                .copy_from_slice(&input[*in_pos..*in_pos + take]);
            *in_pos += take;
            self.total_in += take as u64;
            c.cur_in_bytes += take;

            let more_input = *in_pos < input.len();
            if (c.cur_in_bytes >= c.max_block_size && more_input) || finalize.is_finish() {
                if c.cur_in_bytes > 0 {
                    self.checksum = compress_block_group(
                        c,
                        self.checksum,
                        finalize.is_finish() && !more_input,
                    )?;
                } else if finalize.is_finish()
                    && c.compression_state & (CSTATE_FINALIZED | CSTATE_FOOTER_EMITTED) == 0
                {
                    // Nothing buffered: terminate the stream with an empty
                    // static block (BFINAL=1, BTYPE=01, end-of-block).
                    c.bitwriter.put_bits(&mut c.out_buffer, 1, 1)?;
                    c.bitwriter.put_bits(&mut c.out_buffer, 1, 2)?;
                    c.bitwriter.put_bits(&mut c.out_buffer, 0, 7)?;
                    c.bitwriter.flush_bits(&mut c.out_buffer)?;
                    c.compression_state |= CSTATE_FINALIZED;
                    c.pending_out_bytes = c.bitwriter.offset();
                    c.cur_out_index = 0;
                    c.bitwriter.set_offset(0);
                }
            }
        }

        // Drain compressed block bytes, header first.
        if c.pending_frame_bytes == 0 {
            drain(
                &c.out_buffer,
                &mut c.cur_out_index,
                &mut c.pending_out_bytes,
                output,
                out_pos,
                &mut self.total_out,
            );
        }

        // Stream trailer, once everything before it has been flushed.
        if c.pending_frame_bytes == 0
            && c.pending_out_bytes == 0
            && c.compression_state & CSTATE_FINALIZED != 0
            && c.compression_state & CSTATE_FOOTER_EMITTED == 0
        {
            let n = frame::encode_footer(&mut c.frame_buffer, self.checksum, self.total_in, c.flags)?;
            c.compression_state =
                (c.compression_state | CSTATE_FOOTER_EMITTED) & !CSTATE_FINALIZED;
            c.cur_frame_index = 0;
            c.pending_frame_bytes = n;
        }

        drain(
            &c.frame_buffer,
            &mut c.cur_frame_index,
            &mut c.pending_frame_bytes,
            output,
            out_pos,
            &mut self.total_out,
        );

        Ok(())
    }
}

/// Copy as much pending staged data to the caller's output as fits.
fn drain(
    staged: &[u8],
    cur_index: &mut usize,
    pending: &mut usize,
    output: &mut [u8],
    out_pos: &mut usize,
    total_out: &mut u64,
) {
    if *pending == 0 {
        return;
    }
    let take = (output.len() - *out_pos).min(*pending);
    output[*out_pos..*out_pos + take].copy_from_slice(&staged[*cur_index..*cur_index + take]);
    *cur_index += take;
    *pending -= take;
    *out_pos += take;
    *total_out += take as u64;
}

// ─────────────────────────────────────────────────────────────────────────────
// Block-group compression
// ─────────────────────────────────────────────────────────────────────────────

/// Compress the buffered block group, leaving the result pending in the
/// staging buffer.  Returns the updated checksum.
fn compress_block_group(
    c: &mut Compressor,
    checksum: u32,
    stream_ends_here: bool,
) -> Result<u32, CompressError> {
    let n = c.cur_in_bytes;
    c.cur_in_bytes = 0;

    let checksum = frame::update_checksum(
        checksum,
        &c.in_data[HISTORY_SIZE..HISTORY_SIZE + n],
        c.flags,
    );

    let prev = c.previous_block_size;
    let window_start = HISTORY_SIZE - prev;
    let window = &c.in_data[window_start..window_start + prev + n];

    c.block.finder.build(window);
    if prev > 0 {
        c.block.finder.skip_matches(0, prev);
    }
    c.block.finder.find_all_matches(prev, prev + n);

    block_split(&mut c.block, window, prev, n, MAX_SPLITS, &mut c.splits)?;

    let mut in_start = 0usize;
    let mut split_idx = 0usize;
    while in_start < n {
        let block_size = c.splits[split_idx] - (in_start + prev);
        split_idx += 1;

        // Static vs dynamic, estimated over a greedy parse; ties favor the
        // smaller static header.
        c.block.prepare_cost_evaluation(window, prev + in_start, block_size);
        let static_cost = evaluate_static_cost(&c.block.literals, &c.block.offsets);
        c.block.literals.estimate_code_lengths();
        c.block.offsets.estimate_code_lengths();
        let dynamic_cost = evaluate_dynamic_cost(&c.block.literals, &c.block.offsets);
        let is_dynamic = static_cost > dynamic_cost;

        let is_final = stream_ends_here && (in_start + block_size) >= n;
        let saved_writer = c.bitwriter;

        let attempt = try_compressed_block(
            &mut c.block,
            &mut c.bitwriter,
            &mut c.out_buffer,
            window,
            prev + in_start,
            block_size,
            is_final,
            is_dynamic,
        );

        if attempt.is_err() {
            // Not compressible: rewind to before the BFINAL bit and re-emit
            // the range as stored blocks.
            c.bitwriter = saved_writer;

            let mut sub_offset = 0usize;
            let mut remaining = block_size;
            while remaining > 0 {
                let chunk = remaining.min(65535);
                let chunk_final = is_final && chunk == remaining;

                c.bitwriter
                    .put_bits(&mut c.out_buffer, chunk_final as u32, 1)?;
                c.bitwriter.put_bits(&mut c.out_buffer, 0, 2)?;
                c.bitwriter.flush_bits(&mut c.out_buffer)?;

                let mut w = c.bitwriter.offset();
                if w + 4 + chunk > c.out_buffer.len() {
                    return Err(CompressError::OutputFull);
                }
                let len = chunk as u16;
                c.out_buffer[w..w + 2].copy_from_slice(&len.to_le_bytes());
                c.out_buffer[w + 2..w + 4].copy_from_slice(&(!len).to_le_bytes());
                w += 4;
                let src = HISTORY_SIZE + in_start + sub_offset;
                c.out_buffer[w..w + chunk].copy_from_slice(&c.in_data[src..src + chunk]);
                c.bitwriter.set_offset(w + chunk);

                sub_offset += chunk;
                remaining -= chunk;
            }
        }

        in_start += block_size;
    }

    // The tail of this group becomes the next group's history.
    c.previous_block_size = n.min(HISTORY_SIZE);
    let carried = c.previous_block_size;
    if carried > 0 {
        c.in_data
            .copy_within(HISTORY_SIZE + n - carried..HISTORY_SIZE + n, HISTORY_SIZE - carried);
    }

    if stream_ends_here {
        c.bitwriter.flush_bits(&mut c.out_buffer)?;
        c.compression_state |= CSTATE_FINALIZED;
    }

    c.pending_out_bytes = c.bitwriter.offset();
    c.cur_out_index = 0;
    c.bitwriter.set_offset(0);

    Ok(checksum)
}

/// Emit BFINAL, BTYPE and one compressed sub-block; fails when the
/// compressed form is larger than the stored-block encoding of the same
/// bytes would be, so the caller can fall back to stored blocks.
#[allow(clippy::too_many_arguments)]
fn try_compressed_block(
    block: &mut BlockCompressor,
    bw: &mut BitWriter,
    out: &mut [u8],
    window: &[u8],
    start: usize,
    size: usize,
    is_final: bool,
    is_dynamic: bool,
) -> Result<(), CompressError> {
    bw.put_bits(out, is_final as u32, 1)?;
    bw.put_bits(out, 1 + is_dynamic as u32, 2)?;
    let data_start = bw.offset();
    block.compress_block(bw, out, window, start, size, is_dynamic)?;
    // Stored form costs 5 bytes of LEN/NLEN framing per 65535-byte chunk.
    let stored_size = size + 5 * (size / 65535 + 1);
    if bw.offset() - data_start > stored_size {
        return Err(CompressError::OutputFull);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// One-shot helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Worst-case compressed size for `input_size` bytes under the given
/// framing and block size.  Covers the raw bytes plus per-sub-block framing
/// overhead, assuming every block falls back to stored form.
pub fn memory_bound(input_size: usize, framing: Framing, max_block_size: usize) -> usize {
    let block_size = clamp_block_size(max_block_size);
    // Even an empty stream emits one terminating block.
    let groups = ((input_size + block_size - 1) / block_size).max(1);
    frame::header_size(framing, None)
        + groups * (1 + 4 + 1) * MAX_SPLITS
        + input_size
        + 1
        + frame::footer_size(framing)
}

/// Compress `input` into `output` in one call; returns the number of bytes
/// written.  `output` should be sized with [`memory_bound`].
pub fn compress_in_memory(
    input: &[u8],
    output: &mut [u8],
    framing: Framing,
    max_block_size: usize,
) -> Result<usize, CompressError> {
    let mut stream = Stream::new(framing, max_block_size)?;
    let (consumed, written) = stream.compress(input, output, Finalize::Finish)?;
    if consumed < input.len() || !stream.is_finished() {
        return Err(CompressError::OutputFull);
    }
    Ok(written)
}

/// Compress `input` into a freshly allocated buffer.
pub fn compress_to_vec(
    input: &[u8],
    framing: Framing,
    max_block_size: usize,
) -> Result<Vec<u8>, CompressError> {
    let mut output = vec![0u8; memory_bound(input.len(), framing, max_block_size)];
    let written = compress_in_memory(input, &mut output, framing, max_block_size)?;
    output.truncate(written);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_clamping() {
        assert_eq!(clamp_block_size(0), DEFAULT_BLOCK_SIZE);
        assert_eq!(clamp_block_size(1), MIN_BLOCK_SIZE);
        assert_eq!(clamp_block_size(1 << 30), MAX_BLOCK_SIZE);
        assert_eq!(clamp_block_size(65536), 65536);
    }

    #[test]
    fn empty_finish_emits_terminating_block() {
        let mut stream = Stream::new(Framing::Raw, 0).unwrap();
        let mut out = [0u8; 16];
        let (consumed, written) = stream.compress(&[], &mut out, Finalize::Finish).unwrap();
        assert_eq!(consumed, 0);
        // BFINAL=1, BTYPE=01, 7-bit end-of-block codeword, zero padded.
        assert_eq!(&out[..written], &[0x03, 0x00]);
        assert!(stream.is_finished());
    }

    #[test]
    fn dictionary_after_compress_is_rejected() {
        let mut stream = Stream::new(Framing::Raw, 0).unwrap();
        let mut out = [0u8; 64];
        stream.compress(b"xy", &mut out, Finalize::Continue).unwrap();
        assert_eq!(
            stream.set_dictionary(b"dict"),
            Err(CompressError::Dictionary)
        );
    }

    #[test]
    fn dictionary_with_gzip_is_rejected() {
        let mut stream = Stream::new(Framing::Gzip, 0).unwrap();
        assert_eq!(
            stream.set_dictionary(b"dict"),
            Err(CompressError::Dictionary)
        );
    }

    #[test]
    fn output_can_be_drained_byte_by_byte() {
        let input = b"drip drip drip drip drip drip";
        let mut stream = Stream::new(Framing::Zlib, 0).unwrap();
        let mut collected = Vec::new();
        let mut in_pos = 0usize;
        loop {
            let mut byte = [0u8; 1];
            let (consumed, written) =
                stream.compress(&input[in_pos..], &mut byte, Finalize::Finish).unwrap();
            in_pos += consumed;
            collected.extend_from_slice(&byte[..written]);
            if stream.is_finished() {
                break;
            }
        }
        assert_eq!(in_pos, input.len());
        let whole = compress_to_vec(input, Framing::Zlib, 0).unwrap();
        assert_eq!(collected, whole);
    }

    #[test]
    fn memory_bound_is_generous_enough_for_stored_data() {
        for size in [0usize, 1, 1000, 70_000] {
            let bound = memory_bound(size, Framing::Gzip, MIN_BLOCK_SIZE);
            // Raw bytes + per-chunk stored overhead + framing always fit.
            assert!(bound >= size + 5 * (size / 65535 + 1) + 20);
        }
    }
}
