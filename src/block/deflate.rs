//! Optimal DEFLATE block compression.
//!
//! [`BlockCompressor`] carries the per-stream coding state (the two Huffman
//! encoders, the match finder, and the parse/cost scratch) and implements:
//!
//! - the bit-cost model over the current code lengths;
//! - the backward shortest-path parse over the candidate match table;
//! - greedy and final entropy accounting;
//! - the static/dynamic code setup, convergence loop, post-optimization,
//!   table-RLE perturbation and mask search;
//! - token emission.
//!
//! Free functions [`evaluate_static_cost`] / [`evaluate_dynamic_cost`]
//! estimate whole-block bit costs from accumulated frequencies; the block
//! splitter and the stream layer use them to place split points and to pick
//! static vs dynamic coding per sub-block.

use crate::error::CompressError;
use crate::format::{
    EOD_MARKER_SYM, LAST_LITERALS, LEAVE_ALONE_MATCH_SIZE, MAX_OFFSET, MIN_MATCH_SIZE, MIN_OFFSET,
    NCODELEN_BITS, NCODELEN_SYMS, NLITERAL_SYMS, NMATCHES_PER_OFFSET, NMATCHLEN_SYMS,
    NMATCHLEN_SYM_START, NOFFSET_SYMS, NVALID_LITERAL_SYMS, NVALID_OFFSET_SYMS,
};
use crate::huffman::rle_opt::optimize_for_rle;
use crate::huffman::{BitWriter, HuffmanEncoder, MAX_CODES_MASK};

use super::matchfinder::{Match, MatchFinder};
use super::tables::{
    offset_index, LENGTH_SYM_EXTRA, LENGTH_TABLES, OFFSET_SYM_EXTRA, OFFSET_TABLES,
};

/// Extra code-refinement rounds after the initial greedy estimate.  The
/// parse depends on the code lengths and vice versa; a fixed number of
/// rounds reaches a stable point on realistic inputs.
const CONVERGENCE_PASSES: usize = 3;

// ─────────────────────────────────────────────────────────────────────────────
// Static (fixed) code lengths, RFC 1951 §3.2.6
// ─────────────────────────────────────────────────────────────────────────────

/// Code lengths of the fixed literal/length code.
pub(crate) fn static_literal_lengths() -> [u32; NLITERAL_SYMS] {
    let mut lengths = [8u32; NLITERAL_SYMS];
    for len in lengths.iter_mut().take(256).skip(144) {
        *len = 9;
    }
    for len in lengths.iter_mut().take(280).skip(256) {
        *len = 7;
    }
    lengths
}

// ─────────────────────────────────────────────────────────────────────────────
// BlockCompressor
// ─────────────────────────────────────────────────────────────────────────────

/// Per-stream block compression state, allocated once and reused across
/// block groups and sub-blocks.
pub(crate) struct BlockCompressor {
    /// Joint literal/length code.
    pub literals: HuffmanEncoder,
    /// Distance code.
    pub offsets: HuffmanEncoder,
    /// Suffix-array match finder over the current window.
    pub finder: MatchFinder,
    /// Chosen token per position; `length == 0` means literal.
    pub best_match: Vec<Match>,
    /// DP cost-to-end array, in bits.
    cost: Vec<u32>,
}

impl BlockCompressor {
    pub fn new(max_window_size: usize) -> Self {
        Self {
            literals: HuffmanEncoder::for_alphabet(NLITERAL_SYMS, 15),
            offsets: HuffmanEncoder::for_alphabet(NOFFSET_SYMS, 15),
            finder: MatchFinder::new(max_window_size),
            best_match: vec![Match::default(); max_window_size],
            cost: vec![0; max_window_size],
        }
    }

    /// Clear both coding contexts for a fresh block evaluation.
    fn reinit_encoders(&mut self) {
        self.literals.reset(0);
        self.offsets.reset(0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cost model
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn literal_cost(&self, byte: u8) -> u32 {
        self.literals.code_length[byte as usize]
    }

    #[inline]
    fn offset_symbol(&self, offset: usize) -> usize {
        OFFSET_TABLES.symbol[offset_index(offset)] as usize
    }

    #[inline]
    fn offset_cost(&self, offset: usize) -> u32 {
        let idx = offset_index(offset);
        self.offsets.code_length[OFFSET_TABLES.symbol[idx] as usize]
            + OFFSET_TABLES.extra[idx] as u32
    }

    /// Bit cost of a match length, given as `length − 3`.
    #[inline]
    fn varlen_cost(&self, enc_len: usize) -> u32 {
        let idx = enc_len.min(255);
        self.literals.code_length[LENGTH_TABLES.symbol[idx] as usize]
            + LENGTH_TABLES.extra[idx] as u32
    }

    #[inline]
    fn varlen_symbol(&self, enc_len: usize) -> usize {
        LENGTH_TABLES.symbol[enc_len.min(255)] as usize
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token emission
    // ─────────────────────────────────────────────────────────────────────────

    fn write_varlen(
        &self,
        bw: &mut BitWriter,
        out: &mut [u8],
        enc_len: usize,
    ) -> Result<(), CompressError> {
        let idx = enc_len.min(255);
        let base = LENGTH_TABLES.base[idx] as usize;
        let extra = LENGTH_TABLES.extra[idx] as u32;
        self.literals
            .write_codeword(LENGTH_TABLES.symbol[idx] as usize, bw, out)?;
        bw.put_bits(out, (enc_len - base) as u32, extra)
    }

    fn write_offset(
        &self,
        bw: &mut BitWriter,
        out: &mut [u8],
        offset: usize,
    ) -> Result<(), CompressError> {
        if !(MIN_OFFSET..=MAX_OFFSET).contains(&offset) {
            return Err(CompressError::Internal);
        }
        let idx = offset_index(offset);
        let base = OFFSET_TABLES.base[idx] as usize;
        let extra = OFFSET_TABLES.extra[idx] as u32;
        self.offsets
            .write_codeword(OFFSET_TABLES.symbol[idx] as usize, bw, out)?;
        bw.put_bits(out, (offset - base) as u32, extra)
    }

    /// Emit the chosen token sequence for `start..end`, then the end-of-block
    /// marker.
    fn write_block_data(
        &self,
        bw: &mut BitWriter,
        out: &mut [u8],
        window: &[u8],
        start: usize,
        end: usize,
    ) -> Result<(), CompressError> {
        let mut i = start;
        while i < end {
            let m = self.best_match[i];
            if m.length as usize >= MIN_MATCH_SIZE {
                self.write_varlen(bw, out, m.length as usize - MIN_MATCH_SIZE)?;
                self.write_offset(bw, out, m.offset as usize)?;
                i += m.length as usize;
            } else {
                self.literals.write_codeword(window[i] as usize, bw, out)?;
                i += 1;
            }
        }
        self.literals.write_codeword(EOD_MARKER_SYM, bw, out)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Optimal parse
    // ─────────────────────────────────────────────────────────────────────────

    /// Backward shortest-path parse of `start..end` under the current code
    /// lengths.  `cost[i]` is the minimum bit count for `window[i..end]`;
    /// `best_match[i]` records the token achieving it.
    ///
    /// Ties keep the first evaluated option: the literal, then longer
    /// candidate lengths before shorter ones.  Matches at least
    /// [`LEAVE_ALONE_MATCH_SIZE`] long are only evaluated at full length.
    pub fn optimize_matches(&mut self, window: &[u8], start: usize, end: usize) {
        if end <= start {
            return;
        }

        let mut cached_varlen = [0u32; LEAVE_ALONE_MATCH_SIZE];
        for (enc_len, slot) in cached_varlen.iter_mut().enumerate() {
            *slot = self.varlen_cost(enc_len);
        }

        self.cost[end - 1] = self.literal_cost(window[end - 1]);
        self.best_match[end - 1] = Match::default();

        for i in (start..end - 1).rev() {
            let mut best_cost = self.literal_cost(window[i]) + self.cost[i + 1];
            let mut best_len = 0usize;
            let mut best_off = 0usize;

            for m in 0..NMATCHES_PER_OFFSET {
                let cand = self.finder.matches_at(i)[m];
                if (cand.length as usize) < MIN_MATCH_SIZE {
                    break;
                }
                let offset_cost = self.offset_cost(cand.offset as usize);

                let mut match_len = cand.length as usize;
                if i + match_len > end - LAST_LITERALS {
                    match_len = end - LAST_LITERALS - i;
                }

                if cand.length as usize >= LEAVE_ALONE_MATCH_SIZE {
                    // A long match is taken whole or not at all.
                    if match_len >= MIN_MATCH_SIZE {
                        let cur = self.varlen_cost(match_len - MIN_MATCH_SIZE)
                            + offset_cost
                            + self.cost[i + match_len];
                        if best_cost > cur {
                            best_cost = cur;
                            best_len = match_len;
                            best_off = cand.offset as usize;
                        }
                    }
                } else {
                    // Every prefix shares the candidate's source position.
                    for k in (MIN_MATCH_SIZE..=match_len).rev() {
                        let cur =
                            cached_varlen[k - MIN_MATCH_SIZE] + offset_cost + self.cost[i + k];
                        if best_cost > cur {
                            best_cost = cur;
                            best_len = k;
                            best_off = cand.offset as usize;
                        }
                    }
                }
            }

            self.cost[i] = best_cost;
            self.best_match[i] = Match {
                length: best_len as u16,
                offset: best_off as u16,
            };
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entropy accounting
    // ─────────────────────────────────────────────────────────────────────────

    /// Accumulate symbol frequencies for `start..end`, walking either the
    /// greedy parse (first match candidate per position) or the optimizer's
    /// chosen parse.  Always counts one end-of-block marker.
    fn accumulate_entropy(&mut self, window: &[u8], start: usize, end: usize, use_best: bool) {
        let mut i = start;
        while i < end {
            let m = if use_best {
                self.best_match[i]
            } else {
                self.finder.first_match(i)
            };
            if m.length as usize >= MIN_MATCH_SIZE {
                let enc_len = m.length as usize - MIN_MATCH_SIZE;
                self.literals.freq[self.varlen_symbol(enc_len)] += 1;
                self.offsets.freq[self.offset_symbol(m.offset as usize)] += 1;
                i += m.length as usize;
            } else {
                self.literals.freq[window[i] as usize] += 1;
                i += 1;
            }
        }
        self.literals.freq[EOD_MARKER_SYM] += 1;
    }

    /// Reinitialize both encoders and account a greedy parse of
    /// `start..start+size`, as the cost estimators expect.
    pub fn prepare_cost_evaluation(&mut self, window: &[u8], start: usize, size: usize) {
        self.reinit_encoders();
        self.accumulate_entropy(window, start, start + size, false);
    }

    /// Guarantee at least two declared distance symbols.  Some historical
    /// inflaters reject dynamic headers with fewer (zlib before 1.2.1.1), so
    /// phantom frequencies are synthesized for symbols 0 and 1 as needed.
    fn ensure_offset_floor(&mut self) {
        let mut used = 0;
        for i in 0..NOFFSET_SYMS - 2 {
            if used >= 2 {
                break;
            }
            if self.offsets.freq[i] != 0 {
                used += 1;
            }
        }
        if used == 0 {
            self.offsets.freq[0] = 1;
            self.offsets.freq[1] = 1;
        } else if used == 1 {
            if self.offsets.freq[0] != 0 {
                self.offsets.freq[1] = 1;
            } else {
                self.offsets.freq[0] = 1;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Post-optimization
    // ─────────────────────────────────────────────────────────────────────────

    /// With final code lengths known, demote any chosen match whose covered
    /// bytes would be strictly cheaper as literals.  A match is kept when
    /// any covered byte has no codeword at all.
    fn post_optimize(&mut self, window: &[u8], start: usize, end: usize) {
        let mut i = start;
        while i < end {
            let m = self.best_match[i];
            if (m.length as usize) < MIN_MATCH_SIZE {
                i += 1;
                continue;
            }

            let match_start = i;
            let len = m.length as usize;
            let offset = m.offset as usize;
            i += len;
            if !(MIN_OFFSET..=MAX_OFFSET).contains(&offset) {
                continue;
            }

            let match_cost = self.varlen_cost(len - MIN_MATCH_SIZE) + self.offset_cost(offset);
            let mut literals_cost = 0u32;
            let mut unencodable = false;
            for j in 0..len {
                if literals_cost >= match_cost {
                    break;
                }
                let c = self.literal_cost(window[match_start + j]);
                if c == 0 {
                    unencodable = true;
                    break;
                }
                literals_cost += c;
            }

            if !unencodable && literals_cost < match_cost {
                for j in 0..len {
                    self.best_match[match_start + j] = Match::default();
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Block compression entry point
    // ─────────────────────────────────────────────────────────────────────────

    /// Parse and emit one sub-block.  The caller has already written BFINAL
    /// and BTYPE; for the dynamic path this writes the code tables first,
    /// then the token data in both paths.
    pub fn compress_block(
        &mut self,
        bw: &mut BitWriter,
        out: &mut [u8],
        window: &[u8],
        start: usize,
        size: usize,
        dynamic: bool,
    ) -> Result<(), CompressError> {
        let end = start + size;
        self.reinit_encoders();

        if !dynamic {
            self.literals.code_length = static_literal_lengths();
            self.offsets.code_length[..NOFFSET_SYMS].fill(5);
            self.literals.build_static_codewords();
            self.offsets.build_static_codewords();

            self.optimize_matches(window, start, end);
            return self.write_block_data(bw, out, window, start, end);
        }

        // Seed the codes from a greedy parse.
        self.accumulate_entropy(window, start, end, false);
        self.literals.build_dynamic_codewords();
        self.offsets.build_dynamic_codewords();

        for pass in 0..=CONVERGENCE_PASSES {
            // Unused codewords get a fallback length in case this parse
            // decides to start using them.
            for len in self.literals.code_length[..NLITERAL_SYMS].iter_mut() {
                if *len == 0 {
                    *len = 9;
                }
            }
            for len in self.offsets.code_length[..NOFFSET_SYMS].iter_mut() {
                if *len == 0 {
                    *len = 6;
                }
            }

            self.optimize_matches(window, start, end);

            self.literals.reset_frequencies();
            self.offsets.reset_frequencies();
            self.accumulate_entropy(window, start, end, true);

            if pass == CONVERGENCE_PASSES {
                self.ensure_offset_floor();
            }

            self.literals.build_dynamic_codewords();
            self.offsets.build_dynamic_codewords();
        }

        self.post_optimize(window, start, end);

        // Try trading a little data cost for a much cheaper table: smooth
        // the frequencies so the code lengths RLE better, and keep the
        // result only if the estimated total shrinks.
        let current_cost = evaluate_dynamic_cost(&self.literals, &self.offsets);
        let mut opt_literals = self.literals.clone();
        let mut opt_offsets = self.offsets.clone();
        optimize_for_rle(&mut opt_literals.freq[..NLITERAL_SYMS]);
        optimize_for_rle(&mut opt_offsets.freq[..NOFFSET_SYMS]);
        opt_literals.build_dynamic_codewords();
        opt_offsets.build_dynamic_codewords();
        if evaluate_dynamic_cost(&opt_literals, &opt_offsets) < current_cost {
            self.literals = opt_literals;
            self.offsets = opt_offsets;
        }

        // Joint code-length vector and the cheapest RLE enable-mask for it.
        let n_lit = self.literals.defined_symbol_count(NMATCHLEN_SYM_START);
        let n_off = self.offsets.defined_symbol_count(1);
        let mut joint = Vec::with_capacity(n_lit + n_off);
        joint.extend_from_slice(&self.literals.code_length[..n_lit]);
        joint.extend_from_slice(&self.offsets.code_length[..n_off]);

        let mut tables = HuffmanEncoder::for_alphabet(NCODELEN_SYMS, 7);
        let mut best_mask = 0u32;
        let mut best_cost = u64::MAX;
        let mut mask = 0u32;
        while mask <= MAX_CODES_MASK {
            tables.count_length_vector(&joint, mask);
            tables.build_dynamic_codewords();
            let cost = tables.length_vector_cost(&joint, mask);
            if cost <= best_cost {
                best_mask = mask;
                best_cost = cost;
            }
            tables.reset_frequencies();
            // Masks 8.. differ only in the bits suppressing symbol-16
            // micro-patterns; odd values there duplicate even ones.
            mask += if mask >= 7 { 2 } else { 1 };
        }

        tables.count_length_vector(&joint, best_mask);
        tables.build_dynamic_codewords();

        let n_clen = tables.raw_table_size();
        if n_lit > NVALID_LITERAL_SYMS || n_off > NVALID_OFFSET_SYMS || n_clen > NCODELEN_SYMS {
            return Err(CompressError::Internal);
        }
        bw.put_bits(out, (n_lit - NMATCHLEN_SYM_START) as u32, 5)?;
        bw.put_bits(out, (n_off - 1) as u32, 5)?;
        bw.put_bits(out, (n_clen - 4) as u32, 4)?;
        tables.write_raw_table(NCODELEN_BITS, n_clen, bw, out)?;
        tables.write_length_vector(&joint, best_mask, bw, out)?;

        self.write_block_data(bw, out, window, start, end)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Whole-block cost estimation
// ─────────────────────────────────────────────────────────────────────────────

/// Bits needed to encode the accumulated frequencies with the fixed codes of
/// RFC 1951 §3.2.6, including the 3 header bits.
pub(crate) fn evaluate_static_cost(literals: &HuffmanEncoder, offsets: &HuffmanEncoder) -> u64 {
    let static_lengths = static_literal_lengths();
    let mut cost = 0u64;

    for i in 0..NMATCHLEN_SYM_START {
        cost += literals.freq[i] as u64 * static_lengths[i] as u64;
    }
    for i in NMATCHLEN_SYM_START..NMATCHLEN_SYM_START + NMATCHLEN_SYMS {
        cost += literals.freq[i] as u64
            * (static_lengths[i] as u64 + LENGTH_SYM_EXTRA[i - NMATCHLEN_SYM_START] as u64);
    }
    for i in 0..NOFFSET_SYMS {
        let extra = if i < NVALID_OFFSET_SYMS {
            OFFSET_SYM_EXTRA[i] as u64
        } else {
            0
        };
        cost += offsets.freq[i] as u64 * (5 + extra);
    }

    cost + 3
}

/// Bits needed to encode the accumulated frequencies with the encoders'
/// current code lengths, including the dynamic table transmission and the 3
/// header bits.  The table portion is an estimate: the code-length code is
/// sized without length limiting and with the default RLE mask.
pub(crate) fn evaluate_dynamic_cost(literals: &HuffmanEncoder, offsets: &HuffmanEncoder) -> u64 {
    let mut cost = 0u64;

    for i in 0..NMATCHLEN_SYM_START {
        cost += literals.freq[i] as u64 * literals.code_length[i] as u64;
    }
    for i in NMATCHLEN_SYM_START..NMATCHLEN_SYM_START + NMATCHLEN_SYMS {
        cost += literals.freq[i] as u64
            * (literals.code_length[i] as u64 + LENGTH_SYM_EXTRA[i - NMATCHLEN_SYM_START] as u64);
    }
    for i in 0..NOFFSET_SYMS {
        let extra = if i < NVALID_OFFSET_SYMS {
            OFFSET_SYM_EXTRA[i] as u64
        } else {
            0
        };
        cost += offsets.freq[i] as u64 * (offsets.code_length[i] as u64 + extra);
    }

    let n_lit = literals.defined_symbol_count(NMATCHLEN_SYM_START);
    let n_off = offsets.defined_symbol_count(1);
    let mut joint = Vec::with_capacity(n_lit + n_off);
    joint.extend_from_slice(&literals.code_length[..n_lit]);
    joint.extend_from_slice(&offsets.code_length[..n_off]);

    let mut tables = HuffmanEncoder::for_alphabet(NCODELEN_SYMS, 7);
    tables.count_length_vector(&joint, 7);
    tables.estimate_code_lengths();

    cost += 5 + 5 + 4;
    cost += NCODELEN_BITS as u64 * tables.raw_table_size() as u64;
    cost += tables.length_vector_cost(&joint, MAX_CODES_MASK);

    cost + 3
}
