//! Entropy-drift block splitting.
//!
//! Sending fresh Huffman tables is worth a block boundary whenever the
//! symbol distribution shifts enough.  The splitter walks the greedy parse
//! of a range accumulating an 18-bucket feature vector (literals bucketed by
//! bit pattern, matches by short/long), and whenever the recent window
//! drifts far from the running distribution it confirms the candidate with
//! an exact estimate: dynamic-code cost of the whole range vs. the two
//! halves coded separately.  Confirmed splits recurse on both sides, depth-
//! and budget-limited.

use crate::error::CompressError;
use crate::format::{EOD_MARKER_SYM, MIN_MATCH_SIZE, NLITERAL_SYMS, NOFFSET_SYMS};
use crate::huffman::HuffmanEncoder;

use super::deflate::{evaluate_dynamic_cost, BlockCompressor};

/// Ranges smaller than this are never split further.
const MIN_SPLIT_RANGE: usize = 8192;
/// Maximum recursion depth.
const MAX_SPLIT_DEPTH: usize = 6;
/// A check needs at least this many new tokens since the last one.
const CHECK_MIN_TOKENS: u64 = 256;
/// A check needs at least this many bytes since the range start.
const CHECK_MIN_BYTES: usize = 512;

/// Feature bucket of a literal byte: low two bits and bits 4..=5.
#[inline]
fn literal_bucket(byte: u8) -> usize {
    (((byte >> 4) & 0xc) | (byte & 0x3)) as usize
}

/// Partition `start..start+size` of the window into sub-blocks, appending at
/// most `max_splits` offsets to `splits`; the final entry is always
/// `start + size`.  Offsets are absolute window positions, sorted ascending.
pub(crate) fn block_split(
    bc: &mut BlockCompressor,
    window: &[u8],
    start: usize,
    size: usize,
    max_splits: usize,
    splits: &mut Vec<usize>,
) -> Result<(), CompressError> {
    splits.clear();
    split_recursive(bc, window, start, size, 0, max_splits - 1, splits)?;
    splits.push(start + size);
    Ok(())
}

fn split_recursive(
    bc: &mut BlockCompressor,
    window: &[u8],
    start: usize,
    size: usize,
    depth: usize,
    max_splits: usize,
    splits: &mut Vec<usize>,
) -> Result<(), CompressError> {
    if splits.len() >= max_splits || depth >= MAX_SPLIT_DEPTH || size < MIN_SPLIT_RANGE {
        return Ok(());
    }

    // Whole-range estimate from a greedy parse.
    bc.prepare_cost_evaluation(window, start, size);
    bc.literals.estimate_code_lengths();
    bc.offsets.estimate_code_lengths();
    let total_cost = evaluate_dynamic_cost(&bc.literals, &bc.offsets);
    let total_literals = bc.literals.clone();
    let total_offsets = bc.offsets.clone();

    // Left-side frequencies accumulate segment by segment between checks;
    // the right side is derived by subtraction from the totals.
    let mut left_literals = HuffmanEncoder::for_alphabet(NLITERAL_SYMS, 15);
    let mut left_offsets = HuffmanEncoder::for_alphabet(NOFFSET_SYMS, 15);
    let mut right_literals = HuffmanEncoder::for_alphabet(NLITERAL_SYMS, 15);
    let mut right_offsets = HuffmanEncoder::for_alphabet(NOFFSET_SYMS, 15);

    let mut stat = [0u64; 18];
    let mut new_stat = [0u64; 18];
    let mut num_stats = 0u64;
    let mut num_new_stats = 0u64;

    let mut last_left_end = start;
    let mut last_good_split: Option<usize> = None;
    let mut best_split: Option<(usize, u64)> = None;

    let end = start + size;
    let mut i = start;
    while i < end {
        // Greedy token step, mirroring the entropy accounting walk so check
        // points always land on token boundaries.
        let m = bc.finder.first_match(i);
        if m.length as usize >= MIN_MATCH_SIZE {
            if m.length >= 9 {
                new_stat[17] += 1;
            } else {
                new_stat[16] += 1;
            }
            num_new_stats += 1;
            i += m.length as usize;
        } else {
            new_stat[literal_bucket(window[i])] += 1;
            num_new_stats += 1;
            i += 1;
        }

        if num_new_stats < CHECK_MIN_TOKENS || (i - start) < CHECK_MIN_BYTES {
            continue;
        }

        if num_stats > 0 {
            // Cross-multiplied L1 distance between the running distribution
            // and the recent window, so no division is needed per bucket.
            let mut total_delta = 0u64;
            for j in 0..18 {
                total_delta += (stat[j] * num_new_stats).abs_diff(new_stat[j] * num_stats);
            }

            if total_delta / num_new_stats >= num_stats * 45 / 100 {
                if let Some(candidate) = last_good_split {
                    // Exact confirmation: extend the left accumulation to the
                    // candidate boundary and price both halves.
                    bc.prepare_cost_evaluation(window, last_left_end, candidate - last_left_end);
                    for j in 0..NLITERAL_SYMS {
                        left_literals.freq[j] += bc.literals.freq[j];
                    }
                    for j in 0..NOFFSET_SYMS {
                        left_offsets.freq[j] += bc.offsets.freq[j];
                    }
                    // One end-of-block marker per half, not per segment.
                    left_literals.freq[EOD_MARKER_SYM] = 1;

                    for j in 0..NLITERAL_SYMS {
                        right_literals.freq[j] =
                            total_literals.freq[j] - left_literals.freq[j];
                    }
                    for j in 0..NOFFSET_SYMS {
                        right_offsets.freq[j] = total_offsets.freq[j] - left_offsets.freq[j];
                    }
                    right_literals.freq[EOD_MARKER_SYM] = 1;

                    left_literals.estimate_code_lengths();
                    left_offsets.estimate_code_lengths();
                    right_literals.estimate_code_lengths();
                    right_offsets.estimate_code_lengths();
                    let left_cost = evaluate_dynamic_cost(&left_literals, &left_offsets);
                    let right_cost = evaluate_dynamic_cost(&right_literals, &right_offsets);

                    if total_cost >= left_cost + right_cost {
                        let delta = total_cost - (left_cost + right_cost);
                        if best_split.map_or(true, |(_, best)| best < delta) {
                            best_split = Some((candidate, delta));
                        }
                    }

                    last_left_end = candidate;
                }
            }
        }

        for j in 0..18 {
            num_stats += new_stat[j];
            stat[j] += new_stat[j];
            new_stat[j] = 0;
        }
        num_new_stats = 0;
        // The split lands at the boundary recorded before drift is detected,
        // attributing the drifted tokens to the right-hand side.
        last_good_split = Some(i);
    }

    if let Some((at, _)) = best_split {
        split_recursive(bc, window, start, at - start, depth + 1, max_splits, splits)?;
        if splits.len() < max_splits {
            splits.push(at);
        }
        split_recursive(bc, window, at, end - at, depth + 1, max_splits, splits)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MAX_SPLITS;

    fn split_window(window: &[u8]) -> Vec<usize> {
        let mut bc = BlockCompressor::new(window.len());
        bc.finder.build(window);
        bc.finder.find_all_matches(0, window.len());
        let mut splits = Vec::new();
        block_split(&mut bc, window, 0, window.len(), MAX_SPLITS, &mut splits).unwrap();
        splits
    }

    #[test]
    fn final_entry_is_the_range_end() {
        let window = vec![b'x'; 4096];
        let splits = split_window(&window);
        assert_eq!(*splits.last().unwrap(), window.len());
    }

    #[test]
    fn small_ranges_are_never_split() {
        let window: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let splits = split_window(&window);
        assert_eq!(splits, vec![window.len()]);
    }

    #[test]
    fn splits_are_sorted_and_bounded() {
        // Two very different halves: ASCII text then binary ramps.
        let mut window = b"the quick brown fox jumps over the lazy dog. ".repeat(800);
        window.extend((0..36_000u32).map(|i| (i * 31 >> 3) as u8));
        let splits = split_window(&window);
        assert!(splits.len() <= MAX_SPLITS);
        assert_eq!(*splits.last().unwrap(), window.len());
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1], "splits not ascending: {splits:?}");
        }
        for &s in &splits[..splits.len() - 1] {
            assert!(s > 0 && s < window.len());
        }
    }

    #[test]
    fn homogeneous_data_stays_whole() {
        let window = b"abcdefgh".repeat(8192);
        let splits = split_window(&window);
        // One distribution throughout: a split would only add table cost.
        assert_eq!(splits, vec![window.len()]);
    }
}
