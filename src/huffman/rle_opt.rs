//! Entropy perturbation for smaller code-length tables.
//!
//! Canonical code lengths derived from raw frequencies tend to alternate
//! between adjacent values, which the 16/17/18 run-length code of
//! RFC 1951 §3.2.7 compresses poorly.  Nudging spans of similar small
//! frequencies toward a common value makes the resulting code lengths run in
//! long identical stretches at a tiny data-cost penalty; the caller rebuilds
//! the code from the perturbed frequencies and keeps whichever total
//! (data + table) is smaller.

/// Smooth `counts` in place so the derived code lengths RLE-compress better.
///
/// Runs that already encode well (≥5 zeros or ≥7 equal nonzero counts) are
/// left untouched; other spans of near-equal counts are replaced by their
/// rounded average.  A span is never written to zero unless it was entirely
/// zero, so no used symbol loses its codeword.
pub fn optimize_for_rle(counts: &mut [u32]) {
    // Trailing zeros are already optimal; leave them out of the working set.
    let mut length = counts.len();
    while length > 0 && counts[length - 1] == 0 {
        length -= 1;
    }
    if length == 0 {
        return;
    }
    let counts = &mut counts[..length];

    // Mark counts that are already part of a good run.
    let mut good_for_rle = vec![false; length];
    let mut symbol = counts[0];
    let mut stride = 0usize;
    for i in 0..=length {
        if i == length || counts[i] != symbol {
            if (symbol == 0 && stride >= 5) || (symbol != 0 && stride >= 7) {
                for k in 0..stride {
                    good_for_rle[i - k - 1] = true;
                }
            }
            stride = 1;
            if i != length {
                symbol = counts[i];
            }
        } else {
            stride += 1;
        }
    }

    // Replace the remaining spans of near-equal counts by their average.
    let mut stride = 0usize;
    let mut limit = counts[0] as u64;
    let mut sum = 0u64;
    for i in 0..=length {
        if i == length || good_for_rle[i] || (counts[i] as u64).abs_diff(limit) >= 4 {
            if stride >= 4 || (stride >= 3 && sum == 0) {
                let mut count = ((sum + stride as u64 / 2) / stride as u64).max(1);
                if sum == 0 {
                    count = 0;
                }
                for k in 0..stride {
                    counts[i - k - 1] = count as u32;
                }
            }
            stride = 0;
            sum = 0;
            limit = if i + 3 < length {
                (counts[i] as u64
                    + counts[i + 1] as u64
                    + counts[i + 2] as u64
                    + counts[i + 3] as u64
                    + 2)
                    / 4
            } else if i < length {
                counts[i] as u64
            } else {
                0
            };
        }
        stride += 1;
        if i != length {
            sum += counts[i] as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_is_untouched() {
        let mut counts = [0u32; 19];
        optimize_for_rle(&mut counts);
        assert_eq!(counts, [0u32; 19]);
    }

    #[test]
    fn near_equal_span_is_flattened() {
        let mut counts = [10u32, 11, 9, 10, 11, 10, 9, 10, 0, 0, 0, 0, 0, 0];
        optimize_for_rle(&mut counts);
        // The noisy span collapses to one value; the zero tail survives.
        let first = counts[0];
        assert!(counts[..8].iter().all(|&c| c == first));
        assert!(counts[8..].iter().all(|&c| c == 0));
        assert!(first > 0);
    }

    #[test]
    fn used_symbols_keep_nonzero_counts() {
        let mut counts = [3u32, 1, 2, 1, 3, 2, 1, 2, 3, 1];
        let used: Vec<bool> = counts.iter().map(|&c| c > 0).collect();
        optimize_for_rle(&mut counts);
        for (i, &was_used) in used.iter().enumerate() {
            if was_used {
                assert!(counts[i] > 0, "symbol {i} lost its count");
            }
        }
    }

    #[test]
    fn existing_long_runs_survive() {
        let mut counts = [5u32; 12];
        let before = counts;
        optimize_for_rle(&mut counts);
        assert_eq!(counts, before);
    }
}
