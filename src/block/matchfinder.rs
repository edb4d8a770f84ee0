//! LZ match finder over a suffix array.
//!
//! One structure is (re)built per block group:
//!
//! 1. the suffix array of the whole window (history + block bytes);
//! 2. LCP values via the permuted-LCP technique, computed in text order with
//!    an amortized O(n) running counter;
//! 3. an LCP-interval tree, packed in place over the suffix-array words by a
//!    single left-to-right pass with an explicit stack of open intervals.
//!
//! Queries are destructive and must visit positions in strictly ascending
//! text order: each query relinks the intervals on its root path to the
//! current position, so a later query finds, at each tree depth, the closest
//! earlier position sharing that prefix length.  The history region is
//! primed by querying every position and discarding the results
//! ([`MatchFinder::skip_matches`]).
//!
//! Packed word layout: bits 0..=21 position or interval index, bits 22..=30
//! LCP (clamped to the 258-byte match cap), bit 31 the visited flag.

use crate::format::{
    LAST_LITERALS, LAST_MATCH_OFFSET, MATCHES_PER_OFFSET_SHIFT, MAX_MATCH_SIZE, MAX_OFFSET,
    MIN_MATCH_SIZE, NMATCHES_PER_OFFSET,
};

use super::suffix_array;

// ─────────────────────────────────────────────────────────────────────────────
// Packed suffix-array word fields
// ─────────────────────────────────────────────────────────────────────────────

/// Bits reserved for the LCP field.
pub const LCP_BITS: u32 = 9;
/// Largest storable LCP value.
pub const LCP_MAX: u32 = (1 << LCP_BITS) - 1;
/// Bit position of the LCP field.
pub const LCP_SHIFT: u32 = 31 - LCP_BITS;
/// Mask of the LCP field in place.
pub const LCP_MASK: u32 = LCP_MAX << LCP_SHIFT;
/// Mask of the position / interval-index field; limits the window to 4 MiB.
pub const POS_MASK: u32 = (1 << LCP_SHIFT) - 1;
/// Marks an interval already relinked to a text position during queries.
pub const VISITED_FLAG: u32 = 0x8000_0000;
/// Strips [`VISITED_FLAG`].
pub const EXCL_VISITED_MASK: u32 = 0x7fff_ffff;

/// One match candidate.  `length == 0` marks an empty slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Match {
    pub length: u16,
    pub offset: u16,
}

// ─────────────────────────────────────────────────────────────────────────────
// MatchFinder
// ─────────────────────────────────────────────────────────────────────────────

/// Suffix-array match finder state, allocated once and rebuilt per block
/// group.
pub struct MatchFinder {
    /// Suffix array during construction, then interval parent links.
    intervals: Vec<u32>,
    /// Per-position link to the deepest containing interval; PLCP scratch
    /// during construction.
    pos_data: Vec<u32>,
    /// Stack of open intervals, indexed by depth (one slot per LCP value).
    open_intervals: Vec<u32>,
    /// Candidate matches, [`NMATCHES_PER_OFFSET`] slots per window position.
    matches: Vec<Match>,
}

impl MatchFinder {
    /// Allocate for windows up to `max_window_size` bytes.
    pub fn new(max_window_size: usize) -> Self {
        Self {
            intervals: Vec::with_capacity(max_window_size),
            pos_data: vec![0; max_window_size],
            open_intervals: vec![0; LCP_MAX as usize + 1],
            matches: vec![Match::default(); max_window_size << MATCHES_PER_OFFSET_SHIFT],
        }
    }

    /// First (longest) candidate recorded for window position `pos`.
    #[inline]
    pub fn first_match(&self, pos: usize) -> Match {
        self.matches[pos << MATCHES_PER_OFFSET_SHIFT]
    }

    /// All candidate slots recorded for window position `pos`.
    #[inline]
    pub fn matches_at(&self, pos: usize) -> &[Match] {
        let base = pos << MATCHES_PER_OFFSET_SHIFT;
        &self.matches[base..base + NMATCHES_PER_OFFSET]
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the suffix array and the LCP-interval tree for `window`.
    pub fn build(&mut self, window: &[u8]) {
        let n = window.len();
        suffix_array::build(window, &mut self.intervals);
        self.pos_data.resize(n.max(self.pos_data.len()), 0);
        if n == 0 {
            return;
        }

        // Permuted LCP: phi[i] is the suffix preceding i in suffix order;
        // overwrite phi[i] with PLCP[i] in text order, reusing a running
        // counter that drops by at most one per step.
        let phi = &mut self.pos_data;
        phi[self.intervals[0] as usize] = u32::MAX;
        for r in 1..n {
            phi[self.intervals[r] as usize] = self.intervals[r - 1];
        }
        let mut cur = 0usize;
        for i in 0..n {
            let p = phi[i];
            if p == u32::MAX {
                phi[i] = 0;
                continue;
            }
            let p = p as usize;
            let max_len = n - i.max(p);
            while cur < max_len && window[i + cur] == window[p + cur] {
                cur += 1;
            }
            phi[i] = cur as u32;
            cur = cur.saturating_sub(1);
        }

        // Fold the LCP values into the suffix-array words, pruning entries
        // too short to ever produce a match.
        for r in 1..n.saturating_sub(1) {
            let pos = self.intervals[r] & POS_MASK;
            let mut lcp = self.pos_data[pos as usize] as usize;
            if lcp < MIN_MATCH_SIZE {
                lcp = 0;
            }
            if lcp > MAX_MATCH_SIZE {
                lcp = MAX_MATCH_SIZE;
            }
            self.intervals[r] = pos | ((lcp as u32) << LCP_SHIFT);
        }
        self.intervals[0] &= POS_MASK;
        if n >= 2 {
            self.intervals[n - 1] &= POS_MASK;
        }

        self.build_intervals(n);
    }

    /// Single pass over the packed SA/LCP words, maintaining the stack of
    /// open intervals.  Afterwards `intervals[id]` holds the parent link of
    /// interval `id` and `pos_data[i]` the deepest interval containing text
    /// position `i`.
    fn build_intervals(&mut self, n: usize) {
        let mut next_interval_idx: u32 = 1;
        let mut top = 0usize;
        self.open_intervals[0] = 0;
        let mut prev_pos = self.intervals[0] & POS_MASK;
        self.intervals[0] = 0;

        for r in 1..n {
            let next_pos = self.intervals[r] & POS_MASK;
            let next_lcp = self.intervals[r] & LCP_MASK;
            let top_lcp = self.open_intervals[top] & LCP_MASK;

            if next_lcp == top_lcp {
                // Continuing the deepest open interval.
                self.pos_data[prev_pos as usize] = self.open_intervals[top];
            } else if next_lcp > top_lcp {
                // Opening a new interval.
                top += 1;
                self.open_intervals[top] = next_lcp | next_interval_idx;
                next_interval_idx += 1;
                self.pos_data[prev_pos as usize] = self.open_intervals[top];
            } else {
                // Closing the deepest open interval(s).
                self.pos_data[prev_pos as usize] = self.open_intervals[top];
                loop {
                    let closed = (self.open_intervals[top] & POS_MASK) as usize;
                    top -= 1;
                    let super_lcp = self.open_intervals[top] & LCP_MASK;

                    if next_lcp == super_lcp {
                        // Continuing the superinterval.
                        self.intervals[closed] = self.open_intervals[top];
                        break;
                    } else if next_lcp > super_lcp {
                        // New intermediate interval between the closed one
                        // and its superinterval.
                        top += 1;
                        self.open_intervals[top] = next_lcp | next_interval_idx;
                        next_interval_idx += 1;
                        self.intervals[closed] = self.open_intervals[top];
                        break;
                    } else {
                        // Also closing the superinterval.
                        self.intervals[closed] = self.open_intervals[top];
                    }
                }
            }
            prev_pos = next_pos;
        }

        // Close whatever is still open.
        self.pos_data[prev_pos as usize] = self.open_intervals[top];
        while top > 0 {
            let id = (self.open_intervals[top] & POS_MASK) as usize;
            self.intervals[id] = self.open_intervals[top - 1];
            top -= 1;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Report up to `out.len()` matches at window position `pos`, longest
    /// first, and relink the position's root path.  Destructive: each
    /// position must be queried exactly once, in ascending order.
    fn find_matches_at(&mut self, pos: usize, out: &mut [Match]) -> usize {
        let mut node = self.pos_data[pos];
        self.pos_data[pos] = 0;

        // Ascend until a visited interval, the root, or a child of the root,
        // claiming unvisited intervals for this position on the way.
        let mut parent;
        loop {
            parent = self.intervals[(node & POS_MASK) as usize];
            if parent & LCP_MASK == 0 {
                break;
            }
            self.intervals[(node & POS_MASK) as usize] = pos as u32 | VISITED_FLAG;
            node = parent;
        }

        if parent == 0 {
            // Root, or an unvisited child of the root: nothing shares a
            // usable prefix with this position yet.
            if node != 0 {
                self.intervals[(node & POS_MASK) as usize] = pos as u32 | VISITED_FLAG;
            }
            return 0;
        }

        // Each ancestor yields the closest earlier position sharing that
        // ancestor's prefix length; follow pos_data links to skip portions
        // already relinked deeper.
        let mut match_pos = parent & EXCL_VISITED_MASK;
        let mut count = 0usize;
        loop {
            loop {
                parent = self.pos_data[match_pos as usize];
                if parent <= node {
                    break;
                }
                match_pos = self.intervals[(parent & POS_MASK) as usize] & EXCL_VISITED_MASK;
            }
            self.intervals[(node & POS_MASK) as usize] = pos as u32 | VISITED_FLAG;
            self.pos_data[match_pos as usize] = node;

            if count < out.len() {
                let offset = pos - match_pos as usize;
                if offset <= MAX_OFFSET {
                    out[count] = Match {
                        length: (node >> LCP_SHIFT) as u16,
                        offset: offset as u16,
                    };
                    count += 1;
                }
            }

            if parent == 0 {
                break;
            }
            node = parent;
            match_pos = self.intervals[(node & POS_MASK) as usize] & EXCL_VISITED_MASK;
        }

        count
    }

    /// Prime the structure over `start..end` (the history region) without
    /// recording matches.  The relinking side effect is what the encode
    /// region's queries depend on.
    pub fn skip_matches(&mut self, start: usize, end: usize) {
        for pos in start..end {
            self.find_matches_at(pos, &mut []);
        }
    }

    /// Fill the per-position candidate table for `start..end` (the encode
    /// region).  Lengths are clamped so every chosen match leaves the final
    /// byte of the region to a literal; positions too close to the end get
    /// no candidates at all.
    pub fn find_all_matches(&mut self, start: usize, end: usize) {
        let mut scratch = [Match::default(); NMATCHES_PER_OFFSET];
        for pos in start..end {
            let found = self.find_matches_at(pos, &mut scratch);
            let max_len = (end - LAST_LITERALS).saturating_sub(pos);
            let base = pos << MATCHES_PER_OFFSET_SHIFT;

            for m in 0..NMATCHES_PER_OFFSET {
                let slot = &mut self.matches[base + m];
                if m >= found || pos + LAST_MATCH_OFFSET > end {
                    *slot = Match::default();
                } else {
                    *slot = scratch[m];
                    if slot.length as usize > max_len {
                        slot.length = max_len as u16;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder_for(window: &[u8]) -> MatchFinder {
        let mut mf = MatchFinder::new(window.len());
        mf.build(window);
        mf.find_all_matches(0, window.len());
        mf
    }

    /// Every reported match must reproduce the bytes it claims to.
    fn assert_matches_legal(window: &[u8], mf: &MatchFinder) {
        for pos in 0..window.len() {
            for m in mf.matches_at(pos) {
                if m.length == 0 {
                    break;
                }
                let len = m.length as usize;
                let off = m.offset as usize;
                assert!(off >= 1 && off <= pos, "offset {off} at {pos}");
                if len >= MIN_MATCH_SIZE {
                    assert_eq!(
                        &window[pos..pos + len],
                        &window[pos - off..pos - off + len],
                        "bad match at {pos}: len {len} off {off}"
                    );
                }
            }
        }
    }

    #[test]
    fn finds_repeated_phrase() {
        let window = b"abcdefgh_abcdefgh_abcdefgh_tail";
        let mf = finder_for(window);
        assert_matches_legal(window, &mf);
        // Position 9 starts the second "abcdefgh_": an offset-9 match exists.
        let m = mf.first_match(9);
        assert!(m.length >= 8, "length {}", m.length);
        assert_eq!(m.offset, 9);
    }

    #[test]
    fn candidates_are_ordered_by_decreasing_length() {
        let window = b"abcd_abce_abcd_abce_abcd_xyz";
        let mf = finder_for(window);
        assert_matches_legal(window, &mf);
        for pos in 0..window.len() {
            let lens: Vec<u16> = mf
                .matches_at(pos)
                .iter()
                .take_while(|m| m.length as usize >= MIN_MATCH_SIZE)
                .map(|m| m.length)
                .collect();
            for w in lens.windows(2) {
                assert!(w[0] >= w[1], "candidates not sorted at {pos}: {lens:?}");
            }
        }
    }

    #[test]
    fn tail_positions_have_no_candidates() {
        let window = b"xyxyxyxyxyxyxyxy";
        let mf = finder_for(window);
        let n = window.len();
        for pos in (n - LAST_MATCH_OFFSET + 1)..n {
            assert_eq!(mf.first_match(pos).length, 0, "pos {pos}");
        }
    }

    #[test]
    fn history_skip_primes_later_queries() {
        // Treat the first half as history: matches found in the second half
        // may reach into it.
        let window = b"the quick brown fox.the quick brown fox.";
        let half = window.len() / 2;
        let mut mf = MatchFinder::new(window.len());
        mf.build(window);
        mf.skip_matches(0, half);
        mf.find_all_matches(half, window.len());
        assert_matches_legal(window, &mf);
        let m = mf.first_match(half);
        assert!(m.length as usize >= MIN_MATCH_SIZE);
        assert_eq!(m.offset as usize, half);
    }

    #[test]
    fn run_lengths_are_capped_at_258() {
        let window = vec![7u8; 1024];
        let mf = finder_for(&window);
        assert_matches_legal(&window, &mf);
        for pos in 0..window.len() {
            for m in mf.matches_at(pos) {
                assert!(m.length as usize <= MAX_MATCH_SIZE);
            }
        }
    }
}
