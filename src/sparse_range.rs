use crate::range::Range;
use alloc::collections::BTreeMap;
use core::fmt;
use smallvec::SmallVec;

/// An ordered collection of non-empty, pairwise disjoint, pairwise
/// non-adjacent [`Range`]s.
///
/// The parts are keyed by their inclusive upper bound; because they neither
/// overlap nor abut, that order equals the order by base, and a single
/// `BTreeMap::range` probe finds the unique part that could overlap a query.
/// [`combine`](Self::combine) and [`remove`](Self::remove) re-establish the
/// invariants on every mutation, merging parts that would touch and
/// splitting parts that are cut.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SparseRange {
    parts: BTreeMap<u64, Range>,
}

impl SparseRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions `range` into the set, absorbing every part it overlaps or
    /// abuts.
    pub fn combine(&mut self, range: Range) {
        if range.is_empty() {
            return;
        }
        let mut merged = range;
        let mut absorbed: SmallVec<[u64; 2]> = SmallVec::new();
        // The leftmost mergeable part is the first whose last reaches
        // `range.base - 1` (abutting counts); walk right until parts stop
        // touching the growing replacement.
        for (&key, part) in self.parts.range(range.base().saturating_sub(1)..) {
            if !merged.try_combine(*part) {
                break;
            }
            absorbed.push(key);
        }
        for key in absorbed {
            self.parts.remove(&key);
        }
        self.parts.insert(merged.last(), merged);
    }

    /// Unions every part of `other` into the set.
    pub fn combine_sparse(&mut self, other: &SparseRange) {
        for part in other.iter() {
            self.combine(*part);
        }
    }

    /// Subtracts `range`, trimming or splitting the parts it overlaps. At
    /// most two fragments survive per contiguous overlapped run.
    pub fn remove(&mut self, range: Range) {
        if range.is_empty() || self.parts.is_empty() {
            return;
        }
        let mut low = Range::EMPTY;
        let mut high = Range::EMPTY;
        let mut doomed: SmallVec<[u64; 2]> = SmallVec::new();
        for (&key, part) in self.parts.range(range.base()..) {
            if !part.overlaps(range) {
                break;
            }
            if part.base() < range.base() {
                low = Range::from_base_last(part.base(), range.base() - 1);
            }
            if range.last() < part.last() {
                high = Range::from_base_last(range.last() + 1, part.last());
            }
            doomed.push(key);
        }
        for key in doomed {
            self.parts.remove(&key);
        }
        if !low.is_empty() {
            self.parts.insert(low.last(), low);
        }
        if !high.is_empty() {
            self.parts.insert(high.last(), high);
        }
    }

    /// Subtracts every part of `other` from the set.
    pub fn remove_sparse(&mut self, other: &SparseRange) {
        for part in other.iter() {
            self.remove(*part);
        }
    }

    /// Whether any part shares an address with `range`.
    pub fn overlaps(&self, range: Range) -> bool {
        if range.is_empty() {
            return false;
        }
        // The only candidate is the first part whose last reaches range.base.
        match self.parts.range(range.base()..).next() {
            Some((_, part)) => part.overlaps(range),
            None => false,
        }
    }

    /// Whether a single part covers all of `range`.
    pub fn includes(&self, range: Range) -> bool {
        if range.is_empty() {
            return true;
        }
        // If range is included, the enclosing part is the first with
        // last >= range.last.
        match self.parts.range(range.last()..).next() {
            Some((_, part)) => part.includes(range),
            None => false,
        }
    }

    /// Whether every part of `other` is covered.
    pub fn includes_sparse(&self, other: &SparseRange) -> bool {
        other.iter().all(|part| self.includes(*part))
    }

    /// The exact complement over the full 64-bit space.
    pub fn complement(&self) -> SparseRange {
        let mut out = SparseRange::new();
        let mut cursor = 0_u64;
        for part in self.iter() {
            if part.base() > cursor {
                let gap = Range::from_base_last(cursor, part.base() - 1);
                out.parts.insert(gap.last(), gap);
            }
            match part.last().checked_add(1) {
                Some(next) => cursor = next,
                // The part ends at u64::MAX; nothing above it.
                None => return out,
            }
        }
        let tail = Range::from_base_last(cursor, u64::MAX);
        out.parts.insert(tail.last(), tail);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> + '_ {
        self.parts.values()
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}

impl From<Range> for SparseRange {
    fn from(range: Range) -> Self {
        let mut out = Self::new();
        out.combine(range);
        out
    }
}

impl fmt::Display for SparseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, part) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for SparseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sparse(parts: &[(u64, u64)]) -> SparseRange {
        let mut out = SparseRange::new();
        for &(base, last) in parts {
            out.combine(Range::from_base_last(base, last));
        }
        out
    }

    /// Every part non-empty, pairwise disjoint, pairwise non-adjacent,
    /// sorted by upper bound.
    fn assert_invariants(s: &SparseRange) {
        let parts: Vec<Range> = s.iter().copied().collect();
        for part in &parts {
            assert!(!part.is_empty(), "empty part in {s}");
        }
        for pair in parts.windows(2) {
            assert!(pair[0].last() < pair[1].base(), "unsorted or overlapping: {s}");
            assert!(!pair[1].follows(pair[0]), "unmerged adjacency: {s}");
        }
    }

    #[test]
    fn combine_merges_adjacent_and_overlapping() {
        let mut s = sparse(&[(0x00, 0x0f), (0x20, 0x2f)]);
        assert_eq!(s.len(), 2);
        // Abuts the first part, overlaps the second: everything fuses.
        s.combine(Range::from_base_last(0x10, 0x25));
        assert_invariants(&s);
        assert_eq!(s.iter().copied().collect::<Vec<_>>(), vec![Range::from_base_last(0x00, 0x2f)]);
    }

    #[test]
    fn combine_keeps_gaps() {
        let s = sparse(&[(0x00, 0x0f), (0x11, 0x1f)]);
        assert_eq!(s.len(), 2, "one-address gap must not merge: {s}");
        assert_invariants(&s);
    }

    #[test]
    fn remove_splits() {
        let mut s = sparse(&[(0x00, 0x2f)]);
        s.remove(Range::from_base_last(0x10, 0x1f));
        assert_invariants(&s);
        assert_eq!(
            s.iter().copied().collect::<Vec<_>>(),
            vec![Range::from_base_last(0x00, 0x0f), Range::from_base_last(0x20, 0x2f)]
        );
    }

    #[test]
    fn remove_spanning_run() {
        let mut s = sparse(&[(0x00, 0x0f), (0x20, 0x2f), (0x40, 0x4f)]);
        s.remove(Range::from_base_last(0x08, 0x47));
        assert_invariants(&s);
        assert_eq!(
            s.iter().copied().collect::<Vec<_>>(),
            vec![Range::from_base_last(0x00, 0x07), Range::from_base_last(0x48, 0x4f)]
        );
    }

    #[test]
    fn remove_misses() {
        let mut s = sparse(&[(0x10, 0x1f)]);
        s.remove(Range::from_base_last(0x30, 0x3f));
        assert_eq!(s, sparse(&[(0x10, 0x1f)]));
    }

    #[test]
    fn queries() {
        let s = sparse(&[(0x10, 0x1f), (0x40, 0x7f)]);
        assert!(s.overlaps(Range::from_base_last(0x1f, 0x20)));
        assert!(!s.overlaps(Range::from_base_last(0x20, 0x3f)));
        assert!(s.includes(Range::from_base_last(0x41, 0x60)));
        assert!(!s.includes(Range::from_base_last(0x1f, 0x40)));
        assert!(s.includes(Range::EMPTY));
        assert!(!s.overlaps(Range::EMPTY));
        assert!(s.includes_sparse(&sparse(&[(0x10, 0x12), (0x50, 0x51)])));
        assert!(!s.includes_sparse(&sparse(&[(0x10, 0x12), (0x80, 0x81)])));
    }

    #[test]
    fn complement_round_trip() {
        let s = sparse(&[(0x10, 0x1f), (0x40, u64::MAX)]);
        let c = s.complement();
        assert_invariants(&c);
        assert_eq!(c, sparse(&[(0, 0x0f), (0x20, 0x3f)]));
        assert_eq!(c.complement(), s);
        assert_eq!(SparseRange::new().complement(), SparseRange::from(Range::full()));
        assert!(SparseRange::from(Range::full()).complement().is_empty());
    }

    /// One combine/remove step over the 64-address alphabet `[0, 63]`.
    #[derive(Debug, Clone, Copy)]
    enum Op {
        Combine(u8, u8),
        Remove(u8, u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        (any::<bool>(), 0_u8..64, 0_u8..64).prop_map(|(combine, a, b)| {
            let (base, last) = if a <= b { (a, b) } else { (b, a) };
            if combine {
                Op::Combine(base, last)
            } else {
                Op::Remove(base, last)
            }
        })
    }

    proptest! {
        // Random sequences against a naive bitmask oracle: membership of
        // every address in the alphabet must agree at every step.
        #[test]
        fn matches_bitmap_reference(ops in proptest::collection::vec(op_strategy(), 1..64)) {
            let mut s = SparseRange::new();
            let mut bits = 0_u64;
            for op in ops {
                match op {
                    Op::Combine(base, last) => {
                        s.combine(Range::from_base_last(u64::from(base), u64::from(last)));
                        for i in base..=last {
                            bits |= 1 << i;
                        }
                    }
                    Op::Remove(base, last) => {
                        s.remove(Range::from_base_last(u64::from(base), u64::from(last)));
                        for i in base..=last {
                            bits &= !(1 << i);
                        }
                    }
                }
                assert_invariants(&s);
                for i in 0_u64..64 {
                    let expected = bits & (1 << i) != 0;
                    prop_assert_eq!(s.includes(Range::from_base_last(i, i)), expected, "address {}", i);
                }
            }
        }

        #[test]
        fn combine_then_includes(base in any::<u64>(), last in any::<u64>(), seed in proptest::collection::vec((any::<u64>(), any::<u64>()), 0..8)) {
            prop_assume!(base <= last);
            let mut s = SparseRange::new();
            for (a, b) in seed {
                s.combine(Range::from_base_last(a.min(b), a.max(b)));
            }
            let r = Range::from_base_last(base, last);
            s.combine(r);
            assert_invariants(&s);
            prop_assert!(s.includes(r));
        }

        #[test]
        fn combine_remove_then_disjoint(base in any::<u64>(), last in any::<u64>(), seed in proptest::collection::vec((any::<u64>(), any::<u64>()), 0..8)) {
            prop_assume!(base <= last);
            let mut s = SparseRange::new();
            for (a, b) in seed {
                s.combine(Range::from_base_last(a.min(b), a.max(b)));
            }
            let r = Range::from_base_last(base, last);
            s.combine(r);
            s.remove(r);
            assert_invariants(&s);
            prop_assert!(!s.overlaps(r));
        }

        // The final part set does not depend on combine order.
        #[test]
        fn combine_is_commutative(ranges in proptest::collection::vec((any::<u64>(), any::<u64>()), 0..12)) {
            let ranges: Vec<Range> = ranges
                .into_iter()
                .map(|(a, b)| Range::from_base_last(a.min(b), a.max(b)))
                .collect();
            let mut forward = SparseRange::new();
            for r in &ranges {
                forward.combine(*r);
            }
            let mut reverse = SparseRange::new();
            for r in ranges.iter().rev() {
                reverse.combine(*r);
            }
            assert_invariants(&forward);
            prop_assert_eq!(forward, reverse);
        }
    }
}
