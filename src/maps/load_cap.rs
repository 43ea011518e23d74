use crate::capability::{CapPerms, Capability};
use crate::maps::{CapMap, VIRTUAL_MEMORY};
use crate::range::Range;
use crate::sparse_range::SparseRange;

/// The mandatory map of capability-loadable memory.
///
/// Accepts capabilities that are tagged, unsealed and carry both Load and
/// LoadCap; their bounds are shrunk to capability-word alignment before
/// insertion, since only whole aligned words can yield further capabilities.
/// The mapper recurses exactly into what this map accepts, so its ranges
/// double as the already-explored set that terminates the traversal.
pub struct LoadCapMap {
    ranges: SparseRange,
    vmmap: SparseRange,
    word: u64,
}

impl LoadCapMap {
    /// # Panics
    ///
    /// Panics if `word` is not a power of two.
    pub fn new(word: u64, vmmap: SparseRange) -> Self {
        assert!(word.is_power_of_two(), "capability word {word} is not a power of two");
        Self {
            ranges: SparseRange::new(),
            vmmap,
            word,
        }
    }

    pub fn ranges(&self) -> &SparseRange {
        &self.ranges
    }

    /// The seed built from the OS mapping query (or the caller-provided
    /// include set standing in for it).
    pub fn vmmap(&self) -> &SparseRange {
        &self.vmmap
    }

    /// If the aligned capability word starting at `addr` lies entirely
    /// within one part, returns the address of the next word.
    pub fn includes_cap(&self, addr: u64) -> Option<u64> {
        let word = Range::from_base_length(addr, self.word);
        if addr % self.word == 0 && self.ranges.includes(word) {
            addr.checked_add(self.word)
        } else {
            None
        }
    }

    pub fn try_combine<C: Capability>(&mut self, cap: &C) -> bool {
        if !cap.tag() || cap.is_sealed() {
            return false;
        }
        if !cap.perms().contains(CapPerms::LOAD | CapPerms::LOAD_CAP) {
            return false;
        }
        debug_assert_eq!(self.word, C::WORD);
        let bounds = Range::from_cap(cap).shrunk_to_alignment(self.word);
        self.ranges.combine(bounds);
        true
    }
}

impl<C: Capability> CapMap<C> for LoadCapMap {
    fn name(&self) -> &str {
        "load-cap"
    }

    fn address_space(&self) -> &str {
        VIRTUAL_MEMORY
    }

    fn ranges(&self) -> &SparseRange {
        &self.ranges
    }

    fn try_combine(&mut self, cap: &C) -> bool {
        LoadCapMap::try_combine(self, cap)
    }
}
