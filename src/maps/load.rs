use crate::capability::{CapPerms, Capability};
use crate::maps::{CapMap, VIRTUAL_MEMORY};
use crate::range::Range;
use crate::sparse_range::SparseRange;

/// Map of plain-loadable memory.
///
/// Accepts tagged, unsealed capabilities carrying Load; records their full
/// bounds. Since LoadCap-permitting capabilities also carry Load and the
/// [`LoadCapMap`](crate::maps::LoadCapMap) only ever shrinks bounds, this
/// map's ranges are a superset of the load-cap map's for any capability set.
#[derive(Default)]
pub struct LoadMap {
    ranges: SparseRange,
}

impl LoadMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Capability> CapMap<C> for LoadMap {
    fn name(&self) -> &str {
        "load"
    }

    fn address_space(&self) -> &str {
        VIRTUAL_MEMORY
    }

    fn ranges(&self) -> &SparseRange {
        &self.ranges
    }

    fn try_combine(&mut self, cap: &C) -> bool {
        if !cap.tag() || cap.is_sealed() || !cap.perms().contains(CapPerms::LOAD) {
            return false;
        }
        self.ranges.combine(Range::from_cap(cap));
        true
    }
}
