use crate::capability::{CapPerms, Capability};
use crate::maps::{CapMap, VIRTUAL_MEMORY};
use crate::range::Range;
use crate::sparse_range::SparseRange;

/// Map of branch-target capabilities.
///
/// Two forms are branchable and accepted:
/// - unsealed, executable, loadable capabilities (jump targets with bounds):
///   the full bounds are recorded;
/// - sentries: only the entry point is recorded, as a unit range.
///
/// No alignment is applied, so A64/C64 low-bit semantics survive in the
/// recorded addresses. Note that overlapping-but-distinct branch bounds
/// coalesce in the underlying [`SparseRange`]; individual target identity is
/// not preserved.
#[derive(Default)]
pub struct BranchMap {
    ranges: SparseRange,
}

impl BranchMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Capability> CapMap<C> for BranchMap {
    fn name(&self) -> &str {
        "branch"
    }

    fn address_space(&self) -> &str {
        VIRTUAL_MEMORY
    }

    fn ranges(&self) -> &SparseRange {
        &self.ranges
    }

    fn try_combine(&mut self, cap: &C) -> bool {
        if !cap.tag() {
            return false;
        }
        if cap.is_sealed() {
            if !cap.is_sentry() {
                return false;
            }
            let entry = cap.base();
            self.ranges.combine(Range::from_base_last(entry, entry));
            return true;
        }
        if !cap.perms().contains(CapPerms::EXECUTE | CapPerms::LOAD) {
            return false;
        }
        self.ranges.combine(Range::from_cap(cap));
        true
    }
}
