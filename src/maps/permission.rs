use crate::capability::{CapPerms, Capability};
use crate::maps::CapMap;
use crate::range::Range;
use crate::sparse_range::SparseRange;
use alloc::string::String;

/// Map of memory reachable under a caller-chosen permission combination.
///
/// Accepts every tagged capability whose permissions are a superset of
/// `required`. Sealed-ness is deliberately not filtered: a sealed capability
/// still carries its permissions, and callers that want the stricter check
/// compose it themselves.
pub struct PermissionMap {
    name: String,
    address_space: String,
    required: CapPerms,
    ranges: SparseRange,
}

impl PermissionMap {
    pub fn new(
        name: impl Into<String>,
        address_space: impl Into<String>,
        required: CapPerms,
    ) -> Self {
        Self {
            name: name.into(),
            address_space: address_space.into(),
            required,
            ranges: SparseRange::new(),
        }
    }

    pub fn required(&self) -> CapPerms {
        self.required
    }
}

impl<C: Capability> CapMap<C> for PermissionMap {
    fn name(&self) -> &str {
        &self.name
    }

    fn address_space(&self) -> &str {
        &self.address_space
    }

    fn ranges(&self) -> &SparseRange {
        &self.ranges
    }

    fn try_combine(&mut self, cap: &C) -> bool {
        if !cap.tag() || !cap.perms().contains(self.required) {
            return false;
        }
        self.ranges.combine(Range::from_cap(cap));
        true
    }
}
