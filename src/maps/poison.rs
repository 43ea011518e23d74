use crate::capability::{CapPerms, Capability};
use crate::maps::CapMap;
use crate::range::Range;
use crate::sparse_range::SparseRange;
use alloc::boxed::Box;
use alloc::string::String;

/// A [`PermissionMap`](crate::maps::PermissionMap) that additionally watches
/// a set of poisoned addresses.
///
/// Whenever an accepted capability's bounds overlap the poison set, the
/// callback fires, exactly once per acceptance, before `try_combine`
/// returns. The callback must not re-enter the owning mapper. Like the
/// permission map, sealed-ness is not filtered.
pub struct PoisonMap<C> {
    name: String,
    address_space: String,
    required: CapPerms,
    poison: SparseRange,
    callback: Box<dyn FnMut(&C)>,
    ranges: SparseRange,
}

impl<C: Capability> PoisonMap<C> {
    pub fn new(
        name: impl Into<String>,
        address_space: impl Into<String>,
        required: CapPerms,
        poison: SparseRange,
        callback: impl FnMut(&C) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            address_space: address_space.into(),
            required,
            poison,
            callback: Box::new(callback),
            ranges: SparseRange::new(),
        }
    }

    pub fn poison(&self) -> &SparseRange {
        &self.poison
    }
}

impl<C: Capability> CapMap<C> for PoisonMap<C> {
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
        let bounds = Range::from_cap(cap);
        if self.poison.overlaps(bounds) {
            (self.callback)(cap);
        }
        self.ranges.combine(bounds);
        true
    }
}
