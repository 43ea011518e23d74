//! Capability classifiers.
//!
//! A map decides, per capability, whether the capability belongs to it and
//! which sub-range of the address space it proves reachable. The
//! [`Mapper`](crate::Mapper) feeds every capability it visits to every
//! installed map; the maps accumulate [`SparseRange`]s that the report
//! serializes at the end.

mod branch;
mod load;
mod load_cap;
mod permission;
mod poison;

pub use branch::BranchMap;
pub use load::LoadMap;
pub use load_cap::LoadCapMap;
pub use permission::PermissionMap;
pub use poison::PoisonMap;

use crate::capability::Capability;
use crate::sparse_range::SparseRange;

/// Default address-space label for maps over ordinary process memory.
pub const VIRTUAL_MEMORY: &str = "virtual memory";

/// A capability classifier.
///
/// Implementations must reject (return `false`, with no side effects)
/// capabilities that are untagged, lack the permissions of interest, or are
/// sealed where the map's policy excludes sealed values; anything else is
/// ingested into the map's range collection.
pub trait CapMap<C: Capability> {
    /// User-facing map name. Not interpreted by the library.
    fn name(&self) -> &str;

    /// Label of the address space the ranges refer to. Not interpreted by
    /// the library.
    fn address_space(&self) -> &str;

    /// The classification result so far.
    fn ranges(&self) -> &SparseRange;

    /// Offers `cap` to the map; returns whether it was accepted.
    fn try_combine(&mut self, cap: &C) -> bool;
}
