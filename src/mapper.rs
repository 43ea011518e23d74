use crate::capability::Capability;
use crate::maps::{CapMap, LoadCapMap};
use crate::range::Range;
use crate::roots::Roots;
use crate::sparse_range::SparseRange;
use crate::vmmap;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// The traversal engine.
///
/// A mapper walks the closure of capabilities reachable from the roots it is
/// given: starting at a root, it iterates the capability-aligned words
/// inside the root's bounds, loads each word through the root's authority,
/// and recurses into every tagged value it finds. Every visited capability
/// is offered to every installed [`CapMap`] on the way, whether or not the
/// traversal descends into it.
///
/// Descent is restricted to the `include` set (by default the OS-reported
/// capability-readable mappings) minus the mapper's own memory and minus
/// everything already explored; the last subtraction is also what terminates
/// the walk on cyclic capability graphs. Loading through memory outside the
/// process's mappings faults, so callers widening `include` beyond the
/// default are on their own.
///
/// The scanned memory is assumed quiescent; concurrent writers can present
/// a torn view of the graph. A mapper is not reentrant: calling
/// [`scan`](Self::scan) from a [`PoisonMap`](crate::maps::PoisonMap)
/// callback is undefined.
pub struct Mapper<C: Capability> {
    include: SparseRange,
    include_complement: SparseRange,
    exclude_self: SparseRange,
    load_cap_map: LoadCapMap,
    maps: Vec<Box<dyn CapMap<C>>>,
    roots: Vec<(String, C)>,
    max_scan_depth: u64,
    max_seen_scan_depth: u64,
}

impl<C: Capability> Mapper<C> {
    /// Creates a mapper whose include set is seeded from the OS mapping
    /// query for the current process.
    ///
    /// # Errors
    ///
    /// Fails when the OS mapping query fails.
    pub fn new() -> crate::Result<Self> {
        Ok(Self::with_include(vmmap::current()?))
    }

    /// Creates a mapper restricted to scanning `include`.
    pub fn with_include(include: SparseRange) -> Self {
        Self {
            include_complement: include.complement(),
            load_cap_map: LoadCapMap::new(C::WORD, include.clone()),
            include,
            exclude_self: SparseRange::new(),
            maps: Vec::new(),
            roots: Vec::new(),
            max_scan_depth: u64::MAX,
            max_seen_scan_depth: 0,
        }
    }

    /// Installs a classifier. Maps are fed in installation order.
    pub fn push_map(&mut self, map: impl CapMap<C> + 'static) {
        self.maps.push(Box::new(map));
    }

    /// Caps the recursion depth; `u64::MAX` (the default) is unbounded.
    pub fn set_max_scan_depth(&mut self, depth: u64) {
        self.max_scan_depth = depth;
    }

    pub fn include(&self) -> &SparseRange {
        &self.include
    }

    /// The mapper's own memory, as excluded from the most recent scan.
    pub fn exclude_self(&self) -> &SparseRange {
        &self.exclude_self
    }

    pub fn load_cap_map(&self) -> &LoadCapMap {
        &self.load_cap_map
    }

    pub fn maps(&self) -> impl Iterator<Item = &dyn CapMap<C>> + '_ {
        self.maps.iter().map(|map| map.as_ref())
    }

    /// The roots fed in so far, in order, untagged ones excluded.
    pub fn roots(&self) -> &[(String, C)] {
        &self.roots
    }

    /// The deepest recursion observed across all scans.
    pub fn max_seen_scan_depth(&self) -> u64 {
        self.max_seen_scan_depth
    }

    /// Scans the capability graph rooted at `cap`.
    ///
    /// Untagged roots are silently ignored; zero-initialized registers are
    /// common and uninteresting.
    pub fn scan(&mut self, cap: C, name: &str) {
        // Best effort: keeps the scanner from discovering its own state.
        // Heap memory owned by the maps is not covered.
        self.exclude_self = SparseRange::from(Range::from_ref(self));
        if !cap.tag() {
            tracing::debug!(root = name, "ignoring untagged root");
            return;
        }
        tracing::debug!(root = name, cap = ?cap, "scanning root");
        self.roots.push((name.to_string(), cap));
        self.scan_at(cap, 0);
    }

    /// Scans every named register slot of `roots`, in register order.
    pub fn scan_roots(&mut self, roots: &Roots<C>) {
        for (name, cap) in roots.iter() {
            self.scan(cap, name);
        }
    }

    fn scan_at(&mut self, cap: C, depth: u64) {
        self.max_seen_scan_depth = self.max_seen_scan_depth.max(depth);

        // Classification is unconditional: an out-of-include destination is
        // still worth reporting, it is only not descended into.
        for map in &mut self.maps {
            map.try_combine(&cap);
        }

        // What remains to explore under this capability: its bounds, minus
        // already-explored words, minus our own state, minus everything
        // outside the include set. Computed before the bounds are merged
        // into the load-cap map below.
        let mut region = SparseRange::from(Range::from_cap(&cap));
        region.remove_sparse(self.load_cap_map.ranges());
        region.remove_sparse(&self.exclude_self);
        region.remove_sparse(&self.include_complement);

        if !self.load_cap_map.try_combine(&cap) {
            // Not load-cap-capable: nothing can be loaded through it.
            return;
        }
        if depth >= self.max_scan_depth {
            tracing::trace!(depth, "depth limit reached");
            return;
        }

        for part in region.iter() {
            let part = part.shrunk_to_alignment(C::WORD);
            if part.is_empty() {
                continue;
            }
            tracing::trace!(depth, %part, "descending");
            let mut addr = part.base();
            loop {
                // SAFETY: `part` lies within `cap`'s bounds, inside the
                // include set (mapped, capability-readable memory), and is
                // WORD-aligned after the shrink; `cap` was accepted by the
                // load-cap map just above.
                let candidate = unsafe { cap.load_cap_at(addr) };
                if candidate.tag() {
                    self.scan_at(candidate, depth + 1);
                }
                match addr.checked_add(C::WORD) {
                    Some(next) if next <= part.last() => addr = next,
                    _ => break,
                }
            }
        }
    }
}
