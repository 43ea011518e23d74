use crate::capability::Capability;

const GP_NAMES: [&str; 31] = [
    "c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8", "c9", "c10", "c11", "c12", "c13",
    "c14", "c15", "c16", "c17", "c18", "c19", "c20", "c21", "c22", "c23", "c24", "c25", "c26",
    "c27", "c28", "c29", "c30",
];

/// The named root capability slots of one thread: the general-purpose
/// capability registers plus the stack, default-data, program-counter and
/// compartment-id registers.
///
/// Harvesting the live register file is architecture-specific (see
/// [`crate::arch`]); the scanner consumes a populated record by name, so
/// simulated capabilities can fill one in just as well.
pub struct Roots<C> {
    pub c: [C; 31],
    pub csp: C,
    pub ddc: C,
    pub pcc: C,
    pub cid_el0: C,
}

impl<C: Capability> Roots<C> {
    /// All slots with their register names, in register order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, C)> + '_ {
        GP_NAMES
            .iter()
            .copied()
            .zip(self.c.iter().copied())
            .chain([
                ("csp", self.csp),
                ("ddc", self.ddc),
                ("pcc", self.pcc),
                ("cid_el0", self.cid_el0),
            ])
    }
}

impl<C: Capability + Default> Default for Roots<C> {
    fn default() -> Self {
        Self {
            c: [C::default(); 31],
            csp: C::default(),
            ddc: C::default(),
            pcc: C::default(),
            cid_el0: C::default(),
        }
    }
}
