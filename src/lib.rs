//! In-process capability maps for CHERI processes.
//!
//! A capability is a 128-bit hardware-enforced fat pointer carrying bounds,
//! permissions, a seal and a provenance tag. Starting from a set of root
//! capabilities (typically the live register file, see [`Roots`]), a
//! [`Mapper`] walks the closure of capabilities reachable by loading through
//! capability-permitting memory, feeds every value it visits to a set of
//! [`maps`] (classifiers), and the result can be serialized with
//! [`report`].
//!
//! The underlying machinery is a sparse range algebra: [`Range`] is a closed
//! interval over the 64-bit address space, and [`SparseRange`] keeps an
//! always-canonical set of disjoint, non-adjacent ranges. The traversal
//! subtracts already-explored memory from each capability's bounds before
//! descending, which is also what terminates it on cyclic graphs.

extern crate alloc;

pub mod arch;
mod capability;
mod errors;
mod mapper;
pub mod maps;
mod range;
pub mod report;
mod roots;
mod sparse_range;
pub mod vmmap;

pub use capability::{CapPerms, Capability};
pub use errors::Error;
pub use mapper::Mapper;
pub use range::Range;
pub use roots::Roots;
pub use sparse_range::SparseRange;

pub type Result<T> = core::result::Result<T, Error>;

/// Size of one host page.
pub fn host_page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE).try_into().unwrap() }
}
