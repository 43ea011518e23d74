//! Architecture-specific pieces: the hardware capability type and the live
//! register harvest.
//!
//! Everything here is gated on the target actually having capability
//! hardware; on other targets the module is empty and the scanner is driven
//! with simulated capabilities instead (as the test suite does).

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "aarch64", target_feature = "morello"))] {
        mod morello;
        pub use morello::{harvest_roots, MorelloCap};
    }
}
