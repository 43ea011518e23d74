//! Morello hardware capabilities.
//!
//! Requires the Morello LLVM toolchain and a purecap target; every pointer
//! below is itself a capability, which is what lets a plain `str`/`ldr` of a
//! C register preserve tags.

use crate::capability::{CapPerms, Capability};
use crate::roots::Roots;
use core::arch::asm;
use core::fmt;
use core::mem::MaybeUninit;

// Architectural permission bit positions in the GCPERM result.
const M_PERM_GLOBAL: u64 = 1 << 0;
const M_PERM_MUTABLE_LOAD: u64 = 1 << 6;
const M_PERM_COMPARTMENT_ID: u64 = 1 << 7;
const M_PERM_BRANCH_SEALED_PAIR: u64 = 1 << 8;
const M_PERM_SYSTEM: u64 = 1 << 9;
const M_PERM_UNSEAL: u64 = 1 << 10;
const M_PERM_SEAL: u64 = 1 << 11;
const M_PERM_STORE_LOCAL_CAP: u64 = 1 << 12;
const M_PERM_STORE_CAP: u64 = 1 << 13;
const M_PERM_LOAD_CAP: u64 = 1 << 14;
const M_PERM_EXECUTE: u64 = 1 << 15;
const M_PERM_STORE: u64 = 1 << 16;
const M_PERM_LOAD: u64 = 1 << 17;

// Reserved object types: 1 = RB sentry, 2 = LPB, 3 = LB.
const OTYPE_UNSEALED: u64 = 0;
const OTYPE_SENTRY_LAST: u64 = 3;

/// A Morello capability in its tagged 16-byte in-memory form.
///
/// Must live in capability-aligned storage; the purecap ABI moves it with
/// capability loads and stores, so the tag travels with the value.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct MorelloCap(u128);

impl MorelloCap {
    pub const NULL: Self = Self(0);
}

impl Default for MorelloCap {
    fn default() -> Self {
        Self::NULL
    }
}

/// Reads one field of the capability at `src` with a `gc*` instruction.
macro_rules! gcfield {
    ($src:expr, $insn:literal) => {{
        let out: u64;
        // SAFETY: c16 is caller-saved; the load only touches our own 16
        // bytes.
        unsafe {
            asm!(
                concat!("ldr c16, [{src}]\n", $insn, " {out}, c16"),
                src = in(reg) $src,
                out = out(reg) out,
                out("x16") _,
                options(nostack, readonly),
            );
        }
        out
    }};
}

impl Capability for MorelloCap {
    const WORD: u64 = 16;

    fn tag(&self) -> bool {
        gcfield!(&self.0, "gctag") != 0
    }

    fn base(&self) -> u64 {
        gcfield!(&self.0, "gcbase")
    }

    fn length(&self) -> (bool, u64) {
        // GCLEN saturates the 65-bit length to u64::MAX.
        let len = gcfield!(&self.0, "gclen");
        if len == u64::MAX {
            (true, 0)
        } else {
            (false, len)
        }
    }

    fn perms(&self) -> CapPerms {
        let raw = gcfield!(&self.0, "gcperm");
        let mut perms = CapPerms::empty();
        for (bit, perm) in [
            (M_PERM_GLOBAL, CapPerms::GLOBAL),
            (M_PERM_EXECUTE, CapPerms::EXECUTE),
            (M_PERM_LOAD, CapPerms::LOAD),
            (M_PERM_STORE, CapPerms::STORE),
            (M_PERM_LOAD_CAP, CapPerms::LOAD_CAP),
            (M_PERM_STORE_CAP, CapPerms::STORE_CAP),
            (M_PERM_STORE_LOCAL_CAP, CapPerms::STORE_LOCAL_CAP),
            (M_PERM_SEAL, CapPerms::SEAL),
            (M_PERM_BRANCH_SEALED_PAIR, CapPerms::CINVOKE),
            (M_PERM_UNSEAL, CapPerms::UNSEAL),
            (M_PERM_SYSTEM, CapPerms::ACCESS_SYS_REGS),
            (M_PERM_COMPARTMENT_ID, CapPerms::SET_CID),
        ] {
            if raw & bit != 0 {
                perms |= perm;
            }
        }
        // M_PERM_MUTABLE_LOAD has no counterpart in the portable set.
        perms
    }

    fn is_sealed(&self) -> bool {
        gcfield!(&self.0, "gcseal") != 0
    }

    fn otype(&self) -> u64 {
        gcfield!(&self.0, "gctype")
    }

    fn is_sentry(&self) -> bool {
        let otype = self.otype();
        otype > OTYPE_UNSEALED && otype <= OTYPE_SENTRY_LAST
    }

    fn to_bits(&self) -> u128 {
        self.0
    }

    unsafe fn load_cap_at(&self, addr: u64) -> Self {
        let mut out = MaybeUninit::<MorelloCap>::uninit();
        // Rebase our authority onto `addr`, load the word through it, and
        // spill it tag-preserving.
        asm!(
            "ldr c16, [{auth}]",
            "scvalue c16, c16, {addr}",
            "ldr c17, [c16, #0]",
            "str c17, [{out}]",
            auth = in(reg) &self.0,
            addr = in(reg) addr,
            out = in(reg) out.as_mut_ptr(),
            out("x16") _,
            out("x17") _,
            options(nostack),
        );
        out.assume_init()
    }
}

impl fmt::Debug for MorelloCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MorelloCap({:#034x})", self.0)
    }
}

/// Dumps the thread's live capability register file.
///
/// Each register is spilled with a single tag-preserving store before the
/// surrounding code can clobber it; the special registers follow once the
/// general-purpose file is safe.
pub fn harvest_roots() -> Roots<MorelloCap> {
    let mut roots = Roots::<MorelloCap>::default();

    macro_rules! spill {
        ($slot:expr, $reg:literal) => {
            // SAFETY: stores 16 bytes into capability-aligned storage we own.
            unsafe {
                asm!(
                    concat!("str ", $reg, ", [{out}]"),
                    out = in(reg) &mut $slot,
                    options(nostack),
                );
            }
        };
    }
    macro_rules! spill_sys {
        ($slot:expr, $reg:literal) => {
            // SAFETY: as above; the mrs only reads the special register.
            unsafe {
                asm!(
                    concat!("mrs c16, ", $reg, "\nstr c16, [{out}]"),
                    out = in(reg) &mut $slot,
                    out("x16") _,
                    options(nostack),
                );
            }
        };
    }

    spill!(roots.c[0], "c0");
    spill!(roots.c[1], "c1");
    spill!(roots.c[2], "c2");
    spill!(roots.c[3], "c3");
    spill!(roots.c[4], "c4");
    spill!(roots.c[5], "c5");
    spill!(roots.c[6], "c6");
    spill!(roots.c[7], "c7");
    spill!(roots.c[8], "c8");
    spill!(roots.c[9], "c9");
    spill!(roots.c[10], "c10");
    spill!(roots.c[11], "c11");
    spill!(roots.c[12], "c12");
    spill!(roots.c[13], "c13");
    spill!(roots.c[14], "c14");
    spill!(roots.c[15], "c15");
    spill!(roots.c[16], "c16");
    spill!(roots.c[17], "c17");
    spill!(roots.c[18], "c18");
    spill!(roots.c[19], "c19");
    spill!(roots.c[20], "c20");
    spill!(roots.c[21], "c21");
    spill!(roots.c[22], "c22");
    spill!(roots.c[23], "c23");
    spill!(roots.c[24], "c24");
    spill!(roots.c[25], "c25");
    spill!(roots.c[26], "c26");
    spill!(roots.c[27], "c27");
    spill!(roots.c[28], "c28");
    spill!(roots.c[29], "c29");
    spill!(roots.c[30], "c30");

    // SAFETY: csp is read through a plain capability move first.
    unsafe {
        asm!(
            "mov c16, csp",
            "str c16, [{out}]",
            out = in(reg) &mut roots.csp,
            out("x16") _,
            options(nostack),
        );
    }
    spill_sys!(roots.ddc, "DDC");
    spill_sys!(roots.cid_el0, "CID_EL0");
    // The program counter cannot be read directly; derive it.
    // SAFETY: adr materializes the current pcc-derived capability.
    unsafe {
        asm!(
            "adr c16, #0",
            "str c16, [{out}]",
            out = in(reg) &mut roots.pcc,
            out("x16") _,
            options(nostack),
        );
    }

    roots
}
