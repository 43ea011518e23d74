//! OS virtual-memory mapping query.
//!
//! Seeds the default include set of a [`Mapper`](crate::Mapper): the union
//! of all mappings that are both readable and capability-readable. On
//! CheriBSD the kernel reports capability protection per mapping; on Linux
//! (a development host, where no capability hardware exists) readable is
//! taken as capability-readable so the crate stays exercisable.

use crate::range::Range;
use crate::sparse_range::SparseRange;
use alloc::vec::Vec;
use rustix::process::Pid;

bitflags::bitflags! {
    /// Protection flags of one OS mapping entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
        const READ_CAP = 1 << 3;
        const WRITE_CAP = 1 << 4;
    }
}

/// One mapping, covering `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct VmEntry {
    pub start: u64,
    pub end: u64,
    pub flags: VmFlags,
}

/// The capability-readable mappings of the current process, unioned.
///
/// # Errors
///
/// Fails when the OS mapping query fails.
pub fn current() -> crate::Result<SparseRange> {
    capability_readable(rustix::process::getpid())
}

/// The capability-readable mappings of `pid`, unioned into a [`SparseRange`].
///
/// # Errors
///
/// Fails when the OS mapping query fails.
pub fn capability_readable(pid: Pid) -> crate::Result<SparseRange> {
    let mut out = SparseRange::new();
    for entry in query(pid)? {
        if entry.flags.contains(VmFlags::READ | VmFlags::READ_CAP) {
            out.combine(Range::from_base_limit(entry.start, entry.end));
        }
    }
    tracing::debug!(parts = out.len(), "capability-readable mappings: {out}");
    Ok(out)
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "freebsd")] {
        // KVME_PROT_* from sys/user.h; the capability bits are CheriBSD
        // extensions and stay clear on stock FreeBSD.
        const KVME_PROT_READ: i32 = 0x0000_0001;
        const KVME_PROT_WRITE: i32 = 0x0000_0002;
        const KVME_PROT_EXEC: i32 = 0x0000_0004;
        const KVME_PROT_READ_CAP: i32 = 0x0000_0008;
        const KVME_PROT_WRITE_CAP: i32 = 0x0000_0010;

        /// All mappings of `pid`, via `sysctl(KERN_PROC_VMMAP)`.
        ///
        /// # Errors
        ///
        /// Fails when the sysctl fails.
        pub fn query(pid: Pid) -> crate::Result<Vec<VmEntry>> {
            use core::{mem, ptr};

            let mut mib = [
                libc::CTL_KERN,
                libc::KERN_PROC,
                libc::KERN_PROC_VMMAP,
                pid.as_raw_nonzero().get(),
            ];

            // Size probe first; the kernel may grow the table before the
            // second call, so ask for a third more.
            let mut len: libc::size_t = 0;
            let rc = unsafe {
                libc::sysctl(
                    mib.as_mut_ptr(),
                    mib.len() as libc::c_uint,
                    ptr::null_mut(),
                    &mut len,
                    ptr::null(),
                    0,
                )
            };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
            len = len * 4 / 3;
            let mut buf = vec![0_u8; len];
            let rc = unsafe {
                libc::sysctl(
                    mib.as_mut_ptr(),
                    mib.len() as libc::c_uint,
                    buf.as_mut_ptr().cast(),
                    &mut len,
                    ptr::null(),
                    0,
                )
            };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }

            let mut entries = Vec::new();
            let mut off = 0_usize;
            // Records are variable-length: kve_structsize covers the fixed
            // header plus a truncated path, so copy at most that much into a
            // zeroed struct.
            while off + mem::size_of::<libc::c_int>() <= len {
                let mut kve: libc::kinfo_vmentry = unsafe { mem::zeroed() };
                let mut structsize: libc::c_int = 0;
                unsafe {
                    ptr::copy_nonoverlapping(
                        buf.as_ptr().add(off),
                        ptr::from_mut(&mut structsize).cast(),
                        mem::size_of::<libc::c_int>(),
                    );
                }
                if structsize <= 0 || off + structsize as usize > len {
                    break;
                }
                let n = (structsize as usize).min(mem::size_of::<libc::kinfo_vmentry>());
                unsafe {
                    ptr::copy_nonoverlapping(
                        buf.as_ptr().add(off),
                        ptr::from_mut(&mut kve).cast(),
                        n,
                    );
                }
                entries.push(VmEntry {
                    start: kve.kve_start as u64,
                    end: kve.kve_end as u64,
                    flags: decode_protection(kve.kve_protection),
                });
                off += structsize as usize;
            }
            Ok(entries)
        }

        fn decode_protection(prot: libc::c_int) -> VmFlags {
            let mut flags = VmFlags::empty();
            if prot & KVME_PROT_READ != 0 {
                flags |= VmFlags::READ;
            }
            if prot & KVME_PROT_WRITE != 0 {
                flags |= VmFlags::WRITE;
            }
            if prot & KVME_PROT_EXEC != 0 {
                flags |= VmFlags::EXEC;
            }
            if prot & KVME_PROT_READ_CAP != 0 {
                flags |= VmFlags::READ_CAP;
            }
            if prot & KVME_PROT_WRITE_CAP != 0 {
                flags |= VmFlags::WRITE_CAP;
            }
            flags
        }
    } else {
        /// All mappings of `pid`, parsed from `/proc/<pid>/maps`.
        ///
        /// # Errors
        ///
        /// Fails when the file cannot be read or an entry does not parse.
        pub fn query(pid: Pid) -> crate::Result<Vec<VmEntry>> {
            let path = format!("/proc/{}/maps", pid.as_raw_nonzero());
            let maps = std::fs::read_to_string(path)?;
            let mut entries = Vec::new();
            for line in maps.lines() {
                let entry = parse_line(line)
                    .ok_or_else(|| crate::Error::VmParse(line.to_string()))?;
                entries.push(entry);
            }
            Ok(entries)
        }

        // "7f1bc0a00000-7f1bc0a21000 rw-p 00000000 00:00 0 [heap]"
        fn parse_line(line: &str) -> Option<VmEntry> {
            let mut fields = line.split_whitespace();
            let span = fields.next()?;
            let perms = fields.next()?;
            let (start, end) = span.split_once('-')?;
            let start = u64::from_str_radix(start, 16).ok()?;
            let end = u64::from_str_radix(end, 16).ok()?;

            let mut flags = VmFlags::empty();
            let perms = perms.as_bytes();
            if perms.first() == Some(&b'r') {
                // No read-capability bit exists here; readable stands in.
                flags |= VmFlags::READ | VmFlags::READ_CAP;
            }
            if perms.get(1) == Some(&b'w') {
                flags |= VmFlags::WRITE | VmFlags::WRITE_CAP;
            }
            if perms.get(2) == Some(&b'x') {
                flags |= VmFlags::EXEC;
            }
            Some(VmEntry { start, end, flags })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(target_os = "freebsd"))]
    #[test]
    fn parses_maps_lines() {
        let entry = parse_line("7f1bc0a00000-7f1bc0a21000 r-xp 00000000 08:01 123 /usr/lib/libc.so").unwrap();
        assert_eq!(entry.start, 0x7f1b_c0a0_0000);
        assert_eq!(entry.end, 0x7f1b_c0a2_1000);
        assert_eq!(entry.flags, VmFlags::READ | VmFlags::READ_CAP | VmFlags::EXEC);

        let entry = parse_line("0-1000 ---p 00000000 00:00 0").unwrap();
        assert_eq!(entry.flags, VmFlags::empty());

        assert!(parse_line("not a maps line").is_none());
    }

    #[test]
    fn current_process_is_queryable() {
        let include = current().unwrap();
        assert!(!include.is_empty());
        // The stack is readable, so a live local must be covered.
        let probe = 0_u64;
        assert!(include.includes(Range::from_ref(&probe)));
    }
}
