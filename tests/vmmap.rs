//! The OS mapping query against live fixtures.

use capmap::{vmmap, Range};

#[test_log::test]
fn readable_mappings_are_included() {
    let size = capmap::host_page_size();
    let ptr = unsafe {
        rustix::mm::mmap_anonymous(
            std::ptr::null_mut(),
            size,
            rustix::mm::ProtFlags::READ | rustix::mm::ProtFlags::WRITE,
            rustix::mm::MapFlags::PRIVATE,
        )
        .unwrap()
    };

    let include = vmmap::current().unwrap();
    let page = Range::from_base_length(ptr as u64, size as u64);
    assert!(include.includes(page), "fresh rw page {page} missing from {include}");

    unsafe { rustix::mm::munmap(ptr, size).unwrap() };
}

#[test_log::test]
fn unreadable_mappings_are_excluded() {
    let size = capmap::host_page_size();
    let ptr = unsafe {
        rustix::mm::mmap_anonymous(
            std::ptr::null_mut(),
            size,
            rustix::mm::ProtFlags::empty(),
            rustix::mm::MapFlags::PRIVATE,
        )
        .unwrap()
    };

    let include = vmmap::current().unwrap();
    let page = Range::from_base_length(ptr as u64, size as u64);
    assert!(!include.overlaps(page), "inaccessible page {page} leaked into {include}");

    unsafe { rustix::mm::munmap(ptr, size).unwrap() };
}
