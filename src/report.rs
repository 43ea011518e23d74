//! JSON serialization of a [`Mapper`]'s state.
//!
//! Purely a serializer; no decisions are made here. The output is stable
//! enough for golden-file comparison but is not a versioned wire format.
//! All numeric fields are `0x`-prefixed lowercase hex.

use crate::capability::Capability;
use crate::mapper::Mapper;
use crate::maps::CapMap;
use crate::sparse_range::SparseRange;
use alloc::string::String;
use alloc::vec::Vec;
use serde_json::{json, Map, Value};
use std::io;

fn hex(value: u64) -> String {
    format!("{value:#x}")
}

fn ranges(ranges: &SparseRange) -> Value {
    Value::Array(
        ranges
            .iter()
            .map(|part| json!({ "base": hex(part.base()), "last": hex(part.last()) }))
            .collect(),
    )
}

fn map_value<C: Capability>(map: &dyn CapMap<C>) -> Value {
    json!({
        "name": map.name(),
        "address-space": map.address_space(),
        "ranges": ranges(map.ranges()),
    })
}

/// The report as a JSON tree.
pub fn to_value<C: Capability>(mapper: &Mapper<C>) -> Value {
    let mut roots = Map::new();
    for (name, cap) in mapper.roots() {
        roots.insert(name.clone(), Value::String(format!("{:#034x}", cap.to_bits())));
    }

    let mut maps = Vec::with_capacity(mapper.maps().count() + 1);
    maps.push(map_value::<C>(mapper.load_cap_map()));
    maps.extend(mapper.maps().map(map_value));

    json!({
        "capmap": {
            "roots": roots,
            "scan": {
                "include": ranges(mapper.include()),
                "exclude": ranges(mapper.exclude_self()),
                "depth": hex(mapper.max_seen_scan_depth()),
            },
            "maps": maps,
        }
    })
}

/// Writes the report to `writer`.
///
/// # Errors
///
/// Fails when serialization or the underlying writer fails.
pub fn write<C: Capability>(mapper: &Mapper<C>, writer: impl io::Write) -> crate::Result<()> {
    serde_json::to_writer_pretty(writer, &to_value(mapper))?;
    Ok(())
}
