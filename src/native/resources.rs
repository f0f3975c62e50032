//! Win32 resource-directory summary.
//!
//! A bounded manual walk of the top level of `IMAGE_RESOURCE_DIRECTORY`:
//! one row per resource type with the count of entries beneath it. Every
//! read is bounds-checked; any structural surprise yields an empty table
//! rather than an error, since resources are advisory in triage output.

use serde::{Deserialize, Serialize};

/// One top-level resource type and how many entries sit under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeInfo {
    pub name: String,
    pub count: usize,
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Well-known resource type ids (winuser.h RT_* constants).
fn type_name(id: u32) -> String {
    match id {
        1 => "Cursor".to_string(),
        2 => "Bitmap".to_string(),
        3 => "Icon".to_string(),
        4 => "Menu".to_string(),
        5 => "Dialog".to_string(),
        6 => "String".to_string(),
        7 => "FontDir".to_string(),
        8 => "Font".to_string(),
        9 => "Accelerator".to_string(),
        10 => "RcData".to_string(),
        11 => "MessageTable".to_string(),
        12 => "GroupCursor".to_string(),
        14 => "GroupIcon".to_string(),
        16 => "Version".to_string(),
        17 => "DlgInclude".to_string(),
        19 => "PlugPlay".to_string(),
        20 => "Vxd".to_string(),
        21 => "AniCursor".to_string(),
        22 => "AniIcon".to_string(),
        23 => "Html".to_string(),
        24 => "Manifest".to_string(),
        other => format!("#{other}"),
    }
}

/// Length-prefixed UTF-16 name at `offset` relative to the directory.
fn named_entry(dir: &[u8], offset: usize) -> Option<String> {
    let length = read_u16(dir, offset)? as usize;
    let bytes = dir.get(offset + 2..offset + 2 + length * 2)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|u| u16::from_le_bytes([u[0], u[1]]))
        .collect();
    Some(String::from_utf16_lossy(&units))
}

/// Number of entries directly under a subdirectory at `offset`.
fn subdirectory_count(dir: &[u8], offset: usize) -> Option<usize> {
    let named = read_u16(dir, offset + 12)? as usize;
    let ids = read_u16(dir, offset + 14)? as usize;
    Some(named + ids)
}

/// Summarize the top level of a resource directory slice.
///
/// `dir` starts at the directory itself; entry name offsets and
/// subdirectory offsets are relative to it. Returns rows sorted by
/// descending count.
pub fn summarize(dir: &[u8]) -> Vec<ResourceTypeInfo> {
    let Some(named) = read_u16(dir, 12) else {
        return Vec::new();
    };
    let Some(ids) = read_u16(dir, 14) else {
        return Vec::new();
    };
    let total = named as usize + ids as usize;

    let mut rows = Vec::new();
    for index in 0..total {
        let entry = 16 + index * 8;
        let Some(name_or_id) = read_u32(dir, entry) else {
            break;
        };
        let Some(data_offset) = read_u32(dir, entry + 4) else {
            break;
        };

        let name = if name_or_id & 0x8000_0000 != 0 {
            match named_entry(dir, (name_or_id & 0x7FFF_FFFF) as usize) {
                Some(n) => n,
                None => continue,
            }
        } else {
            type_name(name_or_id)
        };

        // High bit set means the entry points at a subdirectory.
        let count = if data_offset & 0x8000_0000 != 0 {
            subdirectory_count(dir, (data_offset & 0x7FFF_FFFF) as usize).unwrap_or(0)
        } else {
            1
        };
        rows.push(ResourceTypeInfo { name, count });
    }

    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}
