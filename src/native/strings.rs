//! Printable-string extraction from raw image bytes.

/// Minimum run length for an extracted string.
const MIN_RUN: usize = 4;

/// Cap on extracted strings, applied after sorting by length.
const EXTRACT_MAX: usize = 200;

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// ASCII runs of printable bytes.
fn ascii_runs(data: &[u8], out: &mut Vec<String>) {
    let mut start = None;
    for (index, &byte) in data.iter().enumerate() {
        if is_printable(byte) {
            start.get_or_insert(index);
        } else if let Some(s) = start.take() {
            if index - s >= MIN_RUN {
                out.push(String::from_utf8_lossy(&data[s..index]).into_owned());
            }
        }
    }
    if let Some(s) = start {
        if data.len() - s >= MIN_RUN {
            out.push(String::from_utf8_lossy(&data[s..]).into_owned());
        }
    }
}

/// UTF-16LE runs where every code unit is printable ASCII.
///
/// Only even alignment is scanned; PE string tables and resources are
/// aligned in practice, and scanning both phases doubles the noise.
fn utf16le_runs(data: &[u8], out: &mut Vec<String>) {
    let mut run = String::new();
    let mut units = data.chunks_exact(2);
    for unit in &mut units {
        let (lo, hi) = (unit[0], unit[1]);
        if hi == 0 && is_printable(lo) {
            run.push(lo as char);
        } else {
            if run.len() >= MIN_RUN {
                out.push(std::mem::take(&mut run));
            }
            run.clear();
        }
    }
    if run.len() >= MIN_RUN {
        out.push(run);
    }
}

/// Extract the most informative printable strings from an image.
///
/// ASCII and UTF-16LE runs are merged, deduplicated keeping first
/// occurrence, then ordered longest-first and capped.
pub fn extract_strings(data: &[u8]) -> Vec<String> {
    let mut found = Vec::new();
    ascii_runs(data, &mut found);
    utf16le_runs(data, &mut found);

    let mut seen = std::collections::HashSet::new();
    found.retain(|s| seen.insert(s.clone()));
    found.sort_by(|a, b| b.len().cmp(&a.len()));
    found.truncate(EXTRACT_MAX);
    found
}
