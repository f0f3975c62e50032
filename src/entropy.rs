//! Shannon entropy over byte buffers.
//!
//! Single-pass histogram entropy, used by the whole-file and per-section
//! packing heuristics. The thresholds are heuristic constants, not
//! invariants; callers may compare against their own cut-offs.

/// Whole-file entropy at or above this suggests compression or packing.
pub const HIGH_ENTROPY_FILE: f64 = 7.2;

/// Per-section entropy at or above this suggests a packed section.
pub const HIGH_ENTROPY_SECTION: f64 = 7.4;

/// Minimum ratio of non-control characters for decoded text to count as
/// printable.
pub const PRINTABLE_RATIO: f64 = 0.8;

/// Calculates the Shannon entropy of a byte slice.
///
/// Returns a value between 0.0 and 8.0, where 0.0 means every byte is the
/// same and 8.0 means a uniform distribution over all 256 values. Empty
/// input yields 0.0.
#[inline]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut histogram = [0usize; 256];
    for &byte in data {
        histogram[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count == 0 {
            continue;
        }
        let p = (count as f64) / len;
        entropy -= p * p.log2();
    }

    entropy
}

/// Shannon entropy rounded to 3 decimals, half away from zero.
///
/// This is the form reported in section tables and triage summaries.
#[inline]
pub fn entropy_rounded(data: &[u8]) -> f64 {
    round3(shannon_entropy(data))
}

#[inline]
fn round3(value: f64) -> f64 {
    // f64::round rounds half away from zero.
    (value * 1000.0).round() / 1000.0
}
