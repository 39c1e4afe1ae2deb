//! Splitting a payload into chunk ranges.

use std::ops::Range;

/// Byte ranges of `ceil(len / chunk_size)` chunks covering `[0, len)`.
///
/// Every range is `chunk_size` long except possibly the last. A zero
/// `chunk_size` yields no ranges.
pub fn partition(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    if chunk_size == 0 {
        return Vec::new();
    }
    (0..len.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            start..(start + chunk_size).min(len)
        })
        .collect()
}
