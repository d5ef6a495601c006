//! Byte-range partitioning of an artifact.

use crate::types::ByteRange;

/// Split `[0, content_length)` into at most `segments` contiguous ranges.
///
/// Produces `min(segments, content_length)` ranges, none of them empty. When
/// the length does not divide evenly, the leading ranges take one extra byte
/// each. A zero length yields no ranges; `segments == 0` is treated as 1.
pub fn plan_partitions(content_length: u64, segments: usize) -> Vec<ByteRange> {
    if content_length == 0 {
        return Vec::new();
    }

    let count = (segments.max(1) as u64).min(content_length);
    let base = content_length / count;
    let remainder = content_length % count;

    let mut ranges = Vec::with_capacity(count as usize);
    let mut start = 0;
    for i in 0..count {
        let len = base + u64::from(i < remainder);
        ranges.push(ByteRange {
            start,
            end: start + len,
        });
        start += len;
    }
    ranges
}
