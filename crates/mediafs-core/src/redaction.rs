//! Redaction descriptors for media files.
//!
//! A [`RedactionInfo`] describes the byte ranges of a file that must not be
//! returned to the caller that opened it (location EXIF blocks, owner
//! metadata, and similar). The descriptor is computed once per open by the
//! provider layer and then travels, immutable, with the file handle; the
//! read path queries it on every request to decide which parts of the
//! buffer to blank out.
//!
//! Ranges are inclusive on both ends and kept sorted and non-overlapping:
//! construction sorts the input and merges any ranges that touch, so the
//! per-read overlap query stays a simple ordered scan.

use std::borrow::Cow;

/// An inclusive byte range `[start, end]` to be redacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RedactionRange {
    /// First redacted byte offset.
    pub start: i64,
    /// Last redacted byte offset (inclusive).
    pub end: i64,
}

impl RedactionRange {
    /// Creates a new inclusive redaction range.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }
}

/// The set of redacted byte ranges for one open file.
///
/// An empty descriptor means the caller may see the whole file; this is the
/// common case and what [`RedactionInfo::default`] produces.
#[derive(Debug, Clone, Default)]
pub struct RedactionInfo {
    /// Sorted, non-overlapping ranges.
    ranges: Vec<RedactionRange>,
}

impl RedactionInfo {
    /// Builds a descriptor from arbitrary ranges.
    ///
    /// The input does not need to be sorted; overlapping and touching ranges
    /// are merged into one.
    pub fn new(ranges: impl IntoIterator<Item = RedactionRange>) -> Self {
        let mut ranges: Vec<RedactionRange> = ranges.into_iter().collect();
        ranges.sort_unstable();

        let mut merged: Vec<RedactionRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            if let Some(last) = merged.last_mut() {
                if last.end >= range.start {
                    last.end = last.end.max(range.end);
                    continue;
                }
            }
            merged.push(range);
        }

        Self { ranges: merged }
    }

    /// Number of (merged) redaction ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True if no ranges are present.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if any byte of the file is redacted.
    pub fn needs_redaction(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// All ranges, sorted.
    pub fn ranges(&self) -> &[RedactionRange] {
        &self.ranges
    }

    /// Whether a read of `size` bytes at offset `off` touches any redacted
    /// range.
    pub fn overlaps_read(&self, size: usize, off: i64) -> bool {
        match (self.ranges.first(), self.ranges.last()) {
            (Some(first), Some(last)) => off <= last.end && off + size as i64 >= first.start,
            _ => false,
        }
    }

    /// The sorted ranges intersecting a read of `size` bytes at offset
    /// `off`, or an empty vector when the read is clean.
    ///
    /// Because the ranges are sorted and disjoint, the overlapping subset is
    /// always contiguous.
    pub fn overlapping_ranges(&self, size: usize, off: i64) -> Vec<RedactionRange> {
        if !self.overlaps_read(size, off) {
            return Vec::new();
        }
        let end = off + size as i64;
        self.ranges
            .iter()
            .copied()
            .filter(|r| off <= r.end && end >= r.start)
            .collect()
    }
}

/// PII-safe rendering of a single path segment, for log lines.
///
/// Media file names are user data; the stem is masked while the extension is
/// kept so log output still shows the shape of a path and the media type.
pub fn sanitize_segment(name: &str) -> Cow<'_, str> {
    if name.is_empty() {
        return Cow::Borrowed(name);
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Cow::Owned(format!("{}.{ext}", "*".repeat(stem.chars().count())))
        }
        _ => Cow::Owned("*".repeat(name.chars().count())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pairs: &[(i64, i64)]) -> RedactionInfo {
        RedactionInfo::new(pairs.iter().map(|&(s, e)| RedactionRange::new(s, e)))
    }

    fn ranges(pairs: &[(i64, i64)]) -> Vec<RedactionRange> {
        pairs.iter().map(|&(s, e)| RedactionRange::new(s, e)).collect()
    }

    #[test]
    fn test_no_redaction_ranges() {
        let info = RedactionInfo::default();
        assert_eq!(info.len(), 0);
        assert!(!info.needs_redaction());
        assert!(info.overlapping_ranges(1000, 1000).is_empty());
    }

    #[test]
    fn test_single_redaction_range() {
        let info = info(&[(1, 10)]);
        assert_eq!(info.len(), 1);
        assert!(info.needs_redaction());

        // Overlapping reads
        assert_eq!(info.overlapping_ranges(1000, 0), ranges(&[(1, 10)]));
        assert_eq!(info.overlapping_ranges(5, 0), ranges(&[(1, 10)]));
        assert_eq!(info.overlapping_ranges(5, 5), ranges(&[(1, 10)]));
        assert_eq!(info.overlapping_ranges(10, 1), ranges(&[(1, 10)]));
        assert_eq!(info.overlapping_ranges(1, 1), ranges(&[(1, 10)]));

        // Non-overlapping reads
        assert!(info.overlapping_ranges(100, 11).is_empty());
        assert!(info.overlapping_ranges(1, 11).is_empty());
    }

    #[test]
    fn test_sorted_and_non_overlapping_ranges() {
        let info = info(&[(1, 10), (15, 21), (32, 40)]);
        assert_eq!(info.len(), 3);

        // Read strictly containing all ranges: [0, 49]
        assert_eq!(
            info.overlapping_ranges(50, 0),
            ranges(&[(1, 10), (15, 21), (32, 40)])
        );

        // Read containing a subset of the ranges: [15, 40]
        assert_eq!(
            info.overlapping_ranges(26, 15),
            ranges(&[(15, 21), (32, 40)])
        );

        // Read intersecting a subset of the ranges: [16, 32]
        assert_eq!(
            info.overlapping_ranges(17, 16),
            ranges(&[(15, 21), (32, 40)])
        );
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let info = info(&[(1, 10), (32, 40), (15, 21)]);
        assert_eq!(info.len(), 3);
        assert_eq!(
            info.ranges(),
            ranges(&[(1, 10), (15, 21), (32, 40)]).as_slice()
        );
        assert_eq!(
            info.overlapping_ranges(26, 15),
            ranges(&[(15, 21), (32, 40)])
        );
    }

    #[test]
    fn test_sort_and_merge_touching_ranges() {
        let info = info(&[(35, 40), (1, 10), (32, 35), (15, 21)]);
        assert_eq!(info.len(), 3);
        assert_eq!(
            info.overlapping_ranges(50, 0),
            ranges(&[(1, 10), (15, 21), (32, 40)])
        );
    }

    #[test]
    fn test_merge_all_ranges_into_the_first() {
        let info = info(&[(1, 100), (2, 99), (3, 98), (4, 97), (3, 15)]);
        assert_eq!(info.len(), 1);
        assert_eq!(info.overlapping_ranges(100, 1), ranges(&[(1, 100)]));
        assert_eq!(info.overlapping_ranges(26, 15), ranges(&[(1, 100)]));
        assert_eq!(info.overlapping_ranges(1000, 0), ranges(&[(1, 100)]));
    }

    #[test]
    fn test_merge_all_ranges_into_the_last() {
        let info = info(&[(4, 96), (3, 97), (2, 98), (1, 99), (0, 100)]);
        assert_eq!(info.len(), 1);
        assert_eq!(info.overlapping_ranges(100, 0), ranges(&[(0, 100)]));
        assert_eq!(info.overlapping_ranges(26, 15), ranges(&[(0, 100)]));
    }

    #[test]
    fn test_merge_ranges_progressively() {
        let forward = info(&[(1, 11), (2, 12), (3, 13), (4, 14), (5, 15)]);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward.overlapping_ranges(15, 1), ranges(&[(1, 15)]));
        assert_eq!(forward.overlapping_ranges(10, 2), ranges(&[(1, 15)]));
        assert_eq!(forward.overlapping_ranges(100, 0), ranges(&[(1, 15)]));

        let reversed = info(&[(5, 15), (4, 14), (3, 13), (2, 12), (1, 11)]);
        assert_eq!(reversed.len(), 1);
        assert_eq!(reversed.overlapping_ranges(15, 1), ranges(&[(1, 15)]));
    }

    #[test]
    fn test_overlaps_read() {
        let info = info(&[(10, 20)]);
        assert!(info.overlaps_read(5, 8));
        assert!(info.overlaps_read(1, 20));
        assert!(!info.overlaps_read(5, 21));
        assert!(!info.overlaps_read(4, 5));
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("img.jpg"), "***.jpg");
        assert_eq!(sanitize_segment("holiday_video.mp4"), "*************.mp4");
        assert_eq!(sanitize_segment("Pictures"), "********");
        assert_eq!(sanitize_segment(".nomedia"), "********");
        assert_eq!(sanitize_segment(""), "");
    }
}
