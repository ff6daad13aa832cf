//! Indexed access to one shard file
//!
//! A shard file holds every sample of one signal for one period:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Signal name, NUL-padded/truncated (64 bytes)│
//! │  Padding up to the data-start offset (128)   │
//! ├──────────────────────────────────────────────┤
//! │  Record 0 │ Record 1 │ ... │ Record N-1      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! `N = (file_size - data_start) / record_size`; any remainder means the
//! file is truncated or corrupt. Records are expected non-decreasing by
//! timestamp; duplicate timestamps are legal and always grouped, never
//! dropped.
//!
//! The file is memory-mapped and decoded on demand, so locating a
//! timestamp is O(log n) bisection plus O(group size) to materialize the
//! equal-timestamp group, without ever materializing the whole series.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::record::{Record, RecordLayout};

/// Fixed width of the NUL-padded signal name at the start of the header
pub const SIGNAL_NAME_LEN: usize = 64;

/// Offset where packed records begin
pub const DATA_START_OFFSET: usize = 128;

/// Result of locating a query instant within a series
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampSearch {
    /// All records whose timestamp equals the query instant (never empty)
    Exact(Vec<Record>),
    /// Nearest distinct timestamps on either side of the query instant
    Neighbors {
        /// All records at the latest timestamp strictly less than the
        /// query instant; empty before the start of the series
        before: Vec<Record>,
        /// All records at the earliest timestamp strictly greater than
        /// the query instant; empty past the end of the series
        after: Vec<Record>,
    },
}

impl TimestampSearch {
    /// The exact group, if the query instant was hit exactly
    pub fn exact(&self) -> Option<&[Record]> {
        match self {
            Self::Exact(records) => Some(records),
            Self::Neighbors { .. } => None,
        }
    }

    /// The before group; empty for exact hits
    pub fn before(&self) -> &[Record] {
        match self {
            Self::Exact(_) => &[],
            Self::Neighbors { before, .. } => before,
        }
    }

    /// The after group; empty for exact hits
    pub fn after(&self) -> &[Record] {
        match self {
            Self::Exact(_) => &[],
            Self::Neighbors { after, .. } => after,
        }
    }
}

struct ShardInner {
    path: PathBuf,
    layout: RecordLayout,
    map: Mmap,
    signal: String,
    record_count: usize,
}

impl ShardInner {
    fn timestamp_at(&self, index: usize) -> i64 {
        let offset = DATA_START_OFFSET + index * self.layout.record_size();
        self.layout.decode_timestamp(&self.map[offset..])
    }

    fn record_at(&self, index: usize) -> Record {
        let size = self.layout.record_size();
        let offset = DATA_START_OFFSET + index * size;
        self.layout
            .decode(&self.map[offset..offset + size])
            .expect("record slice length verified at open")
    }

    /// First index whose timestamp is >= t
    fn lower_bound(&self, t: i64) -> usize {
        let (mut lo, mut hi) = (0, self.record_count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.timestamp_at(mid) < t {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// All records sharing the timestamp at `anchor`, expanded in both
    /// directions
    fn group_at(&self, anchor: usize) -> (i64, Vec<Record>) {
        let ts = self.timestamp_at(anchor);
        let mut start = anchor;
        while start > 0 && self.timestamp_at(start - 1) == ts {
            start -= 1;
        }
        let mut end = anchor + 1;
        while end < self.record_count && self.timestamp_at(end) == ts {
            end += 1;
        }
        (ts, (start..end).map(|i| self.record_at(i)).collect())
    }
}

/// One open shard file, cheaply cloneable and immutable for its lifetime
#[derive(Clone)]
pub struct ShardFile {
    inner: Arc<ShardInner>,
}

impl std::fmt::Debug for ShardFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardFile")
            .field("path", &self.inner.path)
            .field("signal", &self.inner.signal)
            .field("layout", &self.inner.layout)
            .field("record_count", &self.inner.record_count)
            .finish()
    }
}

impl ShardFile {
    /// Open and index a shard file.
    ///
    /// Fails with a missing-shard error if the file does not exist, a
    /// format error if the file is shorter than the header or holds a
    /// fractional number of records, and an empty-shard error (non-fatal
    /// to multi-shard callers) if it holds zero records.
    pub fn open(path: impl AsRef<Path>, layout: RecordLayout) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::missing_shard(path)
            } else {
                Error::Io(e)
            }
        })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < DATA_START_OFFSET {
            return Err(Error::format(
                path.display().to_string(),
                format!(
                    "{} bytes is shorter than the {}-byte header",
                    file_size, DATA_START_OFFSET
                ),
            ));
        }

        let record_size = layout.record_size();
        let data_size = file_size - DATA_START_OFFSET;
        if data_size % record_size != 0 {
            return Err(Error::format(
                path.display().to_string(),
                format!(
                    "{} data bytes is not a multiple of the {}-byte {} record",
                    data_size, record_size, layout
                ),
            ));
        }

        let record_count = data_size / record_size;
        if record_count == 0 {
            return Err(Error::empty_shard(path));
        }

        let map = unsafe { Mmap::map(&file)? };

        let name_bytes = &map[..SIGNAL_NAME_LEN];
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SIGNAL_NAME_LEN);
        let signal = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        Ok(Self {
            inner: Arc::new(ShardInner {
                path: path.to_path_buf(),
                layout,
                map,
                signal,
                record_count,
            }),
        })
    }

    /// Signal name recorded in the shard header
    pub fn signal(&self) -> &str {
        &self.inner.signal
    }

    /// Path this shard was opened from
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of records in the shard
    pub fn record_count(&self) -> usize {
        self.inner.record_count
    }

    /// Timestamp of the first record
    pub fn first_timestamp(&self) -> i64 {
        self.inner.timestamp_at(0)
    }

    /// Timestamp of the last record
    pub fn last_timestamp(&self) -> i64 {
        self.inner.timestamp_at(self.inner.record_count - 1)
    }

    /// Locate `t` in the series.
    ///
    /// O(log n) bisection over the record timestamps plus O(group size)
    /// to materialize the equal-timestamp group(s) around the hit.
    pub fn query(&self, t: i64) -> TimestampSearch {
        let inner = &self.inner;
        let anchor = inner.lower_bound(t);

        if anchor < inner.record_count && inner.timestamp_at(anchor) == t {
            let (_, records) = inner.group_at(anchor);
            return TimestampSearch::Exact(records);
        }

        let before = if anchor > 0 {
            inner.group_at(anchor - 1).1
        } else {
            Vec::new()
        };
        let after = if anchor < inner.record_count {
            inner.group_at(anchor).1
        } else {
            Vec::new()
        };

        TimestampSearch::Neighbors { before, after }
    }

    /// Lazy ascending cursor over equal-timestamp groups.
    ///
    /// The cursor is finite and restartable only by calling `groups`
    /// again; it cannot be rewound in flight.
    pub fn groups(&self) -> GroupCursor {
        GroupCursor {
            inner: Arc::clone(&self.inner),
            index: 0,
            stop: None,
        }
    }

    /// Lazy ascending cursor over the groups with timestamps inside
    /// `[start, stop]` (either bound optional)
    pub fn groups_between(&self, start: Option<i64>, stop: Option<i64>) -> GroupCursor {
        let index = match start {
            Some(start) => self.inner.lower_bound(start),
            None => 0,
        };
        GroupCursor {
            inner: Arc::clone(&self.inner),
            index,
            stop,
        }
    }

    /// Verify that record timestamps are non-decreasing.
    ///
    /// Bisection results are only meaningful over ordered records; a
    /// harness that cannot trust its input runs this O(n) check first.
    pub fn check_monotonic(&self) -> Result<()> {
        for i in 1..self.inner.record_count {
            let prev = self.inner.timestamp_at(i - 1);
            let next = self.inner.timestamp_at(i);
            if next < prev {
                return Err(Error::format(
                    self.inner.path.display().to_string(),
                    format!(
                        "timestamp {} at record {} decreases below {} at record {}",
                        next,
                        i,
                        prev,
                        i - 1
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Owning iterator over a shard's equal-timestamp groups
pub struct GroupCursor {
    inner: Arc<ShardInner>,
    index: usize,
    stop: Option<i64>,
}

impl Iterator for GroupCursor {
    type Item = (i64, Vec<Record>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.inner.record_count {
            return None;
        }
        let ts = self.inner.timestamp_at(self.index);
        if let Some(stop) = self.stop {
            if ts > stop {
                self.index = self.inner.record_count;
                return None;
            }
        }

        let mut records = vec![self.inner.record_at(self.index)];
        self.index += 1;
        while self.index < self.inner.record_count && self.inner.timestamp_at(self.index) == ts {
            records.push(self.inner.record_at(self.index));
            self.index += 1;
        }
        Some((ts, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};
    use std::io::Write;
    use tempfile::tempdir;

    fn write_shard(
        path: &Path,
        signal: &str,
        layout: RecordLayout,
        records: &[(u32, f64, u32)],
    ) {
        let mut data = vec![0u8; DATA_START_OFFSET];
        let name = signal.as_bytes();
        let len = name.len().min(SIGNAL_NAME_LEN);
        data[..len].copy_from_slice(&name[..len]);

        for &(ts, value, status) in records {
            let mut buf = vec![0u8; layout.record_size()];
            LittleEndian::write_u32(&mut buf[0..4], ts);
            match layout {
                RecordLayout::Compact => {
                    LittleEndian::write_f32(&mut buf[4..8], value as f32);
                    LittleEndian::write_u32(&mut buf[8..12], status);
                }
                RecordLayout::Extended => {
                    LittleEndian::write_u32(&mut buf[8..12], status);
                    LittleEndian::write_f64(&mut buf[16..24], value);
                }
            }
            data.extend_from_slice(&buf);
        }

        let mut file = File::create(path).unwrap();
        file.write_all(&data).unwrap();
    }

    #[test]
    fn test_open_reads_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Supply_Temp.hst");
        write_shard(&path, "Supply Temp", RecordLayout::Compact, &[(10, 1.0, 0)]);

        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        assert_eq!(shard.signal(), "Supply Temp");
        assert_eq!(shard.record_count(), 1);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let err = ShardFile::open(dir.path().join("absent.hst"), RecordLayout::Compact)
            .unwrap_err();
        assert!(err.is_missing_shard());
    }

    #[test]
    fn test_open_truncated_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.hst");
        std::fs::write(&path, vec![0u8; DATA_START_OFFSET - 1]).unwrap();
        let err = ShardFile::open(&path, RecordLayout::Compact).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_open_fractional_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frac.hst");
        std::fs::write(&path, vec![0u8; DATA_START_OFFSET + 13]).unwrap();
        let err = ShardFile::open(&path, RecordLayout::Compact).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_open_empty_shard() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.hst");
        write_shard(&path, "empty", RecordLayout::Compact, &[]);
        let err = ShardFile::open(&path, RecordLayout::Compact).unwrap_err();
        assert!(err.is_empty_shard());
    }

    #[test]
    fn test_query_exact_groups_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dups.hst");
        write_shard(
            &path,
            "dups",
            RecordLayout::Compact,
            &[(4000, 0.5, 0), (5000, 1.0, 0), (5000, 2.0, 0), (5000, 3.0, 0)],
        );

        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        let result = shard.query(5000);
        let exact = result.exact().unwrap();
        assert_eq!(exact.len(), 3);
        let values: Vec<f64> = exact.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_query_neighbors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("neighbors.hst");
        write_shard(
            &path,
            "neighbors",
            RecordLayout::Extended,
            &[(1000, 20.0, 0), (2000, 30.0, 0)],
        );

        let shard = ShardFile::open(&path, RecordLayout::Extended).unwrap();
        match shard.query(1500) {
            TimestampSearch::Neighbors { before, after } => {
                assert_eq!(before.len(), 1);
                assert_eq!(before[0].timestamp, 1000);
                assert_eq!(after.len(), 1);
                assert_eq!(after[0].timestamp, 2000);
            }
            other => panic!("expected neighbors, got {:?}", other),
        }

        // Before the series start: only an after group
        match shard.query(500) {
            TimestampSearch::Neighbors { before, after } => {
                assert!(before.is_empty());
                assert_eq!(after[0].timestamp, 1000);
            }
            other => panic!("expected neighbors, got {:?}", other),
        }

        // Past the series end: only a before group
        match shard.query(9000) {
            TimestampSearch::Neighbors { before, after } => {
                assert_eq!(before[0].timestamp, 2000);
                assert!(after.is_empty());
            }
            other => panic!("expected neighbors, got {:?}", other),
        }
    }

    #[test]
    fn test_first_last_timestamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("range.hst");
        write_shard(
            &path,
            "range",
            RecordLayout::Compact,
            &[(100, 0.0, 0), (200, 0.0, 0), (300, 0.0, 0)],
        );
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        assert_eq!(shard.first_timestamp(), 100);
        assert_eq!(shard.last_timestamp(), 300);
    }

    #[test]
    fn test_groups_cursor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("groups.hst");
        write_shard(
            &path,
            "groups",
            RecordLayout::Compact,
            &[(10, 1.0, 0), (20, 2.0, 0), (20, 3.0, 0), (30, 4.0, 0)],
        );
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();

        let groups: Vec<(i64, usize)> = shard.groups().map(|(ts, g)| (ts, g.len())).collect();
        assert_eq!(groups, vec![(10, 1), (20, 2), (30, 1)]);

        // Restart by re-creating the cursor, not by rewinding
        let first_again: Vec<i64> = shard.groups().map(|(ts, _)| ts).collect();
        assert_eq!(first_again, vec![10, 20, 30]);
    }

    #[test]
    fn test_groups_between() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bounded.hst");
        write_shard(
            &path,
            "bounded",
            RecordLayout::Compact,
            &[(10, 1.0, 0), (20, 2.0, 0), (30, 3.0, 0), (40, 4.0, 0)],
        );
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();

        let ts: Vec<i64> = shard
            .groups_between(Some(15), Some(30))
            .map(|(t, _)| t)
            .collect();
        assert_eq!(ts, vec![20, 30]);

        let ts: Vec<i64> = shard.groups_between(None, Some(25)).map(|(t, _)| t).collect();
        assert_eq!(ts, vec![10, 20]);
    }

    #[test]
    fn test_check_monotonic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("order.hst");
        write_shard(
            &path,
            "order",
            RecordLayout::Compact,
            &[(10, 1.0, 0), (10, 2.0, 0), (20, 3.0, 0)],
        );
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        assert!(shard.check_monotonic().is_ok());

        let path = dir.path().join("disorder.hst");
        write_shard(
            &path,
            "disorder",
            RecordLayout::Compact,
            &[(20, 1.0, 0), (10, 2.0, 0)],
        );
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        assert!(shard.check_monotonic().unwrap_err().is_format());
    }

    #[test]
    fn test_long_signal_name_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.hst");
        let long_name = "x".repeat(SIGNAL_NAME_LEN + 20);
        write_shard(&path, &long_name, RecordLayout::Compact, &[(1, 0.0, 0)]);
        let shard = ShardFile::open(&path, RecordLayout::Compact).unwrap();
        assert_eq!(shard.signal().len(), SIGNAL_NAME_LEN);
    }
}
