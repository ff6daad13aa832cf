//! Sample record layouts and decoding
//!
//! A trend shard stores packed, fixed-size sample records in one of two
//! little-endian layouts:
//!
//! ```text
//! Compact (12 bytes)                 Extended (24 bytes)
//! ┌──────────────┬────────┐          ┌──────────────┬────────┐
//! │ timestamp    │ u32 @0 │          │ timestamp    │ u32 @0 │
//! │ value        │ f32 @4 │          │ (reserved)   │ 4B  @4 │
//! │ status       │ u32 @8 │          │ status       │ u32 @8 │
//! └──────────────┴────────┘          │ (reserved)   │ 4B @12 │
//!                                    │ value        │ f64 @16│
//!                                    └──────────────┴────────┘
//! ```
//!
//! The layout is selected by the caller, never sniffed from file contents.
//! Decoding is driven by an explicit field schema interpreted by one generic
//! routine, so no reliance on native struct padding or alignment exists
//! anywhere in the crate.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One decoded trend sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Sample timestamp in whole seconds
    pub timestamp: i64,
    /// Sample value, widened to f64 regardless of on-disk width
    pub value: f64,
    /// 32-bit status flag mask
    pub status: u32,
}

impl Record {
    /// Create a new record
    pub fn new(timestamp: i64, value: f64, status: u32) -> Self {
        Self {
            timestamp,
            value,
            status,
        }
    }

    /// Key used to deduplicate records across shards.
    ///
    /// Value bits are compared raw so two NaN payloads from duplicated
    /// writes still collapse into one record.
    pub(crate) fn dedup_key(&self) -> (i64, u64, u32) {
        (self.timestamp, self.value.to_bits(), self.status)
    }
}

/// Numeric encoding of one field inside a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericKind {
    U32,
    F32,
    F64,
}

impl NumericKind {
    fn width(self) -> usize {
        match self {
            Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Location and encoding of one field inside a record.
///
/// The schema struct it lives in names the field; together they form the
/// explicit (name, offset, width, kind) table that replaces any byte-overlay
/// decoding.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    offset: usize,
    kind: NumericKind,
}

impl FieldSpec {
    /// Read the field from a buffer already known to hold a full record
    fn read(&self, buf: &[u8]) -> f64 {
        let end = self.offset + self.kind.width();
        let bytes = &buf[self.offset..end];
        match self.kind {
            NumericKind::U32 => LittleEndian::read_u32(bytes) as f64,
            NumericKind::F32 => LittleEndian::read_f32(bytes) as f64,
            NumericKind::F64 => LittleEndian::read_f64(bytes),
        }
    }
}

/// Field schema for one record layout
#[derive(Debug, Clone, Copy)]
struct LayoutSchema {
    record_size: usize,
    timestamp: FieldSpec,
    status: FieldSpec,
    value: FieldSpec,
}

const COMPACT_SCHEMA: LayoutSchema = LayoutSchema {
    record_size: 12,
    timestamp: FieldSpec {
        offset: 0,
        kind: NumericKind::U32,
    },
    value: FieldSpec {
        offset: 4,
        kind: NumericKind::F32,
    },
    status: FieldSpec {
        offset: 8,
        kind: NumericKind::U32,
    },
};

const EXTENDED_SCHEMA: LayoutSchema = LayoutSchema {
    record_size: 24,
    timestamp: FieldSpec {
        offset: 0,
        kind: NumericKind::U32,
    },
    status: FieldSpec {
        offset: 8,
        kind: NumericKind::U32,
    },
    value: FieldSpec {
        offset: 16,
        kind: NumericKind::F64,
    },
};

/// On-disk record layout selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordLayout {
    /// 12-byte records with an f32 value
    Compact,
    /// 24-byte records with reserved gaps and an f64 value
    Extended,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self::Compact
    }
}

impl std::fmt::Display for RecordLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

impl RecordLayout {
    /// Fixed size of one record in this layout
    pub fn record_size(&self) -> usize {
        self.schema().record_size
    }

    fn schema(&self) -> &'static LayoutSchema {
        match self {
            Self::Compact => &COMPACT_SCHEMA,
            Self::Extended => &EXTENDED_SCHEMA,
        }
    }

    /// Decode one record from the start of `buf`.
    ///
    /// Fails with a format error if `buf` is shorter than the layout's
    /// fixed record size. Extra trailing bytes are ignored.
    pub fn decode(&self, buf: &[u8]) -> Result<Record> {
        let schema = self.schema();
        if buf.len() < schema.record_size {
            return Err(Error::format(
                "record buffer",
                format!(
                    "{} bytes available, {} layout needs {}",
                    buf.len(),
                    self,
                    schema.record_size
                ),
            ));
        }

        let timestamp = schema.timestamp.read(buf) as i64;
        let status = schema.status.read(buf) as u32;
        let value = schema.value.read(buf);

        Ok(Record {
            timestamp,
            value,
            status,
        })
    }

    /// Read only the timestamp field from the start of `buf`.
    ///
    /// Used by the shard index bisection, which touches many records while
    /// needing nothing but their timestamps.
    pub(crate) fn decode_timestamp(&self, buf: &[u8]) -> i64 {
        self.schema().timestamp.read(buf) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_compact(timestamp: u32, value: f32, status: u32) -> [u8; 12] {
        let mut buf = [0u8; 12];
        LittleEndian::write_u32(&mut buf[0..4], timestamp);
        LittleEndian::write_f32(&mut buf[4..8], value);
        LittleEndian::write_u32(&mut buf[8..12], status);
        buf
    }

    fn encode_extended(timestamp: u32, value: f64, status: u32) -> [u8; 24] {
        let mut buf = [0u8; 24];
        LittleEndian::write_u32(&mut buf[0..4], timestamp);
        LittleEndian::write_u32(&mut buf[8..12], status);
        LittleEndian::write_f64(&mut buf[16..24], value);
        buf
    }

    #[test]
    fn test_decode_compact() {
        let buf = encode_compact(1000, 20.5, 0b10);
        let record = RecordLayout::Compact.decode(&buf).unwrap();
        assert_eq!(record.timestamp, 1000);
        assert_eq!(record.value, 20.5);
        assert_eq!(record.status, 0b10);
    }

    #[test]
    fn test_decode_extended() {
        let buf = encode_extended(86_400, -3.25, 0xFFFF_0000);
        let record = RecordLayout::Extended.decode(&buf).unwrap();
        assert_eq!(record.timestamp, 86_400);
        assert_eq!(record.value, -3.25);
        assert_eq!(record.status, 0xFFFF_0000);
    }

    #[test]
    fn test_decode_ignores_reserved_bytes() {
        let mut buf = encode_extended(500, 1.0, 7);
        // Garbage in the reserved gaps must not affect decoding
        buf[4..8].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        buf[12..16].copy_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE]);
        let record = RecordLayout::Extended.decode(&buf).unwrap();
        assert_eq!(record, Record::new(500, 1.0, 7));
    }

    #[test]
    fn test_decode_short_buffer() {
        let buf = [0u8; 11];
        let err = RecordLayout::Compact.decode(&buf).unwrap_err();
        assert!(err.is_format());

        let buf = [0u8; 23];
        let err = RecordLayout::Extended.decode(&buf).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_decode_timestamp_only() {
        let buf = encode_compact(12345, 9.0, 0);
        assert_eq!(RecordLayout::Compact.decode_timestamp(&buf), 12345);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(RecordLayout::Compact.record_size(), 12);
        assert_eq!(RecordLayout::Extended.record_size(), 24);
    }


    #[test]
    fn test_dedup_key_collapses_nan() {
        let a = Record::new(10, f64::NAN, 1);
        let b = Record::new(10, f64::NAN, 1);
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
