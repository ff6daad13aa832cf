//! Shared fixtures: the record encoder and shard file writer
//!
//! The engine itself is read-only and ships no encoder; round-trip tests
//! and on-disk fixtures are produced here instead.

#![allow(dead_code)]

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use trendstore::shard::{DATA_START_OFFSET, SIGNAL_NAME_LEN};
use trendstore::{Record, RecordLayout};

/// Encode one record into its on-disk form
pub fn encode_record(layout: RecordLayout, record: &Record) -> Vec<u8> {
    let mut buf = vec![0u8; layout.record_size()];
    LittleEndian::write_u32(&mut buf[0..4], record.timestamp as u32);
    match layout {
        RecordLayout::Compact => {
            LittleEndian::write_f32(&mut buf[4..8], record.value as f32);
            LittleEndian::write_u32(&mut buf[8..12], record.status);
        }
        RecordLayout::Extended => {
            LittleEndian::write_u32(&mut buf[8..12], record.status);
            LittleEndian::write_f64(&mut buf[16..24], record.value);
        }
    }
    buf
}

/// Encode the fixed shard header: NUL-padded signal name plus padding to
/// the data-start offset
pub fn encode_header(signal: &str) -> Vec<u8> {
    let mut header = vec![0u8; DATA_START_OFFSET];
    let name = signal.as_bytes();
    let len = name.len().min(SIGNAL_NAME_LEN);
    header[..len].copy_from_slice(&name[..len]);
    header
}

/// Write a complete shard file
pub fn write_shard(path: &Path, signal: &str, layout: RecordLayout, records: &[Record]) {
    let mut data = encode_header(signal);
    for record in records {
        data.extend_from_slice(&encode_record(layout, record));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}

/// Records from `(timestamp, value, status)` triples
pub fn records(triples: &[(i64, f64, u32)]) -> Vec<Record> {
    triples
        .iter()
        .map(|&(ts, value, status)| Record::new(ts, value, status))
        .collect()
}
