// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Binary framing for WAL records.
//!
//! ```text
//! length:u32 | sequence:u64 | op:u8 | key_len:u32 | key_bytes |
//! value_len:u32 | value_bytes | checksum:u32
//! ```
//!
//! All integers are little-endian. `length` covers everything after
//! itself up to and including `checksum`. `checksum` is CRC32-IEEE over
//! `sequence || op || key_bytes || value_bytes` — the `length`, `key_len`
//! and `value_len` fields are themselves not checksummed.

use std::io::{self, Read};

/// The mutation a WAL record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalOp {
    Insert = 1,
    Delete = 2,
    Clear = 3,
}

impl WalOp {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Insert),
            2 => Some(Self::Delete),
            3 => Some(Self::Clear),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single decoded WAL record.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub sequence: u64,
    pub op: WalOp,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

fn checksum_of(sequence: u64, op: u8, key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&sequence.to_le_bytes());
    hasher.update(&[op]);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Encode one framed record, ready to be appended to the log file.
pub fn encode(sequence: u64, op: WalOp, key: &[u8], value: &[u8]) -> Vec<u8> {
    let op_byte = op.as_byte();
    let mut body = Vec::with_capacity(8 + 1 + 4 + key.len() + 4 + value.len() + 4);
    body.extend_from_slice(&sequence.to_le_bytes());
    body.push(op_byte);
    body.extend_from_slice(&(key.len() as u32).to_le_bytes());
    body.extend_from_slice(key);
    body.extend_from_slice(&(value.len() as u32).to_le_bytes());
    body.extend_from_slice(value);
    let checksum = checksum_of(sequence, op_byte, key, value);
    body.extend_from_slice(&checksum.to_le_bytes());

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);
    framed
}

/// Outcome of decoding one record from a stream positioned right after the
/// file header (or after a previously decoded record).
pub enum DecodeOutcome {
    /// A valid, checksummed record. `consumed` is the number of bytes read
    /// from the stream for this record, length prefix included.
    Record { record: WalRecord, consumed: u64 },
    /// Clean end of file: no more bytes follow.
    Eof,
    /// A malformed or checksum-failing record. Per the replay contract,
    /// this is never an error — the caller stops here and treats
    /// everything already consumed as the valid prefix.
    Corrupt,
}

/// Decode exactly one framed record from `reader`.
pub fn decode_one(reader: &mut impl Read) -> io::Result<DecodeOutcome> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(DecodeOutcome::Eof),
        Err(e) => return Err(e),
    }
    let length = u32::from_le_bytes(len_buf) as usize;

    const MIN_BODY: usize = 8 + 1 + 4 + 4 + 4;
    if length < MIN_BODY {
        return Ok(DecodeOutcome::Corrupt);
    }

    let mut body = vec![0u8; length];
    if reader.read_exact(&mut body).is_err() {
        return Ok(DecodeOutcome::Corrupt);
    }

    let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
    let op_byte = body[8];
    let key_len = u32::from_le_bytes(body[9..13].try_into().unwrap()) as usize;

    if body.len() < 13 + key_len + 4 {
        return Ok(DecodeOutcome::Corrupt);
    }
    let key = body[13..13 + key_len].to_vec();

    let value_len_offset = 13 + key_len;
    let value_len =
        u32::from_le_bytes(body[value_len_offset..value_len_offset + 4].try_into().unwrap())
            as usize;
    let value_offset = value_len_offset + 4;

    if body.len() != value_offset + value_len + 4 {
        return Ok(DecodeOutcome::Corrupt);
    }
    let value = body[value_offset..value_offset + value_len].to_vec();

    let checksum_offset = value_offset + value_len;
    let stored_checksum =
        u32::from_le_bytes(body[checksum_offset..checksum_offset + 4].try_into().unwrap());

    let Some(op) = WalOp::from_byte(op_byte) else {
        return Ok(DecodeOutcome::Corrupt);
    };

    let computed_checksum = checksum_of(sequence, op_byte, &key, &value);
    if computed_checksum != stored_checksum {
        return Ok(DecodeOutcome::Corrupt);
    }

    Ok(DecodeOutcome::Record {
        record: WalRecord { sequence, op, key, value },
        consumed: 4 + length as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_well_formed_record() {
        let frame = encode(7, WalOp::Insert, b"k", b"v");
        let mut cursor = Cursor::new(frame);
        match decode_one(&mut cursor).unwrap() {
            DecodeOutcome::Record { record, .. } => {
                assert_eq!(record.sequence, 7);
                assert_eq!(record.op, WalOp::Insert);
                assert_eq!(record.key, b"k");
                assert_eq!(record.value, b"v");
            }
            _ => panic!("expected a record"),
        }
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(matches!(decode_one(&mut cursor).unwrap(), DecodeOutcome::Eof));
    }

    #[test]
    fn truncated_record_is_corrupt_not_an_error() {
        let mut frame = encode(1, WalOp::Delete, b"key", b"");
        frame.truncate(frame.len() - 3);
        let mut cursor = Cursor::new(frame);
        assert!(matches!(decode_one(&mut cursor).unwrap(), DecodeOutcome::Corrupt));
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut frame = encode(1, WalOp::Insert, b"key", b"value");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        let mut cursor = Cursor::new(frame);
        assert!(matches!(decode_one(&mut cursor).unwrap(), DecodeOutcome::Corrupt));
    }

    #[test]
    fn clear_record_has_empty_key_and_value() {
        let frame = encode(3, WalOp::Clear, b"", b"");
        let mut cursor = Cursor::new(frame);
        match decode_one(&mut cursor).unwrap() {
            DecodeOutcome::Record { record, .. } => {
                assert_eq!(record.op, WalOp::Clear);
                assert!(record.key.is_empty());
                assert!(record.value.is_empty());
            }
            _ => panic!("expected a record"),
        }
    }
}
