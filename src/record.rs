//! The on-disk record format shared by both log flavors.
//!
//! A record is exactly:
//!
//! ```text
//! key '\t' value '\t' timestamp 0x1E base64(md5(key '\t' value '\t' timestamp)) '\n'
//! ```
//!
//! TAB (0x09), RS (0x1E), and LF (0x0A) are the three load-bearing
//! delimiter bytes; none of them may appear inside `key` or `value`. The
//! checksum covers exactly the bytes before the RS byte, and is compared
//! byte-for-byte on decode - this is what lets recovery detect a torn or
//! bit-flipped write and abort instead of silently loading garbage.

use crate::error::RecordError;
use base64::{engine::general_purpose::STANDARD, Engine};

const TAB: u8 = 0x09;
const RS: u8 = 0x1E;
const LF: u8 = 0x0A;

fn contains_forbidden_byte(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| b == TAB || b == RS || b == LF)
}

fn checksum_of(fields: &[u8]) -> String {
    let digest = md5::compute(fields);
    STANDARD.encode(digest.0)
}

/// Encodes a record. Returns an error if `key` or `value` contain a
/// forbidden delimiter byte.
pub fn encode(key: &str, value: &str, timestamp: i64) -> Result<Vec<u8>, RecordError> {
    if contains_forbidden_byte(key.as_bytes()) {
        return Err(RecordError::IllegalKeyByte);
    }
    if contains_forbidden_byte(value.as_bytes()) {
        return Err(RecordError::IllegalValueByte);
    }
    let timestamp_str = timestamp.to_string();

    let mut fields = Vec::with_capacity(key.len() + value.len() + timestamp_str.len() + 2);
    fields.extend_from_slice(key.as_bytes());
    fields.push(TAB);
    fields.extend_from_slice(value.as_bytes());
    fields.push(TAB);
    fields.extend_from_slice(timestamp_str.as_bytes());

    let checksum = checksum_of(&fields);

    let mut record = Vec::with_capacity(fields.len() + 1 + checksum.len() + 1);
    record.extend_from_slice(&fields);
    record.push(RS);
    record.extend_from_slice(checksum.as_bytes());
    record.push(LF);
    Ok(record)
}

/// A successfully decoded and checksum-verified record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
    pub timestamp: i64,
}

/// Decodes and verifies a single record, including its trailing newline.
pub fn decode(bytes: &[u8]) -> Result<Record, RecordError> {
    if bytes.last() != Some(&LF) {
        return Err(RecordError::MissingTrailingNewline);
    }
    let without_newline = &bytes[..bytes.len() - 1];

    let rs_pos = without_newline
        .iter()
        .position(|&b| b == RS)
        .ok_or(RecordError::MissingSeparator)?;
    let fields = &without_newline[..rs_pos];
    let stored_checksum = String::from_utf8_lossy(&without_newline[rs_pos + 1..]).into_owned();

    let recomputed = checksum_of(fields);
    if recomputed != stored_checksum {
        return Err(RecordError::ChecksumMismatch { stored: stored_checksum, recomputed });
    }

    let field_strs: Vec<&str> = std::str::from_utf8(fields)
        .map_err(|_| RecordError::MalformedFields(0))?
        .splitn(3, '\t')
        .collect();
    if field_strs.len() != 3 {
        return Err(RecordError::MalformedFields(field_strs.len()));
    }
    // splitn(3, ...) would silently absorb a 4th tab-separated field into
    // the timestamp; guard against that explicitly.
    if field_strs[2].contains('\t') {
        return Err(RecordError::MalformedFields(4));
    }

    let timestamp = field_strs[2]
        .parse::<i64>()
        .map_err(|_| RecordError::InvalidTimestampFormat(field_strs[2].to_string()))?;

    Ok(Record { key: field_strs[0].to_string(), value: field_strs[1].to_string(), timestamp })
}

/// Splits a whole log file's bytes into individual records and decodes
/// each independently. A trailing partial record (no closing newline,
/// e.g. from a crash mid-write) decodes to `Err(MissingTrailingNewline)`
/// rather than being silently dropped.
pub fn decode_all(bytes: &[u8]) -> Vec<Result<Record, RecordError>> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 0..bytes.len() {
        if bytes[i] == LF {
            out.push(decode(&bytes[start..=i]));
            start = i + 1;
        }
    }
    if start < bytes.len() {
        out.push(decode(&bytes[start..]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let bytes = encode("abc", "https://example.com", 1_700_000_000).unwrap();
        let record = decode(&bytes).unwrap();
        assert_eq!(record.key, "abc");
        assert_eq!(record.value, "https://example.com");
        assert_eq!(record.timestamp, 1_700_000_000);
    }

    #[test]
    fn encode_rejects_tab_in_key() {
        assert_eq!(encode("a\tb", "v", 1).unwrap_err(), RecordError::IllegalKeyByte);
    }

    #[test]
    fn encode_rejects_newline_in_value() {
        assert_eq!(encode("k", "v\nalue", 1).unwrap_err(), RecordError::IllegalValueByte);
    }

    #[test]
    fn decode_rejects_missing_trailing_newline() {
        let mut bytes = encode("k", "v", 1).unwrap();
        bytes.pop();
        assert_eq!(decode(&bytes).unwrap_err(), RecordError::MissingTrailingNewline);
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut bytes = encode("k", "v", 1).unwrap();
        let last_content_idx = bytes.len() - 2;
        bytes[last_content_idx] = if bytes[last_content_idx] == b'A' { b'B' } else { b'A' };
        assert!(matches!(decode(&bytes), Err(RecordError::ChecksumMismatch { .. })));
    }

    #[test]
    fn decode_rejects_bit_flip_in_fields() {
        let mut bytes = encode("key", "value", 1_700_000_000).unwrap();
        bytes[1] ^= 0x01; // flip a bit inside "key"
        assert!(matches!(decode(&bytes), Err(RecordError::ChecksumMismatch { .. })));
    }

    #[test]
    fn decode_rejects_non_integer_timestamp() {
        let encoded = b"k\tv\tNaN\x1e".to_vec();
        let mut bytes = encoded;
        let checksum = checksum_of(b"k\tv\tNaN");
        bytes.truncate(b"k\tv\tNaN\x1e".len());
        bytes.extend_from_slice(checksum.as_bytes());
        bytes.push(b'\n');
        assert!(matches!(decode(&bytes), Err(RecordError::InvalidTimestampFormat(_))));
    }

    #[test]
    fn value_may_contain_spaces_and_punctuation() {
        let bytes = encode("k", "hello, world! 123 / ? =", 42).unwrap();
        let record = decode(&bytes).unwrap();
        assert_eq!(record.value, "hello, world! 123 / ? =");
    }

    #[test]
    fn decode_all_splits_concatenated_records() {
        let mut bytes = encode("a", "1", 1).unwrap();
        bytes.extend(encode("b", "2", 2).unwrap());
        let decoded = decode_all(&bytes);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().unwrap().key, "a");
        assert_eq!(decoded[1].as_ref().unwrap().key, "b");
    }

    #[test]
    fn decode_all_flags_truncated_trailing_record() {
        let mut bytes = encode("a", "1", 1).unwrap();
        let mut partial = encode("b", "2", 2).unwrap();
        partial.pop();
        bytes.extend(partial);
        let decoded = decode_all(&bytes);
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_ok());
        assert_eq!(decoded[1].as_ref().unwrap_err(), &RecordError::MissingTrailingNewline);
    }
}
