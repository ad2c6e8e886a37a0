//! Typed error surface for the store.
//!
//! Per the propagation policy: these are the only errors ever returned to
//! callers. Invariant violations and corruption are never wrapped in a
//! `Result` — they abort the process via `panic!` at the point of detection.

use thiserror::Error;

/// Errors raised while validating or generating a Base-53 identifier.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum Base53Error {
    #[error("Base-53 prefix is too short (1 character minimum)")]
    TooShort,
    #[error("Base-53 prefix is too long (50 characters maximum)")]
    TooLong,
    #[error("Base-53 string contains a character outside the legal alphabet")]
    IllegalCharacter,
    #[error("Base-53 string contains a forbidden digraph")]
    IllegalPair,
    #[error("Base-53 checksum does not match the supplied string")]
    ChecksumMismatch,
}

/// Errors raised by the paste-aware / expiring / permanent maps.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MapError {
    #[error("key already exists")]
    KeyAlreadyExists,
}

/// Errors raised by [`crate::random_bag::RandomBag64::pop_random`].
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[error("random bag is empty")]
pub struct RandomBagEmpty;

/// Errors surfaced by a `get`.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum GetError {
    #[error("key does not exist")]
    NonExistentKey,
    #[error("key expired at {expiry}")]
    KeyExpired { value: String, expiry: i64 },
}

/// Errors surfaced by a `put`.
#[derive(Debug, Error)]
pub enum PutError {
    #[error("requested length must be at least 2")]
    RequestedLengthTooSmall,
    #[error("requested expiry is already in the past")]
    AlreadyExpired,
    #[error("no short IDs left of the requested length")]
    NoShortIdsLeft,
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating a store's configuration.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ConfigError {
    #[error(
        "grace_disk_secs ({grace_disk}) must be > 2*(grace_ram_secs+5), where grace_ram_secs \
         is {grace_ram} - otherwise a bucket file could be deleted before a crash-recovery \
         window has elapsed, resurrecting stale entries on restart"
    )]
    GraceIntervalInvariantViolated { grace_ram: i64, grace_disk: i64 },
    #[error("bucket_interval_secs must be positive, got {0}")]
    NonPositiveBucketInterval(i64),
    #[error("generate_strings_up_to must be at least 2, got {0}")]
    GenerateStringsUpToTooSmall(usize),
    #[error("max_log_file_bytes must be positive, got {0}")]
    NonPositiveMaxLogFileBytes(u64),
    #[error("size_hint_step must be positive, got {0}")]
    NonPositiveSizeHintStep(u64),
}

/// Errors raised while encoding or decoding a log record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("key contains a forbidden byte (tab, newline, or record separator)")]
    IllegalKeyByte,
    #[error("value contains a forbidden byte (tab, newline, or record separator)")]
    IllegalValueByte,
    #[error("timestamp contains a forbidden byte")]
    IllegalTimestampByte,
    #[error("record did not contain exactly 3 tab-separated fields, got {0}")]
    MalformedFields(usize),
    #[error("record is missing its record-separator byte before the checksum")]
    MissingSeparator,
    #[error("timestamp field {0:?} is not a valid integer")]
    InvalidTimestampFormat(String),
    #[error("checksum mismatch in log record: stored {stored}, recomputed {recomputed}")]
    ChecksumMismatch { stored: String, recomputed: String },
    #[error("log record is missing its trailing newline (truncated file)")]
    MissingTrailingNewline,
    #[error("timestamp {0} is outside the sanity window")]
    TimestampOutOfRange(i64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
