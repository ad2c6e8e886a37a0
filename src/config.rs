//! Tunables and construction-time validation for both store flavors.
//!
//! Mirrors the teacher's `CrabKvBuilder`: plain builder structs with
//! `with_*` setters and a `build()` that validates before handing back a
//! usable config. There is no external (JSON/file-based) config loader -
//! that collaborator is explicitly out of scope.

use crate::error::ConfigError;
use std::path::PathBuf;

/// 2023-01-01T00:00:00Z. Timestamps older than this are almost certainly
/// corruption (a record with a zeroed or garbage timestamp field), not a
/// legitimately old entry - the store didn't exist yet.
pub const DEFAULT_TIMESTAMP_FLOOR_UNIX: i64 = 1_672_531_200;

/// ~year 20000. Timestamps past this are equally implausible and indicate
/// a clock or corruption error, not a legitimately far-future expiry.
pub const DEFAULT_TIMESTAMP_CEILING_UNIX: i64 = 568_971_820_800;

const DEFAULT_GENERATE_STRINGS_UP_TO: usize = 4;
const DEFAULT_BUCKET_INTERVAL_SECS: i64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_LOG_FILE_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_SIZE_HINT_STEP: u64 = 1000;

/// Extra seconds a logically-expired entry is retained in RAM before the
/// sweeper actually removes it - the window during which `get` returns
/// `KeyExpired` instead of `NonExistentKey`.
const DEFAULT_GRACE_RAM_SECS: i64 = 30;

/// Extra seconds a bucket file is retained on disk past its ceiling,
/// giving recovery a safety margin against a crash that lands between the
/// RAM sweep and the disk sweep.
const DEFAULT_GRACE_DISK_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct ExpiringConfig {
    pub data_dir: PathBuf,
    pub bucket_interval_secs: i64,
    pub sweep_interval_secs: u64,
    pub generate_strings_up_to: usize,
    pub timestamp_floor_unix: i64,
    pub timestamp_ceiling_unix: i64,
    pub grace_ram_secs: i64,
    pub grace_disk_secs: i64,
    pub size_hint_step: u64,
}

pub struct ExpiringConfigBuilder {
    data_dir: PathBuf,
    bucket_interval_secs: i64,
    sweep_interval_secs: u64,
    generate_strings_up_to: usize,
    timestamp_floor_unix: i64,
    timestamp_ceiling_unix: i64,
    grace_ram_secs: i64,
    grace_disk_secs: i64,
    size_hint_step: u64,
}

impl ExpiringConfigBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bucket_interval_secs: DEFAULT_BUCKET_INTERVAL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            generate_strings_up_to: DEFAULT_GENERATE_STRINGS_UP_TO,
            timestamp_floor_unix: DEFAULT_TIMESTAMP_FLOOR_UNIX,
            timestamp_ceiling_unix: DEFAULT_TIMESTAMP_CEILING_UNIX,
            grace_ram_secs: DEFAULT_GRACE_RAM_SECS,
            grace_disk_secs: DEFAULT_GRACE_DISK_SECS,
            size_hint_step: DEFAULT_SIZE_HINT_STEP,
        }
    }

    pub fn with_bucket_interval_secs(mut self, secs: i64) -> Self {
        self.bucket_interval_secs = secs;
        self
    }

    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    pub fn with_generate_strings_up_to(mut self, n: usize) -> Self {
        self.generate_strings_up_to = n;
        self
    }

    pub fn with_timestamp_floor_unix(mut self, floor: i64) -> Self {
        self.timestamp_floor_unix = floor;
        self
    }

    pub fn with_timestamp_ceiling_unix(mut self, ceiling: i64) -> Self {
        self.timestamp_ceiling_unix = ceiling;
        self
    }

    pub fn with_grace_ram_secs(mut self, secs: i64) -> Self {
        self.grace_ram_secs = secs;
        self
    }

    pub fn with_grace_disk_secs(mut self, secs: i64) -> Self {
        self.grace_disk_secs = secs;
        self
    }

    pub fn with_size_hint_step(mut self, step: u64) -> Self {
        self.size_hint_step = step;
        self
    }

    pub fn build(self) -> Result<ExpiringConfig, ConfigError> {
        if self.bucket_interval_secs <= 0 {
            return Err(ConfigError::NonPositiveBucketInterval(self.bucket_interval_secs));
        }
        if self.generate_strings_up_to < 2 {
            return Err(ConfigError::GenerateStringsUpToTooSmall(self.generate_strings_up_to));
        }
        if self.size_hint_step == 0 {
            return Err(ConfigError::NonPositiveSizeHintStep(self.size_hint_step));
        }
        if self.grace_disk_secs <= 2 * (self.grace_ram_secs + 5) {
            return Err(ConfigError::GraceIntervalInvariantViolated {
                grace_ram: self.grace_ram_secs,
                grace_disk: self.grace_disk_secs,
            });
        }
        Ok(ExpiringConfig {
            data_dir: self.data_dir,
            bucket_interval_secs: self.bucket_interval_secs,
            sweep_interval_secs: self.sweep_interval_secs,
            generate_strings_up_to: self.generate_strings_up_to,
            timestamp_floor_unix: self.timestamp_floor_unix,
            timestamp_ceiling_unix: self.timestamp_ceiling_unix,
            grace_ram_secs: self.grace_ram_secs,
            grace_disk_secs: self.grace_disk_secs,
            size_hint_step: self.size_hint_step,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PermanentConfig {
    pub data_dir: PathBuf,
    pub max_log_file_bytes: u64,
    pub generate_strings_up_to: usize,
    pub timestamp_floor_unix: i64,
    pub timestamp_ceiling_unix: i64,
    pub size_hint_step: u64,
}

pub struct PermanentConfigBuilder {
    data_dir: PathBuf,
    max_log_file_bytes: u64,
    generate_strings_up_to: usize,
    timestamp_floor_unix: i64,
    timestamp_ceiling_unix: i64,
    size_hint_step: u64,
}

impl PermanentConfigBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_log_file_bytes: DEFAULT_MAX_LOG_FILE_BYTES,
            generate_strings_up_to: DEFAULT_GENERATE_STRINGS_UP_TO,
            timestamp_floor_unix: DEFAULT_TIMESTAMP_FLOOR_UNIX,
            timestamp_ceiling_unix: DEFAULT_TIMESTAMP_CEILING_UNIX,
            size_hint_step: DEFAULT_SIZE_HINT_STEP,
        }
    }

    pub fn with_max_log_file_bytes(mut self, bytes: u64) -> Self {
        self.max_log_file_bytes = bytes;
        self
    }

    pub fn with_generate_strings_up_to(mut self, n: usize) -> Self {
        self.generate_strings_up_to = n;
        self
    }

    pub fn with_timestamp_floor_unix(mut self, floor: i64) -> Self {
        self.timestamp_floor_unix = floor;
        self
    }

    pub fn with_timestamp_ceiling_unix(mut self, ceiling: i64) -> Self {
        self.timestamp_ceiling_unix = ceiling;
        self
    }

    pub fn with_size_hint_step(mut self, step: u64) -> Self {
        self.size_hint_step = step;
        self
    }

    pub fn build(self) -> Result<PermanentConfig, ConfigError> {
        if self.max_log_file_bytes == 0 {
            return Err(ConfigError::NonPositiveMaxLogFileBytes(self.max_log_file_bytes));
        }
        if self.generate_strings_up_to < 2 {
            return Err(ConfigError::GenerateStringsUpToTooSmall(self.generate_strings_up_to));
        }
        if self.size_hint_step == 0 {
            return Err(ConfigError::NonPositiveSizeHintStep(self.size_hint_step));
        }
        Ok(PermanentConfig {
            data_dir: self.data_dir,
            max_log_file_bytes: self.max_log_file_bytes,
            generate_strings_up_to: self.generate_strings_up_to,
            timestamp_floor_unix: self.timestamp_floor_unix,
            timestamp_ceiling_unix: self.timestamp_ceiling_unix,
            size_hint_step: self.size_hint_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expiring_config_builds() {
        let cfg = ExpiringConfigBuilder::new("/tmp/whatever").build().unwrap();
        assert_eq!(cfg.bucket_interval_secs, DEFAULT_BUCKET_INTERVAL_SECS);
    }

    #[test]
    fn rejects_grace_disk_not_exceeding_twice_grace_ram_plus_five() {
        let err = ExpiringConfigBuilder::new("/tmp/whatever")
            .with_grace_ram_secs(30)
            .with_grace_disk_secs(70)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::GraceIntervalInvariantViolated { .. }));
    }

    #[test]
    fn accepts_grace_disk_strictly_greater_than_twice_grace_ram_plus_five() {
        let cfg = ExpiringConfigBuilder::new("/tmp/whatever")
            .with_grace_ram_secs(30)
            .with_grace_disk_secs(71)
            .build()
            .unwrap();
        assert_eq!(cfg.grace_disk_secs, 71);
    }

    #[test]
    fn rejects_non_positive_bucket_interval() {
        let err = ExpiringConfigBuilder::new("/tmp/whatever").with_bucket_interval_secs(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveBucketInterval(0));
    }

    #[test]
    fn rejects_generate_strings_up_to_below_two() {
        let err = ExpiringConfigBuilder::new("/tmp/whatever").with_generate_strings_up_to(1).build().unwrap_err();
        assert_eq!(err, ConfigError::GenerateStringsUpToTooSmall(1));
    }

    #[test]
    fn rejects_zero_size_hint_step() {
        let err = ExpiringConfigBuilder::new("/tmp/whatever").with_size_hint_step(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveSizeHintStep(0));
    }

    #[test]
    fn default_permanent_config_builds() {
        let cfg = PermanentConfigBuilder::new("/tmp/whatever").build().unwrap();
        assert_eq!(cfg.max_log_file_bytes, DEFAULT_MAX_LOG_FILE_BYTES);
    }

    #[test]
    fn rejects_zero_max_log_file_bytes() {
        let err = PermanentConfigBuilder::new("/tmp/whatever").with_max_log_file_bytes(0).build().unwrap_err();
        assert_eq!(err, ConfigError::NonPositiveMaxLogFileBytes(0));
    }
}
