//! Size-capped, monotonically-numbered append log for permanent entries.
//!
//! Files are named `<n>.log` with `n` increasing from `0`. A write that
//! would push the current file past the configured size threshold instead
//! opens `<n+1>.log` and writes there. Permanent entries are never deleted
//! by this crate, so unlike [`super::bucketed`] there is no file-removal
//! path here at all - only rotation.

use crate::error::PutError;
use crate::record::{self, Record};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const FILENAME_SUFFIX: &str = ".log";

fn parse_log_number(name: &str) -> Option<i64> {
    name.strip_suffix(FILENAME_SUFFIX)?.parse().ok()
}

struct RotatingState {
    current_num: i64,
    writer: BufWriter<File>,
    current_size: u64,
}

pub struct PermanentRotatingLog {
    dir: PathBuf,
    max_size_bytes: u64,
    state: Mutex<RotatingState>,
}

impl PermanentRotatingLog {
    pub fn open(dir: impl AsRef<Path>, max_size_bytes: u64) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut latest_num = 0i64;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(n) = parse_log_number(&name.to_string_lossy()) {
                latest_num = latest_num.max(n);
            }
        }

        let path = dir.join(format!("{latest_num}{FILENAME_SUFFIX}"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            dir,
            max_size_bytes,
            state: Mutex::new(RotatingState { current_num: latest_num, writer: BufWriter::new(file), current_size }),
        })
    }

    pub fn append(&self, key: &str, value: &str, timestamp: i64) -> Result<(), PutError> {
        let encoded = record::encode(key, value, timestamp)?;
        let mut state = self.state.lock();

        if state.current_size > 0 && state.current_size + encoded.len() as u64 > self.max_size_bytes {
            state.writer.flush()?;
            let next_num = state.current_num + 1;
            let path = self.dir.join(format!("{next_num}{FILENAME_SUFFIX}"));
            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    panic!("rotating log: successor file {path:?} already exists; this indicates external tampering with the log directory")
                }
                Err(e) => return Err(e.into()),
            };
            state.current_num = next_num;
            state.writer = BufWriter::new(file);
            state.current_size = 0;
        }

        state.writer.write_all(&encoded)?;
        state.writer.flush()?;
        state.current_size += encoded.len() as u64;
        Ok(())
    }

    /// Lists every numbered log file, sorted oldest-first.
    pub fn list_files(&self) -> io::Result<Vec<(i64, PathBuf)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(n) = parse_log_number(&name.to_string_lossy()) {
                out.push((n, entry.path()));
            }
        }
        out.sort_by_key(|(n, _)| *n);
        Ok(out)
    }

    /// Reads and decodes every record across every numbered file, in
    /// chronological (ascending file number) order.
    pub fn read_all(&self) -> io::Result<Vec<Result<Record, crate::error::RecordError>>> {
        let mut out = Vec::new();
        for (_, path) in self.list_files()? {
            let bytes = fs::read(&path)?;
            out.extend(record::decode_all(&bytes));
        }
        Ok(out)
    }
}
