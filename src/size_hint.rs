//! Persists a hint for how large the in-memory map is expected to grow,
//! so the next startup can pre-allocate its hash map instead of
//! reallocating/rehashing repeatedly while recovery replays the log.
//!
//! The hint is monotonic: it only ever grows, is always kept a positive
//! multiple of a configured step `M`, and a new hint is computed as
//! `((observed + M/2) / M + 1) * M` using truncating integer division -
//! the same formula (and the same truncation, not a true ceiling) as the
//! store this crate's persistence layer is modeled on.

use parking_lot::Mutex;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

fn round_up_hint(observed: u64, step: u64) -> u64 {
    ((observed + step / 2) / step + 1) * step
}

pub struct SizeHint {
    path: PathBuf,
    step: u64,
    current: Mutex<u64>,
}

impl SizeHint {
    /// Opens the size-hint file, creating it with an initial value of
    /// `step` if missing. A pre-existing value that isn't a positive
    /// multiple of `step` is treated as corruption.
    pub fn open(path: impl AsRef<Path>, step: u64) -> io::Result<Self> {
        debug_assert!(step > 0, "size_hint_step must be positive, enforced at config build time");
        let path = path.as_ref().to_path_buf();
        let current = match fs::read_to_string(&path) {
            Ok(s) => {
                let value: u64 = s
                    .trim()
                    .parse()
                    .unwrap_or_else(|_| panic!("shortkv: size-hint file {path:?} does not contain an integer"));
                if value == 0 || value % step != 0 {
                    panic!(
                        "shortkv: size-hint file {path:?} holds {value}, which is not a positive multiple of step {step}"
                    );
                }
                value
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::write(&path, step.to_string())?;
                step
            }
            Err(e) => return Err(e),
        };
        Ok(Self { path, step, current: Mutex::new(current) })
    }

    pub fn current(&self) -> u64 {
        *self.current.lock()
    }

    /// Notes that the map now holds `observed_size` entries. Always
    /// recomputes the step-aligned hint for `observed_size`; persists and
    /// adopts it only if it exceeds the currently stored hint.
    pub fn record_observed_size(&self, observed_size: u64) -> io::Result<()> {
        let mut current = self.current.lock();
        let rounded = round_up_hint(observed_size, self.step);
        if rounded <= *current {
            return Ok(());
        }
        self.write_atomic(rounded)?;
        *current = rounded;
        Ok(())
    }

    fn write_atomic(&self, value: u64) -> io::Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, value.to_string())?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
