//! Content-addressed-ish storage for paste blobs.
//!
//! Each paste is written to a file named
//! `<expires_at_|created_at_><timestamp>_sha1_<8 hex>_rand_<8 alnum>` -
//! the timestamp and hash pin the name to this particular put, and the
//! random suffix guarantees two puts of identical content at the same
//! timestamp never collide on one file. Collapsing onto a shared filename
//! (as a bare content hash would) is unsafe here: the expiry sweep deletes
//! a paste's blob the moment its map entry ages out, which would destroy
//! a file still referenced by another live entry of identical content. A
//! successfully written file is marked with the
//! `user.1f604_fileserver.can_be_served` extended attribute so an
//! out-of-process file server can tell a fully-written paste apart from
//! one still being streamed in.

use crate::error::{GetError, PutError};
use rand::{rngs::OsRng, Rng};
use sha1::{Digest, Sha1};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

const CAN_BE_SERVED_XATTR: &str = "user.1f604_fileserver.can_be_served";
const CREATE_RETRY_ATTEMPTS: usize = 10;
const RAND_SUFFIX_LEN: usize = 8;
const RAND_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Which instant a blob's filename is stamped with - expiring entries use
/// their expiry, permanent entries use their creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobTimestampKind {
    ExpiresAt,
    CreatedAt,
}

impl BlobTimestampKind {
    fn prefix(self) -> &'static str {
        match self {
            BlobTimestampKind::ExpiresAt => "expires_at_",
            BlobTimestampKind::CreatedAt => "created_at_",
        }
    }
}

pub struct PasteStore {
    dir: PathBuf,
}

/// Hex-encoded SHA-1 digest of `bytes`.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn random_suffix() -> String {
    let mut rng = OsRng;
    (0..RAND_SUFFIX_LEN).map(|_| RAND_ALPHABET[rng.gen_range(0..RAND_ALPHABET.len())] as char).collect()
}

fn blob_filename(kind: BlobTimestampKind, timestamp: i64, hash: &str, rand_suffix: &str) -> String {
    format!("{}{timestamp}_sha1_{}_rand_{rand_suffix}", kind.prefix(), &hash[..8])
}

impl PasteStore {
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    /// Writes `bytes` under a freshly generated filename, returning it.
    /// The filename is stamped with `timestamp` (an expiry or a creation
    /// time, per `timestamp_kind`) and the content's SHA-1 hash, with a
    /// random suffix distinguishing otherwise-identical puts. On a
    /// filename collision only the random suffix is regenerated and the
    /// write retried; exhausting all retries is treated as fatal, since a
    /// real collision this persistent indicates a broken RNG rather than
    /// ordinary bad luck.
    pub fn put(&self, bytes: &[u8], timestamp: i64, timestamp_kind: BlobTimestampKind) -> Result<String, PutError> {
        let hash = content_hash(bytes);

        for _attempt in 0..CREATE_RETRY_ATTEMPTS {
            let suffix = random_suffix();
            let id = blob_filename(timestamp_kind, timestamp, &hash, &suffix);
            let path = self.path_for(&id);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    file.sync_all()?;
                    if let Err(e) = xattr::set(&path, CAN_BE_SERVED_XATTR, b"true") {
                        tracing::warn!(id = %id, error = %e, "failed to set can-be-served xattr on paste blob");
                    }
                    return Ok(id);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(PutError::Io(e)),
            }
        }
        panic!(
            "paste_store: failed to allocate a unique blob filename after {CREATE_RETRY_ATTEMPTS} attempts; \
             this should never happen with a working RNG"
        );
    }

    pub fn get(&self, id: &str) -> Result<Vec<u8>, GetError> {
        fs::read(self.path_for(id)).map_err(|_| GetError::NonExistentKey)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.path_for(id).exists()
    }

    /// Removes a paste's blob. Used when its map entry expires. Missing
    /// files are not an error - the expiry sweep is idempotent.
    pub fn delete(&self, id: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
