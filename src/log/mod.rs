//! Append-only log storage: the durable half of each map.
//!
//! Two flavors share the record format in [`crate::record`] but differ in
//! how they age out old data:
//!
//! - [`bucketed`] groups expiring entries into files named by the ceiling
//!   of their expiry timestamp, so an entire bucket file can be unlinked
//!   in one syscall once every entry inside it has expired - no per-record
//!   compaction ever runs.
//! - [`rotating`] is a classic size-capped, monotonically-numbered log for
//!   permanent entries, which are never deleted by the store itself.

pub mod bucketed;
pub mod rotating;
