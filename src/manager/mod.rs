//! Public façades over the storage primitives.
//!
//! Lock order, enforced by construction: a manager's own `put_lock` is
//! always acquired first and held for the whole atomic put sequence
//! (allocate id -> optionally write paste blob -> append log -> insert
//! into map -> update size hint). The background sweeper never touches
//! `put_lock` at all - it only ever acquires the map's own lock (via
//! `remove_all_expired`), then the paste store's and log's own locks to
//! clean up what the map handed back. Nothing ever acquires locks in the
//! reverse order, so there is no deadlock cycle to reason about.

pub mod expiring;
pub mod permanent;
