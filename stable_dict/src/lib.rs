//! [StableDict] is a hash map that remembers the order in which keys were first inserted:
//! iterators yield entries in that order, and removing an entry never disturbs the order of the
//! remaining ones.
//!
//! Updating the value of an existing key keeps its position. Removing a key and inserting it
//! again later counts as a fresh insertion, so the key reappears at the end of the order.
//!
//! The implementation pairs an append-only log of keys and values with an open-addressing index
//! table that maps key hashes to log positions. Removal only turns the entry's index marker into
//! a tombstone; the log itself is never compacted and log positions are never reused. This keeps
//! every surviving entry's position stable, at a memory cost: the storage of removed entries is
//! reclaimed only when the whole dictionary is dropped, cloned or consumed, and a workload that
//! keeps inserting and removing entries grows the table without bound. Cloning rebuilds the
//! dictionary compacted.
//!
//! This crate is similar to the `indexmap` crate used together with its `shift_remove` method,
//! with the opposite tradeoff: `shift_remove` pays O(n) per removal to keep entries contiguous,
//! while removal here is O(1) and the cost is deferred to iteration (which has to recover the
//! order of the surviving entries) and to memory.

mod entry_log;
mod index_table;
mod util;

pub use stable_dict::StableDict;

pub mod stable_dict;
