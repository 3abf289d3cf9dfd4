//! # Previously, on dbsync...
//!
//! 🎬 The bucket was in another region. The table was throttled. The tests
//! needed somewhere to live that didn't bill by the request.
//!
//! `in_mem` provides an in-memory [`ObjectStore`](super::ObjectStore) and
//! [`Table`](super::Table) for tests. The store pages through a sorted map and
//! counts every fetch. The table keeps rows in a map, remembers every bulk
//! call, and can be scripted to throttle or fail on cue.
//!
//! ⚠️ This is NOT for production. This is for tests.

mod in_mem_object_store;
mod in_mem_table;

pub(crate) use in_mem_object_store::InMemoryObjectStore;
pub(crate) use in_mem_table::{InMemoryTable, Scripted};
