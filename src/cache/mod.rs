//! Response cache for intercepted requests.
//!
//! This module provides the offline layer of the client:
//! - Named, versioned generations of request -> response pairs, persisted in SQLite
//! - Network-first handling of API calls with write-through and offline fallback
//! - Cache-first handling of static assets with an offline document for navigations

mod policy;
mod storage;
mod traits;

pub use policy::{ActiveGeneration, FetchPolicy};
pub use storage::{CacheStorage, NoopStorage, Registration, SqliteStorage};
pub use traits::{CacheResult, CacheSource, CachedEntry, CachedResponse, RequestKey};
