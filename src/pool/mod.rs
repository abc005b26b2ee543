//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! execute(request)
//!     → route.rs (scheme + host + port → Route)
//!     → strict.rs lease(route, timeout)
//!         - idle, non-expired entry for route → reuse
//!         - below per-route AND global capacity → new unconnected entry
//!         - global full, other route idle → evict LRU idle, new entry
//!         - otherwise wait for release/eviction until timeout
//!     → caller connects if entry.rs has no connection
//!     → lease.rs LeaseGuard holds the entry across the exchange
//!     → strict.rs release(entry, reusable); a dropped guard releases as non-reusable
//!         - reusable + connected + not expired → idle set
//!         - otherwise dropped, capacity freed
//! ```
//!
//! # Design Decisions
//! - One mutex for all counts so both capacity bounds hold under any interleaving
//! - Entries count against capacity while unconnected (connect happens outside the lock)
//! - Expiry is checked on lease, on release and by periodic `close_expired`

pub mod entry;
pub mod lease;
pub mod route;
pub mod stats;
pub mod strict;

pub use entry::PoolEntry;
pub use lease::LeaseGuard;
pub use route::{Route, RouteError, Scheme};
pub use stats::{PoolStats, RouteStats};
pub use strict::StrictConnPool;
