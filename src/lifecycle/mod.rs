//! Requester lifecycle.
//!
//! # Data Flow
//! ```text
//! start():
//!     Inactive → Active, spawn maintenance.rs task
//!
//! maintenance.rs (every select interval):
//!     pool.close_expired() until the shutdown signal fires
//!
//! shutdown(mode):
//!     Active → ShutDown, shutdown.rs trigger → maintenance task exits
//!     → pool.close() wakes all lease waiters with PoolError::Closed
//! ```
//!
//! # Design Decisions
//! - The signal is level-triggered: tasks subscribing after `trigger` still stop
//! - Shutdown is idempotent

pub mod maintenance;
pub mod shutdown;

pub use maintenance::spawn_pool_maintenance;
pub use shutdown::{Shutdown, ShutdownSignal};
