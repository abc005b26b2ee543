//! Requester assembly and runtime.
//!
//! # Data Flow
//! ```text
//! RequesterBootstrap (bootstrap.rs)
//!     → resolve(config): capacities, TTL, warnings
//!     → unset strategies taken from StrategyDefaults (defaults.rs)
//!     → new StrictConnPool + ClientHttp1HandlerFactory
//!     → HttpAsyncRequester (async_requester.rs)
//!
//! HttpAsyncRequester::execute(request)
//!     → Route from URI → pool.lease_guarded(route, timeout)
//!     → reuse idle handler, or connect: TCP → TlsStrategy → factory.create
//!     → handler.execute → lease.release(keep_alive)
//!     → early return or cancellation: guard drop releases as non-reusable
//!     → on failure: exception listener (once) + error returned
//! ```
//!
//! # Design Decisions
//! - Assembly never fails; anomalies become logged warnings
//! - Strategy defaults are built once per bootstrap and shared by reference
//! - Each `create` builds a fresh pool; nothing mutable is shared

pub mod async_requester;
pub mod bootstrap;
pub mod defaults;

pub use async_requester::{CloseMode, HttpAsyncRequester, IoReactorStatus};
pub use bootstrap::RequesterBootstrap;
pub use defaults::StrategyDefaults;
