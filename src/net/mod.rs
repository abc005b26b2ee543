//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Leased entry without a connection
//!     → connector.rs (TCP connect, connect timeout, TCP_NODELAY)
//!     → tls.rs (TlsStrategy::upgrade, based on route scheme)
//!     → connection.rs (ConnectionId, open-connection tracking)
//!     → Hand off to protocol layer (handler factory)
//! ```
//!
//! # Design Decisions
//! - TLS strategy is chosen once at assembly, applied per connection
//! - Streams are type-erased so custom strategies can wrap anything
//! - Every connection carries an ID for logs and listeners

pub mod connection;
pub mod connector;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use tls::{AsyncIo, BasicClientTlsStrategy, BoxedIo, TlsStrategy};
