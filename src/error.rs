//! Error types for the requester.
//!
//! Each subsystem owns a narrow error enum; `RequesterError` is the one
//! callers of [`HttpAsyncRequester::execute`](crate::HttpAsyncRequester::execute)
//! see. Capacity exhaustion stays a distinct variant so callers can tell
//! "the pool is full" apart from "the peer is broken".

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::pool::Route;
use crate::pool::RouteError;
use crate::protocol::ProtocolError;

/// Errors returned by the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No capacity became available for the route before the lease timeout.
    #[error("connection pool exhausted for {route}: no capacity within {timeout:?}")]
    Exhausted { route: Route, timeout: Duration },

    /// The pool has been closed.
    #[error("connection pool is closed")]
    Closed,
}

/// Errors that can occur while executing an exchange.
#[derive(Debug, Error)]
pub enum RequesterError {
    /// Lease failed (capacity exhaustion or closed pool).
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Request target could not be mapped to a route.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// TCP connect failed.
    #[error("connect to {route} failed: {source}")]
    Connect {
        route: Route,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete in time.
    #[error("connect to {route} timed out after {timeout:?}")]
    ConnectTimeout { route: Route, timeout: Duration },

    /// TLS negotiation failed.
    #[error("TLS handshake with {route} failed: {source}")]
    Handshake {
        route: Route,
        #[source]
        source: io::Error,
    },

    /// Message violated HTTP framing or header rules.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Error raised by the HTTP/1.1 codec.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] hyper::Error),

    /// Response head and body did not arrive in time.
    #[error("response timed out after {0:?}")]
    ResponseTimeout(Duration),

    /// The requester was not started or has been shut down.
    #[error("requester is not running")]
    NotRunning,

    /// `start()` was called outside of a tokio runtime.
    #[error("no tokio runtime available to drive the requester")]
    NoRuntime,
}

impl RequesterError {
    /// True if the error is a lease timeout caused by a full pool.
    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(self, RequesterError::Pool(PoolError::Exhausted { .. }))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RequesterError::Pool(PoolError::Exhausted { .. }) => "pool_exhausted",
            RequesterError::Pool(PoolError::Closed) => "pool_closed",
            RequesterError::Route(_) => "route",
            RequesterError::Connect { .. } => "connect",
            RequesterError::ConnectTimeout { .. } => "connect_timeout",
            RequesterError::Handshake { .. } => "handshake",
            RequesterError::Protocol(_) => "protocol",
            RequesterError::Transport(_) => "transport",
            RequesterError::ResponseTimeout(_) => "response_timeout",
            RequesterError::NotRunning => "not_running",
            RequesterError::NoRuntime => "no_runtime",
        }
    }
}

/// Result type for requester operations.
pub type RequesterResult<T> = Result<T, RequesterError>;
