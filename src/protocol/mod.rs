//! HTTP/1.1 protocol pipeline.
//!
//! # Data Flow
//! ```text
//! factory.rs (one per requester, shared)
//!     → create(route, io): hyper HTTP/1.1 handshake, spawn connection task
//!     → handler.rs (one per connection)
//!         request:  origin-form URI → processor.rs interceptors
//!                   → content_length.rs (request framing check) → hyper writer
//!         response: hyper parser → content_length.rs (response framing)
//!                   → reuse.rs (keep-alive decision) → processor.rs
//! ```
//!
//! # Design Decisions
//! - The factory holds only immutable, shared strategy objects
//! - All per-connection state lives in the handler
//! - Bodies are fully buffered so the connection is reusable once an exchange returns

pub mod content_length;
pub mod factory;
pub mod handler;
pub mod processor;
pub mod reuse;

use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode, Uri, Version};
use thiserror::Error;

pub use content_length::{ContentLength, ContentLengthStrategy, DefaultContentLengthStrategy};
pub use factory::ClientHttp1HandlerFactory;
pub use handler::{ClientHttp1Handler, Exchange};
pub use processor::{
    ExchangeContext, HttpProcessor, InterceptorChain, RequestConnControl, RequestContent,
    RequestInterceptor, RequestTargetHost, RequestUserAgent, ResponseInterceptor,
};
pub use reuse::{keep_alive_timeout, ConnectionReuseStrategy, DefaultConnectionReuseStrategy};

/// Framing and header violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid Content-Length header: {0}")]
    InvalidContentLength(String),

    #[error("multiple Content-Length headers")]
    MultipleContentLength,

    #[error("unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),

    #[error("Content-Length {declared} does not match body length {actual}")]
    ContentLengthMismatch { declared: u64, actual: u64 },

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("invalid request target: {0}")]
    InvalidTarget(String),
}

/// Snapshot of a request head as written to the wire.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }
}

/// Snapshot of a response head as parsed from the wire.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
}
