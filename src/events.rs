//! Lifecycle listeners.
//!
//! Callbacks run synchronously on the task that raised the event, so they
//! must not block. For anything heavier than a counter bump, register a
//! [`ChannelListener`] and drain its receiver on a separate task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hyper::{Method, StatusCode, Uri};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::RequesterError;
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::pool::{PoolStats, Route};
use crate::protocol::{RequestHead, ResponseHead};

/// Observes runtime failures. Invoked at most once per failed operation.
pub trait ExceptionListener: Send + Sync {
    fn on_error(&self, route: Option<&Route>, error: &RequesterError);
}

impl<F> ExceptionListener for F
where
    F: Fn(Option<&Route>, &RequesterError) + Send + Sync,
{
    fn on_error(&self, route: Option<&Route>, error: &RequesterError) {
        self(route, error)
    }
}

/// Observes connections opening and closing.
pub trait ConnectionListener: Send + Sync {
    fn on_connected(&self, _id: ConnectionId, _route: &Route) {}

    fn on_disconnected(&self, _id: ConnectionId, _route: &Route) {}
}

/// Observes individual request/response exchanges on a connection.
pub trait StreamListener: Send + Sync {
    fn on_request_head(&self, _id: ConnectionId, _head: &RequestHead) {}

    fn on_response_head(&self, _id: ConnectionId, _head: &ResponseHead) {}

    fn on_exchange_complete(&self, _id: ConnectionId, _keep_alive: bool) {}
}

/// Observes pool leases and releases.
pub trait PoolListener: Send + Sync {
    fn on_lease(&self, _route: &Route, _stats: &PoolStats) {}

    /// `reused` is true when the entry went back to the idle set.
    fn on_release(&self, _route: &Route, _reused: bool, _stats: &PoolStats) {}
}

/// Event forwarded by [`ChannelListener`].
#[derive(Debug, Clone)]
pub enum RequesterEvent {
    Error {
        route: Option<Route>,
        kind: &'static str,
        message: String,
    },
    Connected {
        id: ConnectionId,
        route: Route,
    },
    Disconnected {
        id: ConnectionId,
        route: Route,
    },
    RequestHead {
        id: ConnectionId,
        method: Method,
        uri: Uri,
    },
    ResponseHead {
        id: ConnectionId,
        status: StatusCode,
    },
    ExchangeComplete {
        id: ConnectionId,
        keep_alive: bool,
    },
    Leased {
        route: Route,
        stats: PoolStats,
    },
    Released {
        route: Route,
        reused: bool,
        stats: PoolStats,
    },
}

/// Listener that forwards every event into a bounded channel.
///
/// Sending never blocks: when the channel is full the event is dropped and
/// counted.
#[derive(Debug)]
pub struct ChannelListener {
    tx: mpsc::Sender<RequesterEvent>,
    dropped: AtomicU64,
}

impl ChannelListener {
    /// Create a listener and the receiver the observer task should drain.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<RequesterEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listener = Arc::new(Self {
            tx,
            dropped: AtomicU64::new(0),
        });
        (listener, rx)
    }

    /// Number of events dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn emit(&self, event: RequesterEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_dropped_event();
            }
            // Observer went away; nothing left to notify.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl ExceptionListener for ChannelListener {
    fn on_error(&self, route: Option<&Route>, error: &RequesterError) {
        self.emit(RequesterEvent::Error {
            route: route.cloned(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

impl ConnectionListener for ChannelListener {
    fn on_connected(&self, id: ConnectionId, route: &Route) {
        self.emit(RequesterEvent::Connected { id, route: route.clone() });
    }

    fn on_disconnected(&self, id: ConnectionId, route: &Route) {
        self.emit(RequesterEvent::Disconnected { id, route: route.clone() });
    }
}

impl StreamListener for ChannelListener {
    fn on_request_head(&self, id: ConnectionId, head: &RequestHead) {
        self.emit(RequesterEvent::RequestHead {
            id,
            method: head.method.clone(),
            uri: head.uri.clone(),
        });
    }

    fn on_response_head(&self, id: ConnectionId, head: &ResponseHead) {
        self.emit(RequesterEvent::ResponseHead { id, status: head.status });
    }

    fn on_exchange_complete(&self, id: ConnectionId, keep_alive: bool) {
        self.emit(RequesterEvent::ExchangeComplete { id, keep_alive });
    }
}

impl PoolListener for ChannelListener {
    fn on_lease(&self, route: &Route, stats: &PoolStats) {
        self.emit(RequesterEvent::Leased {
            route: route.clone(),
            stats: *stats,
        });
    }

    fn on_release(&self, route: &Route, reused: bool, stats: &PoolStats) {
        self.emit(RequesterEvent::Released {
            route: route.clone(),
            reused,
            stats: *stats,
        });
    }
}
