//! The assembled requester.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::{Request, Response};
use tokio::task::JoinHandle;

use crate::config::EffectiveConfig;
use crate::error::{RequesterError, RequesterResult};
use crate::events::ExceptionListener;
use crate::lifecycle::{spawn_pool_maintenance, Shutdown};
use crate::net::connector::connect_tcp;
use crate::net::TlsStrategy;
use crate::observability::metrics;
use crate::pool::{Route, StrictConnPool};
use crate::protocol::{ClientHttp1Handler, ClientHttp1HandlerFactory};

/// Lifecycle state of a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IoReactorStatus {
    Inactive = 0,
    Active = 1,
    ShutDown = 2,
}

impl IoReactorStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => IoReactorStatus::Inactive,
            1 => IoReactorStatus::Active,
            _ => IoReactorStatus::ShutDown,
        }
    }
}

/// How `shutdown` treats exchanges still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseMode {
    /// In-flight exchanges complete; their connections are closed on release.
    #[default]
    Graceful,
    /// In-flight exchanges are cancelled with [`RequesterError::NotRunning`].
    Immediate,
}

/// Bounded-concurrency HTTP/1.1 client.
///
/// Owns its connection pool exclusively; the handler factory and TLS strategy
/// are shared and read-only.
pub struct HttpAsyncRequester {
    config: EffectiveConfig,
    pool: StrictConnPool<ClientHttp1Handler>,
    factory: ClientHttp1HandlerFactory,
    tls: Arc<dyn TlsStrategy>,
    exception_listener: Option<Arc<dyn ExceptionListener>>,
    status: AtomicU8,
    maintenance: Shutdown,
    abort: Shutdown,
    maintenance_task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpAsyncRequester {
    pub(crate) fn new(
        config: EffectiveConfig,
        pool: StrictConnPool<ClientHttp1Handler>,
        factory: ClientHttp1HandlerFactory,
        tls: Arc<dyn TlsStrategy>,
        exception_listener: Option<Arc<dyn ExceptionListener>>,
    ) -> Self {
        Self {
            config,
            pool,
            factory,
            tls,
            exception_listener,
            status: AtomicU8::new(IoReactorStatus::Inactive as u8),
            maintenance: Shutdown::new(),
            abort: Shutdown::new(),
            maintenance_task: Mutex::new(None),
        }
    }

    /// Get the resolved configuration.
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &StrictConnPool<ClientHttp1Handler> {
        &self.pool
    }

    /// Get the handler factory.
    pub fn handler_factory(&self) -> &ClientHttp1HandlerFactory {
        &self.factory
    }

    /// Get the TLS strategy.
    pub fn tls_strategy(&self) -> &Arc<dyn TlsStrategy> {
        &self.tls
    }

    /// Current lifecycle state.
    pub fn status(&self) -> IoReactorStatus {
        IoReactorStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Connections whose I/O task is still running, leased or idle.
    pub fn open_connections(&self) -> u64 {
        self.factory.open_connections()
    }

    /// Activate the requester and start pool maintenance.
    ///
    /// Must be called from within a tokio runtime. Starting an active
    /// requester is a no-op; a shut down requester cannot be restarted.
    pub fn start(&self) -> RequesterResult<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RequesterError::NoRuntime);
        }
        match self.status.compare_exchange(
            IoReactorStatus::Inactive as u8,
            IoReactorStatus::Active as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(current) => {
                return match IoReactorStatus::from_u8(current) {
                    IoReactorStatus::ShutDown => Err(RequesterError::NotRunning),
                    _ => Ok(()),
                };
            }
        }

        let task = spawn_pool_maintenance(
            self.pool.clone(),
            self.config.io_reactor.select_interval(),
            self.maintenance.subscribe(),
        );
        *self
            .maintenance_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        tracing::info!(
            max_per_route = self.config.max_per_route,
            max_total = self.config.max_total,
            time_to_live = ?self.config.time_to_live,
            "Requester started"
        );
        Ok(())
    }

    /// Send `request` to the origin named by its URI.
    ///
    /// `lease_timeout` bounds the wait for pool capacity. Failures are
    /// reported to the exception listener once and returned. Dropping the
    /// returned future releases its lease and closes the connection in use.
    pub async fn execute(
        &self,
        request: Request<Bytes>,
        lease_timeout: Duration,
    ) -> RequesterResult<Response<Bytes>> {
        if self.status() != IoReactorStatus::Active {
            return Err(RequesterError::NotRunning);
        }

        let route = match Route::from_uri(request.uri()) {
            Ok(route) => route,
            Err(e) => {
                let err = RequesterError::from(e);
                self.report(None, &err);
                return Err(err);
            }
        };

        let start = Instant::now();
        match self.exchange(&route, request, lease_timeout).await {
            Ok(response) => {
                metrics::record_exchange(&route, response.status().as_u16(), start);
                Ok(response)
            }
            Err(err) => {
                self.report(Some(&route), &err);
                Err(err)
            }
        }
    }

    async fn exchange(
        &self,
        route: &Route,
        request: Request<Bytes>,
        lease_timeout: Duration,
    ) -> RequesterResult<Response<Bytes>> {
        let mut lease = self.pool.lease_guarded(route, lease_timeout).await?;
        let entry = lease.entry_mut();

        if entry.connection().is_some_and(|handler| !handler.is_open()) {
            tracing::debug!(entry_id = entry.id(), route = %route, "Discarding stale connection");
            entry.discard_connection();
        }
        if !entry.has_connection() {
            let handler = self.connect(route).await?;
            entry.assign_connection(handler);
        }

        let response_timeout = self.config.io_reactor.so_timeout();
        let mut abort = self.abort.subscribe();
        let exchange = match entry.connection_mut() {
            Some(handler) => {
                tokio::select! {
                    result = handler.execute(request, response_timeout) => result?,
                    _ = abort.recv() => return Err(RequesterError::NotRunning),
                }
            }
            None => return Err(RequesterError::NotRunning),
        };

        if exchange.keep_alive {
            entry.update_expiry(exchange.keep_alive_timeout);
        }
        lease.release(exchange.keep_alive);
        Ok(exchange.response)
    }

    async fn connect(&self, route: &Route) -> RequesterResult<ClientHttp1Handler> {
        let connect_timeout = self.config.io_reactor.connect_timeout();
        let stream = connect_tcp(route, &self.config.io_reactor).await?;

        let io = match tokio::time::timeout(connect_timeout, self.tls.upgrade(route, stream)).await {
            Ok(Ok(io)) => io,
            Ok(Err(source)) => {
                return Err(RequesterError::Handshake {
                    route: route.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(RequesterError::ConnectTimeout {
                    route: route.clone(),
                    timeout: connect_timeout,
                })
            }
        };

        self.factory.create(route, io).await
    }

    fn report(&self, route: Option<&Route>, err: &RequesterError) {
        metrics::record_failure(err.kind());
        match route {
            Some(route) => tracing::warn!(route = %route, kind = err.kind(), error = %err, "Request failed"),
            None => tracing::warn!(kind = err.kind(), error = %err, "Request failed"),
        }
        if let Some(listener) = &self.exception_listener {
            listener.on_error(route, err);
        }
    }

    /// Stop maintenance and close the pool. Idempotent.
    pub async fn shutdown(&self, mode: CloseMode) {
        let previous = self
            .status
            .swap(IoReactorStatus::ShutDown as u8, Ordering::SeqCst);
        if IoReactorStatus::from_u8(previous) == IoReactorStatus::ShutDown {
            return;
        }

        self.maintenance.trigger();
        if mode == CloseMode::Immediate {
            self.abort.trigger();
        }
        self.pool.close();

        let task = self
            .maintenance_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Pool maintenance task failed");
            }
        }

        tracing::info!(?mode, "Requester shut down");
    }
}

impl fmt::Debug for HttpAsyncRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAsyncRequester")
            .field("status", &self.status())
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requester::RequesterBootstrap;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_start_outside_runtime() {
        let requester = RequesterBootstrap::bootstrap().create();
        assert!(matches!(requester.start(), Err(RequesterError::NoRuntime)));
        assert_eq!(requester.status(), IoReactorStatus::Inactive);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let requester = RequesterBootstrap::bootstrap().create();
        assert_eq!(requester.status(), IoReactorStatus::Inactive);

        requester.start().unwrap();
        requester.start().unwrap();
        assert_eq!(requester.status(), IoReactorStatus::Active);

        requester.shutdown(CloseMode::Graceful).await;
        requester.shutdown(CloseMode::Immediate).await;
        assert_eq!(requester.status(), IoReactorStatus::ShutDown);
        assert!(requester.pool().is_closed());
        assert!(matches!(requester.start(), Err(RequesterError::NotRunning)));
    }

    #[tokio::test]
    async fn test_execute_requires_start() {
        let requester = RequesterBootstrap::bootstrap().create();
        let request = Request::get("http://127.0.0.1:1/").body(Bytes::new()).unwrap();
        let err = requester
            .execute(request, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RequesterError::NotRunning));
    }

    #[tokio::test]
    async fn test_unroutable_uri_reported_without_route() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let requester = RequesterBootstrap::bootstrap()
            .set_exception_listener(Arc::new(move |route: Option<&Route>, err: &RequesterError| {
                assert!(route.is_none());
                assert!(matches!(err, RequesterError::Route(_)));
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .create();
        requester.start().unwrap();

        let request = Request::get("/relative").body(Bytes::new()).unwrap();
        let err = requester
            .execute(request, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RequesterError::Route(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        requester.shutdown(CloseMode::Graceful).await;
    }
}
