//! Requester assembly.

use std::fmt;
use std::sync::Arc;

use crate::config::{resolve, ConnectionConfig, IoReactorConfig, RequesterConfig, TimeUnit};
use crate::events::{
    ChannelListener, ConnectionListener, ExceptionListener, PoolListener, StreamListener,
};
use crate::net::TlsStrategy;
use crate::pool::StrictConnPool;
use crate::protocol::{
    ClientHttp1HandlerFactory, ConnectionReuseStrategy, ContentLengthStrategy, HttpProcessor,
};
use crate::requester::{HttpAsyncRequester, StrategyDefaults};

/// Accumulates requester options; `create` assembles a new requester.
///
/// Setters mutate in place and return the same builder, so calls chain in
/// any order. `create` may be called repeatedly; each call yields an
/// independent requester with its own pool.
#[derive(Clone, Default)]
pub struct RequesterBootstrap {
    config: RequesterConfig,
    defaults: StrategyDefaults,
    processor: Option<Arc<dyn HttpProcessor>>,
    reuse: Option<Arc<dyn ConnectionReuseStrategy>>,
    content_length: Option<Arc<dyn ContentLengthStrategy>>,
    tls: Option<Arc<dyn TlsStrategy>>,
    exception_listener: Option<Arc<dyn ExceptionListener>>,
    connection_listener: Option<Arc<dyn ConnectionListener>>,
    stream_listener: Option<Arc<dyn StreamListener>>,
    pool_listener: Option<Arc<dyn PoolListener>>,
}

impl RequesterBootstrap {
    /// Start an empty builder.
    pub fn bootstrap() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration file.
    pub fn from_config(config: RequesterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Get the accumulated configuration.
    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }

    pub fn set_io_reactor_config(&mut self, config: IoReactorConfig) -> &mut Self {
        self.config.io_reactor = config;
        self
    }

    pub fn set_connection_config(&mut self, config: ConnectionConfig) -> &mut Self {
        self.config.connection = config;
        self
    }

    pub fn set_http_processor(&mut self, processor: Arc<dyn HttpProcessor>) -> &mut Self {
        self.processor = Some(processor);
        self
    }

    pub fn set_connection_reuse_strategy(
        &mut self,
        strategy: Arc<dyn ConnectionReuseStrategy>,
    ) -> &mut Self {
        self.reuse = Some(strategy);
        self
    }

    pub fn set_content_length_strategy(
        &mut self,
        strategy: Arc<dyn ContentLengthStrategy>,
    ) -> &mut Self {
        self.content_length = Some(strategy);
        self
    }

    pub fn set_tls_strategy(&mut self, strategy: Arc<dyn TlsStrategy>) -> &mut Self {
        self.tls = Some(strategy);
        self
    }

    /// Values of zero or below fall back to the default with a warning.
    pub fn set_default_max_per_route(&mut self, max: i32) -> &mut Self {
        self.config.default_max_per_route = Some(i64::from(max));
        self
    }

    /// Values of zero or below fall back to the default with a warning.
    pub fn set_max_total(&mut self, max: i32) -> &mut Self {
        self.config.max_total = Some(i64::from(max));
        self
    }

    /// A zero TTL keeps pooled connections until they fail or go idle-stale.
    pub fn set_time_to_live(&mut self, ttl: u64, unit: TimeUnit) -> &mut Self {
        self.config.time_to_live = Some(ttl);
        self.config.time_unit = Some(unit);
        self
    }

    pub fn set_exception_listener(&mut self, listener: Arc<dyn ExceptionListener>) -> &mut Self {
        self.exception_listener = Some(listener);
        self
    }

    pub fn set_connection_listener(&mut self, listener: Arc<dyn ConnectionListener>) -> &mut Self {
        self.connection_listener = Some(listener);
        self
    }

    pub fn set_stream_listener(&mut self, listener: Arc<dyn StreamListener>) -> &mut Self {
        self.stream_listener = Some(listener);
        self
    }

    pub fn set_pool_listener(&mut self, listener: Arc<dyn PoolListener>) -> &mut Self {
        self.pool_listener = Some(listener);
        self
    }

    /// Register one channel listener for all four event kinds.
    pub fn set_channel_listener(&mut self, listener: Arc<ChannelListener>) -> &mut Self {
        self.exception_listener = Some(listener.clone());
        self.connection_listener = Some(listener.clone());
        self.stream_listener = Some(listener.clone());
        self.pool_listener = Some(listener);
        self
    }

    /// Replace the strategies used for unset slots.
    pub fn with_defaults(&mut self, defaults: StrategyDefaults) -> &mut Self {
        self.defaults = defaults;
        self
    }

    /// Assemble a new requester. Never fails.
    pub fn create(&self) -> HttpAsyncRequester {
        let resolved = resolve(&self.config);
        for warning in &resolved.warnings {
            tracing::warn!(%warning, "Requester configuration adjusted");
        }
        let effective = resolved.effective;

        let processor = self
            .processor
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.defaults.processor));
        let reuse = self
            .reuse
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.defaults.reuse));
        let content_length = self
            .content_length
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.defaults.content_length));
        let tls = self
            .tls
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.defaults.tls));

        let pool = StrictConnPool::new(
            effective.max_per_route,
            effective.max_total,
            effective.time_to_live,
            self.pool_listener.clone(),
        );
        let factory = ClientHttp1HandlerFactory::new(
            processor,
            effective.connection.clone(),
            reuse,
            Arc::clone(&content_length),
            content_length,
            self.connection_listener.clone(),
            self.stream_listener.clone(),
        );

        tracing::debug!(
            max_per_route = effective.max_per_route,
            max_total = effective.max_total,
            "Requester assembled"
        );
        HttpAsyncRequester::new(effective, pool, factory, tls, self.exception_listener.clone())
    }
}

impl fmt::Debug for RequesterBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequesterBootstrap")
            .field("config", &self.config)
            .field("custom_processor", &self.processor.is_some())
            .field("custom_reuse", &self.reuse.is_some())
            .field("custom_tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}
