//! Canonical strategy defaults.

use std::fmt;
use std::sync::Arc;

use crate::net::{BasicClientTlsStrategy, TlsStrategy};
use crate::protocol::{
    ConnectionReuseStrategy, ContentLengthStrategy, DefaultConnectionReuseStrategy,
    DefaultContentLengthStrategy, HttpProcessor, InterceptorChain,
};

/// Strategies used for every slot the caller leaves unset.
///
/// Built once per bootstrap and shared by every requester it creates.
#[derive(Clone)]
pub struct StrategyDefaults {
    pub processor: Arc<dyn HttpProcessor>,
    pub reuse: Arc<dyn ConnectionReuseStrategy>,
    pub content_length: Arc<dyn ContentLengthStrategy>,
    pub tls: Arc<dyn TlsStrategy>,
}

impl StrategyDefaults {
    /// Client interceptor chain, HTTP/1.1 persistence rules, standard framing
    /// and web PKI verified TLS.
    pub fn standard() -> Self {
        Self {
            processor: Arc::new(InterceptorChain::client()),
            reuse: Arc::new(DefaultConnectionReuseStrategy),
            content_length: Arc::new(DefaultContentLengthStrategy),
            tls: Arc::new(BasicClientTlsStrategy::new()),
        }
    }
}

impl Default for StrategyDefaults {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for StrategyDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyDefaults").finish_non_exhaustive()
    }
}
