//! Bounded-concurrency asynchronous HTTP/1.1 requester.

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;
pub mod protocol;
pub mod requester;

pub use config::{load_config, RequesterConfig, TimeUnit};
pub use error::{PoolError, RequesterError, RequesterResult};
pub use events::{
    ChannelListener, ConnectionListener, ExceptionListener, PoolListener, RequesterEvent,
    StreamListener,
};
pub use net::{BasicClientTlsStrategy, TlsStrategy};
pub use pool::{LeaseGuard, Route, StrictConnPool};
pub use requester::{
    CloseMode, HttpAsyncRequester, IoReactorStatus, RequesterBootstrap, StrategyDefaults,
};
