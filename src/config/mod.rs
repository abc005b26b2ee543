//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! RequesterBootstrap setters / config file (TOML)
//!     → schema.rs (RequesterConfig, every field optional or defaulted)
//!     → loader.rs (parse & deserialize, optional)
//!     → resolve.rs (pure default substitution + warnings)
//!     → EffectiveConfig (immutable, consumed once at create())
//! ```
//!
//! # Design Decisions
//! - Unset (`None`) and explicitly non-positive capacities are distinct;
//!   both resolve to the default, only the latter warns
//! - Resolution never fails; misconfiguration is flagged, not rejected
//! - Config is read once at assembly; requesters never re-read it

pub mod loader;
pub mod resolve;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use resolve::{resolve, ConfigWarning, EffectiveConfig, ResolvedConfig};
pub use schema::{ConnectionConfig, IoReactorConfig, ObservabilityConfig, RequesterConfig, TimeUnit};
