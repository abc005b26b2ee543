//! Default substitution.
//!
//! `resolve` is a pure function from what the caller asked for to what the
//! requester will run with. It never fails: anomalies are substituted and
//! reported as warnings.

use std::fmt;
use std::time::Duration;

use crate::config::schema::{ConnectionConfig, IoReactorConfig, RequesterConfig, TimeUnit};

pub const DEFAULT_MAX_PER_ROUTE: usize = 20;
pub const DEFAULT_MAX_TOTAL: usize = 50;

/// Values the pool and handlers are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub io_reactor: IoReactorConfig,
    pub connection: ConnectionConfig,
    pub max_per_route: usize,
    pub max_total: usize,
    /// `None`: pooled entries never expire.
    pub time_to_live: Option<Duration>,
}

/// Configuration anomaly that was resolved by substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// An explicit zero or negative capacity was replaced by the default.
    NonPositiveCapacity {
        field: &'static str,
        value: i64,
        substituted: usize,
    },
    /// Per-route capacity can never be reached because the global cap is lower.
    PerRouteExceedsTotal { max_per_route: usize, max_total: usize },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::NonPositiveCapacity {
                field,
                value,
                substituted,
            } => write!(f, "{} = {} is not positive; using {}", field, value, substituted),
            ConfigWarning::PerRouteExceedsTotal {
                max_per_route,
                max_total,
            } => write!(
                f,
                "per-route capacity {} exceeds global capacity {}",
                max_per_route, max_total
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub effective: EffectiveConfig,
    pub warnings: Vec<ConfigWarning>,
}

fn capacity(
    field: &'static str,
    value: Option<i64>,
    default: usize,
    warnings: &mut Vec<ConfigWarning>,
) -> usize {
    match value {
        Some(v) if v > 0 => usize::try_from(v).unwrap_or(usize::MAX),
        Some(v) => {
            warnings.push(ConfigWarning::NonPositiveCapacity {
                field,
                value: v,
                substituted: default,
            });
            default
        }
        None => default,
    }
}

/// Apply defaults to every unset or out-of-range field.
pub fn resolve(config: &RequesterConfig) -> ResolvedConfig {
    let mut warnings = Vec::new();

    let max_per_route = capacity(
        "default_max_per_route",
        config.default_max_per_route,
        DEFAULT_MAX_PER_ROUTE,
        &mut warnings,
    );
    let max_total = capacity("max_total", config.max_total, DEFAULT_MAX_TOTAL, &mut warnings);
    if max_per_route > max_total {
        warnings.push(ConfigWarning::PerRouteExceedsTotal {
            max_per_route,
            max_total,
        });
    }

    let unit = config.time_unit.unwrap_or(TimeUnit::Milliseconds);
    let time_to_live = config
        .time_to_live
        .filter(|ttl| *ttl > 0)
        .map(|ttl| unit.to_duration(ttl));

    ResolvedConfig {
        effective: EffectiveConfig {
            io_reactor: config.io_reactor.clone(),
            connection: config.connection.clone(),
            max_per_route,
            max_total,
            time_to_live,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_take_defaults_silently() {
        let resolved = resolve(&RequesterConfig::default());
        assert_eq!(resolved.effective.max_per_route, 20);
        assert_eq!(resolved.effective.max_total, 50);
        assert_eq!(resolved.effective.time_to_live, None);
        assert!(resolved.warnings.is_empty());
    }

    #[test]
    fn test_non_positive_capacities_take_defaults_with_warning() {
        for value in [0, -1, i64::MIN] {
            let config = RequesterConfig {
                default_max_per_route: Some(value),
                max_total: Some(value),
                ..RequesterConfig::default()
            };
            let resolved = resolve(&config);
            assert_eq!(resolved.effective.max_per_route, 20);
            assert_eq!(resolved.effective.max_total, 50);
            assert_eq!(resolved.warnings.len(), 2);
        }
    }

    #[test]
    fn test_flags_per_route_above_total() {
        let config = RequesterConfig {
            default_max_per_route: Some(10),
            max_total: Some(5),
            ..RequesterConfig::default()
        };
        let resolved = resolve(&config);
        assert_eq!(
            resolved.warnings,
            vec![ConfigWarning::PerRouteExceedsTotal {
                max_per_route: 10,
                max_total: 5
            }]
        );
        // Flagged, not corrected.
        assert_eq!(resolved.effective.max_per_route, 10);
    }

    #[test]
    fn test_ttl_unit_defaults_to_millis() {
        let config = RequesterConfig {
            time_to_live: Some(250),
            ..RequesterConfig::default()
        };
        assert_eq!(resolve(&config).effective.time_to_live, Some(Duration::from_millis(250)));

        let config = RequesterConfig {
            time_to_live: Some(2),
            time_unit: Some(TimeUnit::Seconds),
            ..RequesterConfig::default()
        };
        assert_eq!(resolve(&config).effective.time_to_live, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = RequesterConfig {
            time_to_live: Some(0),
            time_unit: Some(TimeUnit::Hours),
            ..RequesterConfig::default()
        };
        assert_eq!(resolve(&config).effective.time_to_live, None);
    }

    #[test]
    fn test_warning_display() {
        let warning = ConfigWarning::NonPositiveCapacity {
            field: "max_total",
            value: 0,
            substituted: 50,
        };
        assert_eq!(warning.to_string(), "max_total = 0 is not positive; using 50");
    }
}
