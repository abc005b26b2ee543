//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::resolve::resolve;
use crate::config::schema::RequesterConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file.
///
/// Only I/O and syntax problems are errors; out-of-range values are logged
/// and left for `resolve` to substitute.
pub fn load_config(path: &Path) -> Result<RequesterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RequesterConfig = toml::from_str(&content)?;

    for warning in resolve(&config).warnings {
        tracing::warn!(path = ?path, %warning, "Configuration value substituted");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeUnit;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn test_load_config() {
        let path = temp_path("requester-config");
        fs::write(
            &path,
            r#"
            default_max_per_route = 5
            max_total = 5
            time_to_live = 1
            time_unit = "minutes"

            [connection]
            title_case_headers = true
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.default_max_per_route, Some(5));
        assert_eq!(config.time_unit, Some(TimeUnit::Minutes));
        assert!(config.connection.title_case_headers);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_config_errors() {
        let missing = load_config(Path::new("/nonexistent/requester.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));

        let path = temp_path("requester-bad-config");
        fs::write(&path, "max_total = \"many\"").unwrap();
        let bad = load_config(&path).unwrap_err();
        assert!(matches!(bad, ConfigError::Parse(_)));
        assert!(bad.to_string().starts_with("Parse error"));
        std::fs::remove_file(&path).unwrap_or_default();
    }
}
