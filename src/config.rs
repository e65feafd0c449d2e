//! Configuration loading.
//!
//! Reads `config.toml` from an explicit path or from
//! `<config dir>/sqlshape/config.toml`. `SQLSHAPE_DATABASE_URL` overrides the
//! file's database URL.

use crate::error::{ShapeError, ShapeResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `database_url`.
pub const DATABASE_URL_ENV: &str = "SQLSHAPE_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub default_page_size: u64,
    /// Schema file registered at startup.
    pub schema: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            default_page_size: 20,
            schema: None,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> ShapeResult<Self> {
        toml::from_str(text).map_err(|e| ShapeError::Config(e.to_string()))
    }

    /// `<config dir>/sqlshape/config.toml`, when a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlshape").join("config.toml"))
    }

    /// Load from `path`, else the default path if present, else defaults;
    /// then apply the environment override.
    pub fn load(path: Option<&Path>) -> ShapeResult<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::read(&path)?,
                None => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                config.database_url = Some(url);
            }
        }

        Ok(config)
    }

    fn read(path: &Path) -> ShapeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShapeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = Config::from_toml("database_url = \"postgres://localhost/app\"").unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/app"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            max_connections = 25
            default_page_size = 50
            schema = "schema.toml"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.schema, Some(PathBuf::from("schema.toml")));
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            Config::from_toml("max_connections = \"many\""),
            Err(ShapeError::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_path() {
        let err = Config::load(Some(Path::new("/nonexistent/sqlshape.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sqlshape.toml"));
    }
}
