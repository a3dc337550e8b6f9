//! Constants and runtime settings. Settings are layered: built-in defaults,
//! then an optional TOML file, then `ADVDEMO_*` environment variables

use crate::Result;
use ::config::{Config, Environment, File};
use serde::Deserialize;

/// Width and height of the canonical image
pub const SIDE: u32 = 28;

/// Number of pixels in the canonical image
pub const PIXELS: usize = (SIDE * SIDE) as usize;

/// Largest allowed perturbation, as a fraction of the full intensity range
pub const MAX_EPSILON: f64 = 0.2;

pub const DEFAULT_EPSILON: f64 = 0.1;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_CONFIG_FILE: &str = "advdemo.toml";

pub const RUST_LOG: &str = "info,actix_web=debug";

/// Runtime settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Base address of the remote classifier. Remote mode iff non-empty
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Port the web surface listens on
    pub port: u16,

    /// Remote request timeout
    pub timeout_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: None,
            port: 8080,
            timeout_secs: 30,
            log: RUST_LOG.into(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is
    /// optional
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = Settings::default();
        let builder = Config::builder()
            .set_default("port", defaults.port as i64)?
            .set_default("timeout_secs", defaults.timeout_secs as i64)?
            .set_default("log", defaults.log)?;

        let builder = match path {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(Environment::with_prefix("ADVDEMO"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// The configured endpoint, if it selects remote mode
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_blank_endpoint_is_local() {
        let settings = Settings {
            endpoint: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(settings.endpoint(), None);
        assert_eq!(Settings::default().endpoint(), None);

        let settings = Settings {
            endpoint: Some(" http://localhost:9000 ".into()),
            ..Default::default()
        };
        assert_eq!(settings.endpoint(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("advdemo-{}.toml", std::process::id()));
        fs::write(&path, "endpoint = \"http://classifier:5000\"\nport = 9090\n").unwrap();

        let settings = Settings::load(path.to_str()).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.endpoint(), Some("http://classifier:5000"));
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.log, RUST_LOG);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(Settings::load(Some("/definitely/not/here/advdemo.toml")).is_err());
    }
}
