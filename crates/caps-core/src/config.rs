//! Engine configuration that downstream crates can serialize/deserialize.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming an override of the default store path.
pub const STORE_ENV_VAR: &str = "CAPS_STORE";

/// Store directory used when no override is given (relative to cwd).
pub const DEFAULT_STORE_DIR: &str = ".caps_store";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the content-addressed store.
    pub store_root: PathBuf,

    /// Capture the installed-package inventory into the environment
    /// summary. Off by default; failures downgrade to a marker.
    pub capture_packages: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(DEFAULT_STORE_DIR),
            capture_packages: false,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `CAPS_STORE`: store root path
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(s) = std::env::var(STORE_ENV_VAR) {
            if !s.is_empty() {
                cfg.store_root = PathBuf::from(s);
            }
        }
        cfg
    }

    /// Override the store root, e.g. from a `--store` flag.
    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = root.into();
        self
    }
}
