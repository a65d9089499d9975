//! Engine configuration, loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bp_dispatch::{BackoffStrategy, RetryPolicy};
use bp_eval::RoutineFactory;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Verify emitted routines. Unset means verify in debug builds only.
    #[serde(default)]
    pub verify_routines: Option<bool>,
    /// Write every generated routine to a directory.
    #[serde(default)]
    pub persist: Option<PersistConfig>,
    #[serde(default)]
    pub default_retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistConfig {
    pub dir: PathBuf,
}

/// Retry policy applied to handlers registered without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default)]
    pub backoff: BackoffStrategy,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_count,
            Duration::from_millis(self.interval_ms),
            self.backoff,
        )
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Routine factory for this configuration.
    pub fn factory(&self) -> RoutineFactory {
        let factory = match &self.persist {
            Some(persist) => RoutineFactory::persisted(&persist.dir),
            None => RoutineFactory::ephemeral(),
        };
        match self.verify_routines {
            Some(verify) => factory.with_verification(verify),
            None => factory,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
