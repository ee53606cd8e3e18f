use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::CompareOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {name}; expected true or false")]
    InvalidFlag { name: &'static str, value: String },
}

/// Runtime configuration of the grading engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Compare learner and solution rows index by index instead of as sets.
    pub order_sensitive_compare: bool,
}

impl EngineConfig {
    pub const ORDER_SENSITIVE_ENV: &'static str = "FOREST_SQL_ORDER_SENSITIVE";

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup`, so callers and tests can
    /// supply their own environment.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(Self::ORDER_SENSITIVE_ENV) {
            self.order_sensitive_compare = parse_flag(Self::ORDER_SENSITIVE_ENV, &value)?;
        }
        Ok(self)
    }

    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions {
            order_sensitive: self.order_sensitive_compare,
        }
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
