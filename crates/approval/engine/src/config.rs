//! Engine configuration

use crate::errors::{EngineError, EngineResult};
use approval_form::FormLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Ordinal bookkeeping settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinalConfig {
    /// Stamp the modification time of every row an ordinal operation rewrites
    pub track_updates: bool,
}

impl Default for OrdinalConfig {
    fn default() -> Self {
        Self {
            track_updates: true,
        }
    }
}

/// Approval engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApprovalConfig {
    pub ordinal: OrdinalConfig,

    /// Form parsing limits
    pub form: FormLimits,
}

impl ApprovalConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml(&contents)
        } else {
            tracing::debug!(path = %path.display(), "no approval config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))?;
        config
            .form
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(config)
    }
}
