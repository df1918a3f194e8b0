//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the engine
//! configuration from a YAML file.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

use super::types::EngineConfig;

/// Loads and provides access to the engine configuration.
///
/// # File Layout
///
/// ```text
/// features:
///   tenancy: true
///   payroll_deductions: true
///   deduction_profile: false
/// payroll:
///   default_hourly_rate_krw: 10000
///   multipliers: { regular: "1.0", overtime: "1.5", night: "1.5", holiday: "1.5" }
/// leave:
///   default_granted_days: 15
///   annual_grant_days: 15
///   carry_over_cap_days: 5
/// ```
///
/// Any section or key may be omitted and falls back to its default.
///
/// # Example
///
/// ```no_run
/// use timepay_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/engine.yaml")?.with_env_overrides();
/// println!("tenancy enabled: {}", loader.config().features.tenancy);
/// # Ok::<(), timepay_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified file.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` instance on success, or an error if:
    /// - The file is missing (`ConfigNotFound`)
    /// - The file contains invalid YAML or unknown value types (`ConfigParseError`)
    /// - A value is out of range (`Validation`)
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        let loader = Self::from_yaml_str(&path_str, &content)?;
        info!(path = %path_str, "loaded engine configuration");
        Ok(loader)
    }

    /// Parses configuration from YAML text. `source` names the text in errors.
    pub fn from_yaml_str(source: &str, content: &str) -> EngineResult<Self> {
        let config: EngineConfig = if content.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| EngineError::ConfigParseError {
                path: source.to_string(),
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(Self { config })
    }

    /// Applies feature flag overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies feature flag overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.config.features = self.config.features.with_overrides(lookup);
        debug!(features = ?self.config.features, "applied feature flag overrides");
        self
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }
}
