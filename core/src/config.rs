//! Application metadata and workspace tuning.
//!
//! [`AppEnvironment`] answers questions like "what is this app called" and is
//! expected to be complete at startup: a missing key is a [`ConfigError`] that the
//! binary treats as fatal. [`WorkspaceSettings`] holds the knobs of the workspace
//! itself and always has usable defaults.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Environment variable overriding [`WorkspaceSettings::analysis_delay`], in milliseconds.
pub const ANALYSIS_DELAY_ENV: &str = "SIGNUM_ANALYSIS_DELAY_MS";

/// Keys of the application metadata every build must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentKey {
    AppName,
    BundleId,
    Version,
}

impl EnvironmentKey {
    /// Name of the environment variable that may supply (or override) this key.
    pub fn variable(self) -> &'static str {
        match self {
            EnvironmentKey::AppName => "SIGNUM_APP_NAME",
            EnvironmentKey::BundleId => "SIGNUM_BUNDLE_ID",
            EnvironmentKey::Version => "SIGNUM_VERSION",
        }
    }

    pub const ALL: [EnvironmentKey; 3] = [
        EnvironmentKey::AppName,
        EnvironmentKey::BundleId,
        EnvironmentKey::Version,
    ];
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required application metadata {0:?} (set {var})", var = .0.variable())]
    MissingAppMetadata(EnvironmentKey),

    #[error("Invalid value for {variable}: '{value}'")]
    InvalidValue { variable: &'static str, value: String },
}

/// Application metadata, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppEnvironment {
    values: HashMap<EnvironmentKey, String>,
}

impl AppEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` unless `value` is empty.
    pub fn with(mut self, key: EnvironmentKey, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(key, value);
        }
        self
    }

    /// Overlays values read through `lookup` (normally `std::env::var`) on top of
    /// the compiled-in ones.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in EnvironmentKey::ALL {
            if let Some(value) = lookup(key.variable()) {
                debug!("Application metadata {:?} overridden from {}", key, key.variable());
                self = self.with(key, value);
            }
        }
        self
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: EnvironmentKey) -> Result<&str, ConfigError> {
        self.values
            .get(&key)
            .map(String::as_str)
            .ok_or(ConfigError::MissingAppMetadata(key))
    }

    /// Fails on the first missing key. Run this before doing anything else.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in EnvironmentKey::ALL {
            self.get(key)?;
        }
        Ok(())
    }
}

/// Tunables for the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    /// How long the placeholder analysis step takes per document.
    pub analysis_delay: Duration,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        WorkspaceSettings {
            analysis_delay: Duration::from_secs(1),
        }
    }
}

impl WorkspaceSettings {
    /// Settings with no artificial delays, for tests and scripted runs.
    pub fn immediate() -> Self {
        WorkspaceSettings {
            analysis_delay: Duration::ZERO,
        }
    }

    /// Applies [`ANALYSIS_DELAY_ENV`] if `lookup` yields it.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ANALYSIS_DELAY_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                variable: ANALYSIS_DELAY_ENV,
                value: raw.clone(),
            })?;
            self.analysis_delay = Duration::from_millis(millis);
        }
        Ok(self)
    }
}
