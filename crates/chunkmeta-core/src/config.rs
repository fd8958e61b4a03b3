// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Configuration management for chunkmeta.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default timeout for instantiating a copyset on a target chunkserver.
pub const DEFAULT_CREATE_COPYSET_TIMEOUT_MS: u64 = 3_000;

/// Default age after which an unconfirmed configuration change is dropped.
pub const DEFAULT_PENDING_CHANGE_TIMEOUT_MS: u64 = 300_000;

/// Default interval between pending-change reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 10_000;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Scheduling-layer configuration.
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(crate::Error::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn parse(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if a given file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks values that would make the scheduler misbehave.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending key.
    pub fn validate(&self) -> crate::Result<()> {
        if self.schedule.create_copyset_timeout_ms == 0 {
            return Err(crate::Error::config("schedule.create_copyset_timeout_ms must be > 0"));
        }
        if self.schedule.reconcile_interval_ms == 0 {
            return Err(crate::Error::config("schedule.reconcile_interval_ms must be > 0"));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// Scheduling-layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Timeout for phase 1 of a configuration change (copyset creation on
    /// the target chunkserver), in milliseconds.
    pub create_copyset_timeout_ms: u64,
    /// Age in milliseconds after which an unconfirmed pending change is
    /// cleared. 0 disables expiry.
    pub pending_change_timeout_ms: u64,
    /// Interval between reconciliation passes over pending changes.
    pub reconcile_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            create_copyset_timeout_ms: DEFAULT_CREATE_COPYSET_TIMEOUT_MS,
            pending_change_timeout_ms: DEFAULT_PENDING_CHANGE_TIMEOUT_MS,
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
        }
    }
}
