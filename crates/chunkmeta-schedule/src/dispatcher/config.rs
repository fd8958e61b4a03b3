// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Configuration for the config-change dispatcher.

use std::time::Duration;

use chunkmeta_core::config::{
    DEFAULT_CREATE_COPYSET_TIMEOUT_MS, DEFAULT_PENDING_CHANGE_TIMEOUT_MS,
    DEFAULT_RECONCILE_INTERVAL_MS,
};
use chunkmeta_core::ScheduleConfig;

/// Configuration for the config-change dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on phase 1 (creating the copyset on the target).
    /// Hitting it fails the prepare.
    pub create_copyset_timeout: Duration,

    /// Age after which an unconfirmed change is dropped. `None` keeps
    /// changes until they are observed or cancelled.
    pub pending_change_timeout: Option<Duration>,

    /// Interval between reconciliation passes.
    pub reconcile_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            create_copyset_timeout: Duration::from_millis(DEFAULT_CREATE_COPYSET_TIMEOUT_MS),
            pending_change_timeout: Some(Duration::from_millis(DEFAULT_PENDING_CHANGE_TIMEOUT_MS)),
            reconcile_interval: Duration::from_millis(DEFAULT_RECONCILE_INTERVAL_MS),
        }
    }
}

impl From<&ScheduleConfig> for DispatcherConfig {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            create_copyset_timeout: Duration::from_millis(config.create_copyset_timeout_ms),
            pending_change_timeout: (config.pending_change_timeout_ms > 0)
                .then(|| Duration::from_millis(config.pending_change_timeout_ms)),
            reconcile_interval: Duration::from_millis(config.reconcile_interval_ms),
        }
    }
}
