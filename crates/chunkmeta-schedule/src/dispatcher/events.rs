// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Events emitted by the config-change dispatcher.

use std::time::Duration;

use chunkmeta_core::{ChunkServerId, ConfigChangeInfo, CopysetKey};

/// Events emitted by the config-change dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// Phase 1 succeeded: the target hosts the copyset, not yet joined.
    Prepared {
        /// The copyset.
        key: CopysetKey,
        /// The target chunkserver.
        target: ChunkServerId,
    },
    /// Phase 1 failed; the change must not proceed.
    PrepareFailed {
        /// The copyset.
        key: CopysetKey,
        /// The target chunkserver.
        target: ChunkServerId,
        /// Error message.
        error: String,
    },
    /// A change was recorded against a copyset.
    ChangeSubmitted {
        /// The copyset.
        key: CopysetKey,
        /// The recorded change.
        change: ConfigChangeInfo,
    },
    /// A change was cancelled by the caller.
    ChangeCancelled {
        /// The copyset.
        key: CopysetKey,
        /// The cancelled change.
        change: ConfigChangeInfo,
    },
    /// The cluster reflects a recorded change and it was cleared.
    ChangeCompleted {
        /// The copyset.
        key: CopysetKey,
        /// The completed change.
        change: ConfigChangeInfo,
    },
    /// A change outlived the pending-change timeout and was cleared.
    ChangeExpired {
        /// The copyset.
        key: CopysetKey,
        /// The expired change.
        change: ConfigChangeInfo,
        /// How long the change had been pending.
        age: Duration,
    },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Changes the cluster now reflects.
    pub completed: usize,
    /// Changes dropped for age.
    pub expired: usize,
    /// Changes still in flight.
    pub remaining: usize,
}
