// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Error types for the scheduling layer.

use chunkmeta_core::{ChunkServerId, ConfigChangeInfo, CopysetKey, Epoch};
use chunkmeta_topology::{StoreError, TransportError};
use thiserror::Error;

/// Result type for scheduling-layer operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Violations of the placement-model invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// An identifier is the uninitialized sentinel.
    #[error("{entity} id is uninitialized")]
    UninitializedId {
        /// Kind of entity.
        entity: &'static str,
    },

    /// The same chunkserver appears twice in the member set.
    #[error("peer {0} appears more than once")]
    DuplicatePeer(ChunkServerId),

    /// A steady-state leader is not one of the members.
    #[error("leader {0} is not a member")]
    LeaderNotMember(ChunkServerId),

    /// The candidate of a change does not match the change target.
    #[error("candidate {candidate} does not match change target {target}")]
    CandidateMismatch {
        /// Candidate peer id.
        candidate: ChunkServerId,
        /// Target named by the change.
        target: ChunkServerId,
    },

    /// An add or replace candidate is already a member.
    #[error("candidate {0} is already a member")]
    CandidateIsMember(ChunkServerId),

    /// A remove or transfer-leader candidate is not a member.
    #[error("candidate {0} is not a member")]
    CandidateNotMember(ChunkServerId),

    /// A replace change does not name the peer being replaced.
    #[error("change_peer does not name the replaced peer")]
    MissingReplaced,

    /// The peer being replaced is not a member.
    #[error("replaced peer {0} is not a member")]
    ReplacedNotMember(ChunkServerId),
}

/// Errors surfaced by the topology adapter and the config-change dispatcher.
///
/// Lookups report absence as `None`; the not-found variants here are only
/// returned by write paths that need the entity to exist.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Copyset not found.
    #[error("copyset {0} not found")]
    CopysetNotFound(CopysetKey),

    /// Chunkserver not found.
    #[error("chunkserver {0} not found")]
    ChunkServerNotFound(ChunkServerId),

    /// A store record could not be mapped to the scheduler model.
    #[error("cannot convert {entity}: {reason}")]
    Conversion {
        /// What was being converted, e.g. `copyset (1,2)`.
        entity: String,
        /// What could not be resolved.
        reason: String,
    },

    /// A converted copyset breaks a model invariant.
    #[error("copyset {key} is inconsistent: {source}")]
    InvalidCopyset {
        /// The copyset.
        key: CopysetKey,
        /// The violated invariant.
        #[source]
        source: ModelError,
    },

    /// The copyset already carries a configuration change.
    #[error("copyset {key} already has a pending change: {existing}")]
    ChangeInFlight {
        /// The copyset.
        key: CopysetKey,
        /// The change already in flight.
        existing: ConfigChangeInfo,
    },

    /// The request was built against an epoch the cluster has moved past.
    #[error("stale epoch for copyset {key}: request has {expected}, cluster has {actual}")]
    StaleEpoch {
        /// The copyset.
        key: CopysetKey,
        /// Epoch in the request.
        expected: Epoch,
        /// Current epoch.
        actual: Epoch,
    },

    /// The requested change makes no sense for the copyset.
    #[error("invalid change for copyset {key}: {reason}")]
    InvalidChange {
        /// The copyset.
        key: CopysetKey,
        /// Why the change was refused.
        reason: String,
    },

    /// The RPC to a chunkserver failed.
    #[error("transport to chunkserver {chunkserver} failed: {source}")]
    Transport {
        /// The target chunkserver.
        chunkserver: ChunkServerId,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// The RPC to a chunkserver did not complete in time.
    #[error("chunkserver {chunkserver} did not answer within {timeout_ms}ms")]
    Timeout {
        /// The target chunkserver.
        chunkserver: ChunkServerId,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// A topology store write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScheduleError {
    /// Creates a conversion error.
    pub fn conversion(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion { entity: entity.into(), reason: reason.into() }
    }

    /// Creates an invalid-change error.
    pub fn invalid_change(key: CopysetKey, reason: impl Into<String>) -> Self {
        Self::InvalidChange { key, reason: reason.into() }
    }

    /// Returns true for failures of the chunkserver RPC, timeouts included.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
