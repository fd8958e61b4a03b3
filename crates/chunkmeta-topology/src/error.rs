// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Error types for topology store and transport operations.

use chunkmeta_core::{ChunkServerId, ConfigChangeInfo, CopysetKey, Epoch, PoolId, ServerId, ZoneId};
use thiserror::Error;

/// Result type for topology store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by topology store writes.
///
/// Reads never fail: absence is reported as `None` or an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Logical pool not found.
    #[error("logical pool {0} not found")]
    PoolNotFound(PoolId),

    /// Zone not found.
    #[error("zone {0} not found")]
    ZoneNotFound(ZoneId),

    /// Server not found.
    #[error("server {0} not found")]
    ServerNotFound(ServerId),

    /// Chunkserver not found.
    #[error("chunkserver {0} not found")]
    ChunkServerNotFound(ChunkServerId),

    /// Copyset not found.
    #[error("copyset {0} not found")]
    CopysetNotFound(CopysetKey),

    /// An entity with the same id already exists.
    #[error("{entity} {id} already exists")]
    Duplicate {
        /// Kind of entity.
        entity: &'static str,
        /// The duplicated id.
        id: String,
    },

    /// The id is reserved for "uninitialized".
    #[error("{entity} id must not be the uninitialized sentinel")]
    UninitializedId {
        /// Kind of entity.
        entity: &'static str,
    },

    /// A write was submitted against an epoch the store no longer holds.
    #[error("stale epoch for copyset {key}: expected {expected}, store has {actual}")]
    StaleEpoch {
        /// The copyset.
        key: CopysetKey,
        /// Epoch the writer observed.
        expected: Epoch,
        /// Epoch currently stored.
        actual: Epoch,
    },

    /// The copyset already carries a configuration change.
    #[error("copyset {key} already has a pending change: {existing}")]
    ChangeInFlight {
        /// The copyset.
        key: CopysetKey,
        /// The change already recorded.
        existing: ConfigChangeInfo,
    },
}

impl StoreError {
    /// Creates a duplicate-entity error.
    pub fn duplicate(entity: &'static str, id: impl ToString) -> Self {
        Self::Duplicate { entity, id: id.to_string() }
    }
}

/// Errors returned by the replication-group transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The chunkserver could not be reached.
    #[error("chunkserver {chunkserver} unreachable: {reason}")]
    Unreachable {
        /// The target chunkserver.
        chunkserver: ChunkServerId,
        /// Why the call failed.
        reason: String,
    },

    /// The chunkserver already hosts the copyset.
    #[error("copyset {key} already exists on chunkserver {chunkserver}")]
    AlreadyExists {
        /// The target chunkserver.
        chunkserver: ChunkServerId,
        /// The copyset.
        key: CopysetKey,
    },

    /// The chunkserver refused the request.
    #[error("chunkserver {chunkserver} rejected the request: {reason}")]
    Rejected {
        /// The target chunkserver.
        chunkserver: ChunkServerId,
        /// Reason reported by the chunkserver.
        reason: String,
    },
}

impl TransportError {
    /// Creates an unreachable error.
    pub fn unreachable(chunkserver: ChunkServerId, reason: impl Into<String>) -> Self {
        Self::Unreachable { chunkserver, reason: reason.into() }
    }
}
