// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Identifiers and value types shared by the topology store and the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a chunkserver.
pub type ChunkServerId = u32;

/// Unique identifier for a physical server hosting chunkservers.
pub type ServerId = u32;

/// Unique identifier for a failure zone.
pub type ZoneId = u32;

/// Unique identifier for a logical or physical pool.
pub type PoolId = u32;

/// Identifier of a copyset within its logical pool.
pub type CopysetId = u32;

/// Copyset configuration version.
pub type Epoch = u64;

/// Sentinel for an identifier that has not been assigned.
pub const UNINITIALIZED_ID: u32 = 0;

/// Unique key of a copyset: the owning logical pool plus the copyset id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CopysetKey {
    /// Owning logical pool.
    pub pool_id: PoolId,
    /// Copyset id within the pool.
    pub copyset_id: CopysetId,
}

impl CopysetKey {
    /// Creates a new copyset key.
    #[must_use]
    pub const fn new(pool_id: PoolId, copyset_id: CopysetId) -> Self {
        Self { pool_id, copyset_id }
    }
}

impl From<(PoolId, CopysetId)> for CopysetKey {
    fn from((pool_id, copyset_id): (PoolId, CopysetId)) -> Self {
        Self::new(pool_id, copyset_id)
    }
}

impl fmt::Display for CopysetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.pool_id, self.copyset_id)
    }
}

/// Heartbeat-derived liveness of a chunkserver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineState {
    /// Heartbeats arrive on time.
    #[default]
    Online,
    /// Heartbeats missing beyond the offline threshold.
    Offline,
    /// Heartbeats missing beyond the grace threshold but not yet offline.
    Unstable,
}

/// Health of a chunkserver's data disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskState {
    /// Disk is usable.
    #[default]
    Normal,
    /// Disk reported an error.
    Error,
}

/// Operational status of a chunkserver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkServerStatus {
    /// Serving reads and writes, eligible for new replicas.
    #[default]
    ReadWrite,
    /// Being drained; must not receive new replicas.
    Pending,
    /// Removed from service.
    Retired,
}

/// Kind of copyset configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigChangeType {
    /// Add a new replica.
    AddPeer,
    /// Remove an existing replica.
    RemovePeer,
    /// Move leadership to another replica.
    TransferLeader,
    /// Replace one replica with another.
    ChangePeer,
}

impl ConfigChangeType {
    /// Returns the lowercase name used in logs and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddPeer => "add_peer",
            Self::RemovePeer => "remove_peer",
            Self::TransferLeader => "transfer_leader",
            Self::ChangePeer => "change_peer",
        }
    }
}

impl fmt::Display for ConfigChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of an in-flight configuration change on a copyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChangeInfo {
    /// What the change does.
    pub kind: ConfigChangeType,
    /// The chunkserver the change targets (the candidate).
    pub target: ChunkServerId,
    /// For `ChangePeer`, the chunkserver being replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaced: Option<ChunkServerId>,
}

impl ConfigChangeInfo {
    /// Adds `target` as a new replica.
    #[must_use]
    pub const fn add_peer(target: ChunkServerId) -> Self {
        Self { kind: ConfigChangeType::AddPeer, target, replaced: None }
    }

    /// Removes the replica on `target`.
    #[must_use]
    pub const fn remove_peer(target: ChunkServerId) -> Self {
        Self { kind: ConfigChangeType::RemovePeer, target, replaced: None }
    }

    /// Moves leadership to `target`.
    #[must_use]
    pub const fn transfer_leader(target: ChunkServerId) -> Self {
        Self { kind: ConfigChangeType::TransferLeader, target, replaced: None }
    }

    /// Replaces the replica on `replaced` with one on `target`.
    #[must_use]
    pub const fn change_peer(target: ChunkServerId, replaced: ChunkServerId) -> Self {
        Self { kind: ConfigChangeType::ChangePeer, target, replaced: Some(replaced) }
    }
}

impl fmt::Display for ConfigChangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.replaced {
            Some(old) => write!(f, "{} {} (replacing {})", self.kind, self.target, old),
            None => write!(f, "{} {}", self.kind, self.target),
        }
    }
}

/// Per-chunkserver statistics aggregated from heartbeats.
///
/// All fields default to zero when nothing has been collected yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkServerStatistics {
    /// Number of copysets this chunkserver currently leads.
    pub leader_count: u32,
    /// Recent read rate in bytes per second.
    pub read_rate: u64,
    /// Recent write rate in bytes per second.
    pub write_rate: u64,
    /// Average I/O latency in microseconds.
    pub io_latency_us: u64,
}

/// Per-copyset operation counters aggregated from heartbeats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopysetStatistics {
    /// Read operations served.
    pub read_ops: u64,
    /// Write operations served.
    pub write_ops: u64,
    /// Bytes read.
    pub read_bytes: u64,
    /// Bytes written.
    pub write_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copyset_key_display_and_ordering() {
        let a = CopysetKey::new(1, 7);
        let b: CopysetKey = (2, 1).into();

        assert_eq!(a.to_string(), "(1,7)");
        assert!(a < b);
    }

    #[test]
    fn test_config_change_constructors() {
        let change = ConfigChangeInfo::change_peer(4, 2);
        assert_eq!(change.kind, ConfigChangeType::ChangePeer);
        assert_eq!(change.replaced, Some(2));
        assert_eq!(change.to_string(), "change_peer 4 (replacing 2)");

        assert_eq!(ConfigChangeInfo::add_peer(9).replaced, None);
        assert_eq!(ConfigChangeInfo::transfer_leader(3).to_string(), "transfer_leader 3");
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(serde_json::to_string(&OnlineState::Unstable).unwrap(), "\"unstable\"");
        assert_eq!(serde_json::to_string(&ChunkServerStatus::ReadWrite).unwrap(), "\"readwrite\"");

        let parsed: ConfigChangeType = serde_json::from_str("\"transfer_leader\"").unwrap();
        assert_eq!(parsed, ConfigChangeType::TransferLeader);
    }

    #[test]
    fn test_statistics_default_to_zero() {
        let stats: ChunkServerStatistics = serde_json::from_str("{}").unwrap();
        assert_eq!(stats, ChunkServerStatistics::default());
        assert_eq!(CopysetStatistics::default().write_ops, 0);
    }
}
