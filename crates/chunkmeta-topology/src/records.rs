// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Raw records as held by the topology store.
//!
//! These mirror the store's own representation. The scheduler never works
//! with them directly; the topology adapter converts them into the
//! scheduler model, resolving peer addresses and zones along the way.

use chrono::{DateTime, Utc};
use chunkmeta_core::{
    ChunkServerId, ChunkServerStatus, ConfigChangeInfo, CopysetKey, DiskState, Epoch, OnlineState,
    PoolId, ServerId, ZoneId,
};
use serde::{Deserialize, Serialize};

/// A logical pool: the scheduling domain for a group of copysets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPoolRecord {
    /// Pool id.
    pub id: PoolId,
    /// Human-readable name.
    pub name: String,
    /// Physical pool whose chunkservers host this pool's copysets.
    pub physical_pool_id: PoolId,
    /// Configured replica factor.
    pub replica_count: u32,
    /// Minimum number of distinct zones a copyset must span.
    pub zone_count: u32,
    /// True once every copyset of the pool has been created.
    #[serde(default)]
    pub available: bool,
}

/// A failure zone inside a physical pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Zone id.
    pub id: ZoneId,
    /// Human-readable name.
    pub name: String,
    /// Owning physical pool.
    pub physical_pool_id: PoolId,
}

/// A physical server hosting one or more chunkservers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server id.
    pub id: ServerId,
    /// Host name.
    pub hostname: String,
    /// Address on the internal network.
    pub internal_ip: String,
    /// Zone the server lives in.
    pub zone_id: ZoneId,
}

/// A chunkserver as registered in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkServerRecord {
    /// Chunkserver id.
    pub id: ChunkServerId,
    /// Server the chunkserver runs on.
    pub server_id: ServerId,
    /// Address the chunkserver listens on.
    pub host_ip: String,
    /// Port the chunkserver listens on.
    pub port: u16,
    /// Process start time, seconds since the epoch.
    #[serde(default)]
    pub start_up_time: u64,
    /// Heartbeat-derived liveness.
    #[serde(default)]
    pub online_state: OnlineState,
    /// Disk health.
    #[serde(default)]
    pub disk_state: DiskState,
    /// Operational status.
    #[serde(default)]
    pub status: ChunkServerStatus,
    /// Disk capacity in bytes.
    #[serde(default)]
    pub disk_capacity: u64,
    /// Used disk bytes.
    #[serde(default)]
    pub disk_used: u64,
}

/// A configuration change recorded against a copyset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChangeRecord {
    /// The change descriptor.
    pub change: ConfigChangeInfo,
    /// Copyset epoch the change was submitted against.
    pub epoch: Epoch,
    /// When the change was recorded.
    pub submitted_at: DateTime<Utc>,
}

impl PendingChangeRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(change: ConfigChangeInfo, epoch: Epoch) -> Self {
        Self { change, epoch, submitted_at: Utc::now() }
    }
}

/// A copyset as known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopysetRecord {
    /// Copyset key.
    pub key: CopysetKey,
    /// Configuration epoch.
    pub epoch: Epoch,
    /// Current leader, if one has been reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<ChunkServerId>,
    /// Member chunkservers.
    pub peers: Vec<ChunkServerId>,
    /// Configuration change in flight, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingChangeRecord>,
}

impl CopysetRecord {
    /// Creates a steady-state copyset record.
    #[must_use]
    pub fn new(
        key: CopysetKey,
        epoch: Epoch,
        leader: Option<ChunkServerId>,
        peers: Vec<ChunkServerId>,
    ) -> Self {
        Self { key, epoch, leader, peers, pending: None }
    }

    /// Returns true if `id` is one of the members.
    #[must_use]
    pub fn has_peer(&self, id: ChunkServerId) -> bool {
        self.peers.contains(&id)
    }
}

/// Replica configuration and readiness of a logical pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Configured replica factor.
    pub replica_count: u32,
    /// Minimum number of distinct zones.
    pub standard_zone_count: u32,
    /// True once initial copyset creation has completed.
    pub available: bool,
}

impl From<&LogicalPoolRecord> for PoolConfig {
    fn from(pool: &LogicalPoolRecord) -> Self {
        Self {
            replica_count: pool.replica_count,
            standard_zone_count: pool.zone_count,
            available: pool.available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copyset_record_defaults_from_json() {
        let json = r#"{"key":{"pool_id":1,"copyset_id":3},"epoch":2,"peers":[1,2,3]}"#;
        let record: CopysetRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.key, CopysetKey::new(1, 3));
        assert_eq!(record.leader, None);
        assert!(record.pending.is_none());
        assert!(record.has_peer(2));
        assert!(!record.has_peer(4));
    }

    #[test]
    fn test_chunkserver_record_defaults_from_json() {
        let json = r#"{"id":5,"server_id":1,"host_ip":"10.0.0.5","port":8200}"#;
        let record: ChunkServerRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.online_state, OnlineState::Online);
        assert_eq!(record.status, ChunkServerStatus::ReadWrite);
        assert_eq!(record.disk_state, DiskState::Normal);
        assert_eq!(record.disk_used, 0);
    }

    #[test]
    fn test_pool_config_from_record() {
        let pool = LogicalPoolRecord {
            id: 1,
            name: "pool1".to_string(),
            physical_pool_id: 1,
            replica_count: 3,
            zone_count: 3,
            available: true,
        };
        let config = PoolConfig::from(&pool);
        assert_eq!(config.replica_count, 3);
        assert_eq!(config.standard_zone_count, 3);
        assert!(config.available);
    }
}
