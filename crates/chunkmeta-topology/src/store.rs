// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Topology store contracts.
//!
//! The topology store is the source of truth for pools, zones, servers,
//! chunkservers and copysets. Lookups are synchronous and never fail:
//! absence is `None` or an empty list. Every list is sorted by identifier
//! so callers see a deterministic order.

use chunkmeta_core::{ChunkServerId, ConfigChangeInfo, CopysetKey, Epoch, PoolId, ServerId, ZoneId};

use crate::error::StoreResult;
use crate::records::{
    ChunkServerRecord, CopysetRecord, LogicalPoolRecord, PendingChangeRecord, PoolConfig,
    ServerRecord, ZoneRecord,
};

/// Read access to cluster topology.
pub trait TopologyStore: Send + Sync {
    /// Returns the ids of all logical pools.
    fn logical_pool_ids(&self) -> Vec<PoolId>;

    /// Looks up a logical pool.
    fn logical_pool(&self, id: PoolId) -> Option<LogicalPoolRecord>;

    /// Looks up a zone.
    fn zone(&self, id: ZoneId) -> Option<ZoneRecord>;

    /// Looks up a server.
    fn server(&self, id: ServerId) -> Option<ServerRecord>;

    /// Looks up a chunkserver.
    fn chunkserver(&self, id: ChunkServerId) -> Option<ChunkServerRecord>;

    /// Returns all chunkservers.
    fn chunkservers(&self) -> Vec<ChunkServerRecord>;

    /// Looks up a copyset.
    fn copyset(&self, key: CopysetKey) -> Option<CopysetRecord>;

    /// Returns all copysets of every pool.
    fn copysets(&self) -> Vec<CopysetRecord>;

    /// Returns the copysets of one logical pool.
    fn copysets_in_logical_pool(&self, pool_id: PoolId) -> Vec<CopysetRecord> {
        self.copysets().into_iter().filter(|c| c.key.pool_id == pool_id).collect()
    }

    /// Returns the copysets whose members include `id`.
    fn copysets_on_chunkserver(&self, id: ChunkServerId) -> Vec<CopysetRecord> {
        self.copysets().into_iter().filter(|c| c.has_peer(id)).collect()
    }

    /// Returns the chunkservers that host replicas for a logical pool.
    ///
    /// A chunkserver belongs to the logical pool when its server's zone lies
    /// in the pool's physical pool. Chunkservers whose server or zone cannot
    /// be resolved are left out.
    fn chunkservers_in_logical_pool(&self, pool_id: PoolId) -> Vec<ChunkServerRecord> {
        let Some(pool) = self.logical_pool(pool_id) else {
            return Vec::new();
        };

        self.chunkservers()
            .into_iter()
            .filter(|cs| {
                self.server(cs.server_id)
                    .and_then(|server| self.zone(server.zone_id))
                    .is_some_and(|zone| zone.physical_pool_id == pool.physical_pool_id)
            })
            .collect()
    }

    /// Returns the replica configuration of a logical pool.
    fn pool_config(&self, pool_id: PoolId) -> Option<PoolConfig> {
        self.logical_pool(pool_id).map(|pool| PoolConfig::from(&pool))
    }
}

/// Per-copyset configuration-change slot.
///
/// Implementations must make each method atomic with respect to the others
/// for the same copyset key.
pub trait ConfigChangeStore: Send + Sync {
    /// Records `change` against a copyset.
    ///
    /// Succeeds only if the copyset's epoch equals `expected_epoch` and no
    /// change is recorded yet.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound` if the copyset is unknown, `StaleEpoch` if the epoch
    /// moved, `ChangeInFlight` if a change is already recorded.
    fn begin_change(
        &self,
        key: CopysetKey,
        expected_epoch: Epoch,
        change: ConfigChangeInfo,
    ) -> StoreResult<PendingChangeRecord>;

    /// Clears the recorded change if it is still exactly `observed`.
    ///
    /// Returns whether a change was cleared.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound` if the copyset is unknown.
    fn clear_change(&self, key: CopysetKey, observed: &PendingChangeRecord) -> StoreResult<bool>;

    /// Clears whatever change is recorded and returns it.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound` if the copyset is unknown.
    fn cancel_change(&self, key: CopysetKey) -> StoreResult<Option<PendingChangeRecord>>;

    /// Returns every recorded change, sorted by copyset key.
    fn pending_changes(&self) -> Vec<(CopysetKey, PendingChangeRecord)>;
}
