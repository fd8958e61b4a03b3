// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Topology adapter: the scheduler's read path into cluster state.
//!
//! Scheduling policies query a [`TopoAdapter`] for copysets and
//! chunkservers in the placement model. Every call reads through to the
//! collaborators, so two calls moments apart may disagree; callers must
//! re-check a copyset's pending state right before acting on it.
//!
//! - [`TopoAdapterImpl`] converts topology-store records.
//! - [`StaticTopoAdapter`] serves already-converted values from memory.

mod fixture;
mod topo;

use chunkmeta_core::{ChunkServerId, CopysetKey, PoolId};
use chunkmeta_topology::{ChunkServerRecord, CopysetRecord};
use tracing::warn;

pub use fixture::StaticTopoAdapter;
pub use topo::TopoAdapterImpl;

use crate::error::ScheduleResult;
use crate::model::{ChunkServerInfo, CopysetInfo};
use crate::scatter::{average_scatter_width, scatter_map, scatter_width, ScatterMap};

/// Query and conversion contract between scheduling policies and topology.
///
/// Lookups report absence as `None` and lists come back sorted by id.
/// Implementations are shared across concurrently running policies.
pub trait TopoAdapter: Send + Sync {
    /// Returns the ids of all logical pools.
    fn logical_pools(&self) -> Vec<PoolId>;

    /// Looks up a copyset. `Ok(None)` means the key is not in the store.
    ///
    /// # Errors
    ///
    /// Returns the conversion failure of a stored copyset.
    fn find_copyset(&self, key: CopysetKey) -> ScheduleResult<Option<CopysetInfo>>;

    /// Looks up a chunkserver. `Ok(None)` means the id is not in the store.
    ///
    /// # Errors
    ///
    /// Returns the conversion failure of a stored chunkserver.
    fn find_chunkserver(&self, id: ChunkServerId) -> ScheduleResult<Option<ChunkServerInfo>>;

    /// Looks up a copyset, logging and skipping one that fails conversion.
    fn copyset(&self, key: CopysetKey) -> Option<CopysetInfo> {
        self.find_copyset(key).unwrap_or_else(|e| {
            warn!(copyset = %key, error = %e, "Failed to convert copyset");
            None
        })
    }

    /// Returns the copysets of pools that are ready for scheduling.
    fn copysets(&self) -> Vec<CopysetInfo>;

    /// Returns every copyset that has `id` as a member, ready pool or not.
    fn copysets_on_chunkserver(&self, id: ChunkServerId) -> Vec<CopysetInfo>;

    /// Returns the copysets of one logical pool.
    fn copysets_in_pool(&self, pool_id: PoolId) -> Vec<CopysetInfo>;

    /// Looks up a chunkserver, logging and skipping one that fails
    /// conversion.
    fn chunkserver(&self, id: ChunkServerId) -> Option<ChunkServerInfo> {
        self.find_chunkserver(id).unwrap_or_else(|e| {
            warn!(chunkserver = id, error = %e, "Failed to convert chunkserver");
            None
        })
    }

    /// Returns all chunkservers.
    fn chunkservers(&self) -> Vec<ChunkServerInfo>;

    /// Returns the chunkservers serving a logical pool.
    fn chunkservers_in_pool(&self, pool_id: PoolId) -> Vec<ChunkServerInfo>;

    /// Minimum number of distinct zones for a pool's copysets, 0 if the
    /// pool is unknown.
    fn standard_zone_count(&self, pool_id: PoolId) -> u32;

    /// Replica factor of a pool, 0 if the pool is unknown.
    fn standard_replica_count(&self, pool_id: PoolId) -> u32;

    /// Converts a store copyset into the model.
    ///
    /// # Errors
    ///
    /// Fails when a member cannot be resolved to an address and zone, or
    /// when the members break a model invariant. A recorded change that can
    /// no longer apply does not fail conversion; the copyset is reported
    /// stable instead.
    fn convert_copyset(&self, record: &CopysetRecord) -> ScheduleResult<CopysetInfo>;

    /// Converts a store chunkserver into the model.
    ///
    /// # Errors
    ///
    /// Fails when the chunkserver's server cannot be resolved.
    fn convert_chunkserver(&self, record: &ChunkServerRecord) -> ScheduleResult<ChunkServerInfo>;

    /// Returns how many copysets `id` shares with each other chunkserver.
    fn chunkserver_scatter_map(&self, id: ChunkServerId) -> ScatterMap {
        scatter_map(id, &self.copysets_on_chunkserver(id))
    }

    /// Mean scatter width over the chunkservers of a pool, 0 if it has none.
    fn average_scatter_width(&self, pool_id: PoolId) -> u32 {
        let widths: Vec<u32> = self
            .chunkservers_in_pool(pool_id)
            .iter()
            .map(|cs| scatter_width(&self.chunkserver_scatter_map(cs.id())))
            .collect();
        average_scatter_width(widths)
    }
}
