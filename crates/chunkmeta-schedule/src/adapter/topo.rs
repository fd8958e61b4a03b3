// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Production topology adapter over the topology store.

use std::collections::HashMap;
use std::sync::Arc;

use chunkmeta_core::{
    ChunkServerId, ConfigChangeInfo, ConfigChangeType, CopysetKey, PoolId, UNINITIALIZED_ID,
};
use chunkmeta_topology::{
    ChunkServerRecord, CopysetRecord, PendingChangeRecord, StatisticsCollector, TopologyStore,
};
use tracing::{debug, warn};

use super::TopoAdapter;
use crate::error::{ScheduleError, ScheduleResult};
use crate::model::{ChunkServerInfo, CopysetInfo, PeerInfo};

/// Topology adapter reading through to a [`TopologyStore`] and a
/// [`StatisticsCollector`].
///
/// Holds no cache: every call reflects the store at call time.
pub struct TopoAdapterImpl {
    store: Arc<dyn TopologyStore>,
    stats: Arc<dyn StatisticsCollector>,
}

impl TopoAdapterImpl {
    /// Creates an adapter over the given collaborators.
    pub fn new(store: Arc<dyn TopologyStore>, stats: Arc<dyn StatisticsCollector>) -> Self {
        Self { store, stats }
    }

    fn resolve_peer(&self, id: ChunkServerId) -> Result<PeerInfo, String> {
        let cs = self.store.chunkserver(id).ok_or_else(|| format!("chunkserver {id} not found"))?;
        self.resolve_record(&cs)
    }

    fn resolve_record(&self, cs: &ChunkServerRecord) -> Result<PeerInfo, String> {
        let server = self
            .store
            .server(cs.server_id)
            .ok_or_else(|| format!("server {} of chunkserver {} not found", cs.server_id, cs.id))?;
        Ok(PeerInfo::new(cs.id, server.zone_id, server.id, cs.host_ip.clone(), cs.port))
    }

    fn pool_available(&self, pool_id: PoolId) -> Option<bool> {
        self.store.logical_pool(pool_id).map(|pool| pool.available)
    }

    fn convert_with(
        &self,
        record: &CopysetRecord,
        pool_available: bool,
    ) -> ScheduleResult<CopysetInfo> {
        let key = record.key;
        let conversion = |reason: String| ScheduleError::conversion(format!("copyset {key}"), reason);

        let peers = record
            .peers
            .iter()
            .map(|id| self.resolve_peer(*id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(conversion)?;

        let info = CopysetInfo {
            key,
            pool_available,
            epoch: record.epoch,
            leader: record.leader,
            peers,
            pending: None,
            statistics: self.stats.copyset_stats(key),
        };

        match &record.pending {
            Some(pending) if is_outstanding(record, pending) => {
                let candidate = self.resolve_peer(pending.change.target);
                attach_pending(info, candidate, &pending.change)
            }
            Some(pending) => {
                debug!(copyset = %key, change = %pending.change, "Change already applied");
                validated(info)
            }
            None => validated(info),
        }
    }

    /// Converts a batch, skipping records that fail and, when `ready_only`,
    /// records of pools that are not ready. Pool readiness is looked up once
    /// per pool for the batch.
    fn convert_copysets(&self, records: Vec<CopysetRecord>, ready_only: bool) -> Vec<CopysetInfo> {
        let mut pools: HashMap<PoolId, Option<bool>> = HashMap::new();
        records
            .into_iter()
            .filter_map(|record| {
                let pool_id = record.key.pool_id;
                let available = *pools.entry(pool_id).or_insert_with(|| self.pool_available(pool_id));
                match available {
                    None => {
                        warn!(copyset = %record.key, pool = pool_id, "Skipping copyset of unknown pool");
                        None
                    }
                    Some(false) if ready_only => None,
                    Some(available) => self
                        .convert_with(&record, available)
                        .map_err(|e| {
                            warn!(copyset = %record.key, error = %e, "Skipping unconvertible copyset");
                        })
                        .ok(),
                }
            })
            .collect()
    }

    fn convert_chunkservers(&self, records: Vec<ChunkServerRecord>) -> Vec<ChunkServerInfo> {
        records
            .iter()
            .filter_map(|record| {
                self.convert_chunkserver(record)
                    .map_err(|e| {
                        warn!(chunkserver = record.id, error = %e, "Skipping unconvertible chunkserver");
                    })
                    .ok()
            })
            .collect()
    }
}

/// Returns false when the recorded change is empty or the store already
/// reflects it.
pub(super) fn is_outstanding(record: &CopysetRecord, pending: &PendingChangeRecord) -> bool {
    let change = &pending.change;
    if change.target == UNINITIALIZED_ID {
        return false;
    }

    let applied = match change.kind {
        ConfigChangeType::TransferLeader => record.leader == Some(change.target),
        _ if record.epoch <= pending.epoch => false,
        ConfigChangeType::AddPeer => record.has_peer(change.target),
        ConfigChangeType::RemovePeer => !record.has_peer(change.target),
        ConfigChangeType::ChangePeer => {
            record.has_peer(change.target)
                && change.replaced.map_or(true, |old| !record.has_peer(old))
        }
    };
    !applied
}

/// Attaches an outstanding change to a converted copyset.
///
/// A change whose candidate cannot be resolved, or that no longer fits the
/// membership, can never apply. The copyset is then reported stable so
/// reconciliation frees the slot.
pub(super) fn attach_pending(
    info: CopysetInfo,
    candidate: Result<PeerInfo, String>,
    change: &ConfigChangeInfo,
) -> ScheduleResult<CopysetInfo> {
    let key = info.key;
    let candidate = match candidate {
        Ok(candidate) => candidate,
        Err(reason) => {
            warn!(copyset = %key, change = %change, reason = %reason, "Candidate of recorded change is gone");
            return validated(info);
        }
    };

    let pending = info.clone().with_pending(candidate, change.clone());
    match pending.validate() {
        Ok(()) => Ok(pending),
        Err(e) => {
            warn!(copyset = %key, change = %change, error = %e, "Recorded change no longer fits membership");
            validated(info)
        }
    }
}

pub(super) fn validated(info: CopysetInfo) -> ScheduleResult<CopysetInfo> {
    let key = info.key;
    info.validate().map_err(|source| ScheduleError::InvalidCopyset { key, source })?;
    Ok(info)
}

impl TopoAdapter for TopoAdapterImpl {
    fn logical_pools(&self) -> Vec<PoolId> {
        self.store.logical_pool_ids()
    }

    fn find_copyset(&self, key: CopysetKey) -> ScheduleResult<Option<CopysetInfo>> {
        self.store.copyset(key).map(|record| self.convert_copyset(&record)).transpose()
    }

    fn find_chunkserver(&self, id: ChunkServerId) -> ScheduleResult<Option<ChunkServerInfo>> {
        self.store.chunkserver(id).map(|record| self.convert_chunkserver(&record)).transpose()
    }

    fn copysets(&self) -> Vec<CopysetInfo> {
        self.convert_copysets(self.store.copysets(), true)
    }

    fn copysets_on_chunkserver(&self, id: ChunkServerId) -> Vec<CopysetInfo> {
        self.convert_copysets(self.store.copysets_on_chunkserver(id), false)
    }

    fn copysets_in_pool(&self, pool_id: PoolId) -> Vec<CopysetInfo> {
        self.convert_copysets(self.store.copysets_in_logical_pool(pool_id), false)
    }

    fn chunkservers(&self) -> Vec<ChunkServerInfo> {
        self.convert_chunkservers(self.store.chunkservers())
    }

    fn chunkservers_in_pool(&self, pool_id: PoolId) -> Vec<ChunkServerInfo> {
        self.convert_chunkservers(self.store.chunkservers_in_logical_pool(pool_id))
    }

    fn standard_zone_count(&self, pool_id: PoolId) -> u32 {
        self.store.pool_config(pool_id).map_or(0, |config| config.standard_zone_count)
    }

    fn standard_replica_count(&self, pool_id: PoolId) -> u32 {
        self.store.pool_config(pool_id).map_or(0, |config| config.replica_count)
    }

    fn convert_copyset(&self, record: &CopysetRecord) -> ScheduleResult<CopysetInfo> {
        let pool_id = record.key.pool_id;
        let available = self.pool_available(pool_id).ok_or_else(|| {
            ScheduleError::conversion(
                format!("copyset {}", record.key),
                format!("logical pool {pool_id} not found"),
            )
        })?;
        self.convert_with(record, available)
    }

    fn convert_chunkserver(&self, record: &ChunkServerRecord) -> ScheduleResult<ChunkServerInfo> {
        let entity = || format!("chunkserver {}", record.id);
        let info = self.resolve_record(record).map_err(|reason| ScheduleError::conversion(entity(), reason))?;
        let statistics = self.stats.chunkserver_stats(record.id);

        let cs = ChunkServerInfo {
            info,
            start_up_time: record.start_up_time,
            state: record.online_state,
            disk_state: record.disk_state,
            status: record.status,
            leader_count: statistics.leader_count,
            disk_capacity: record.disk_capacity,
            disk_used: record.disk_used,
            statistics,
        };
        cs.validate().map_err(|e| ScheduleError::conversion(entity(), e.to_string()))?;
        Ok(cs)
    }
}
