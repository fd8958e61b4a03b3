// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! In-memory topology adapter for policy tests.

use std::collections::{BTreeMap, BTreeSet};

use chunkmeta_core::{ChunkServerId, CopysetKey, PoolId, ServerId, ZoneId};
use chunkmeta_topology::{ChunkServerRecord, CopysetRecord};
use parking_lot::RwLock;

use super::topo::{attach_pending, is_outstanding, validated};
use super::TopoAdapter;
use crate::error::{ScheduleError, ScheduleResult};
use crate::model::{ChunkServerInfo, CopysetInfo, PeerInfo};

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    replica_count: u32,
    zone_count: u32,
    available: bool,
}

#[derive(Default)]
struct Fixture {
    pools: BTreeMap<PoolId, PoolEntry>,
    servers: BTreeMap<ServerId, ZoneId>,
    chunkservers: BTreeMap<ChunkServerId, ChunkServerInfo>,
    pool_members: BTreeMap<PoolId, BTreeSet<ChunkServerId>>,
    copysets: BTreeMap<CopysetKey, CopysetInfo>,
}

/// A [`TopoAdapter`] serving already-converted model values.
///
/// Lets scheduling policies be tested without a topology store. Values are
/// returned as copies; the fixture only changes through its own setters.
#[derive(Default)]
pub struct StaticTopoAdapter {
    inner: RwLock<Fixture>,
}

impl StaticTopoAdapter {
    /// Creates an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a logical pool.
    pub fn add_pool(&self, id: PoolId, replica_count: u32, zone_count: u32, available: bool) {
        self.inner.write().pools.insert(id, PoolEntry { replica_count, zone_count, available });
    }

    /// Marks a pool ready or not. Unknown pools are ignored.
    pub fn set_pool_available(&self, id: PoolId, available: bool) {
        if let Some(pool) = self.inner.write().pools.get_mut(&id) {
            pool.available = available;
        }
    }

    /// Registers a server so chunkserver records on it can be converted.
    pub fn add_server(&self, id: ServerId, zone_id: ZoneId) {
        self.inner.write().servers.insert(id, zone_id);
    }

    /// Adds or replaces a chunkserver serving `pool_id`.
    pub fn insert_chunkserver(&self, pool_id: PoolId, cs: ChunkServerInfo) {
        let mut inner = self.inner.write();
        inner.servers.insert(cs.info.server_id, cs.info.zone_id);
        inner.pool_members.entry(pool_id).or_default().insert(cs.id());
        inner.chunkservers.insert(cs.id(), cs);
    }

    /// Removes a chunkserver. Copysets keep their copies of its peer info.
    pub fn remove_chunkserver(&self, id: ChunkServerId) -> Option<ChunkServerInfo> {
        let mut inner = self.inner.write();
        for members in inner.pool_members.values_mut() {
            members.remove(&id);
        }
        inner.chunkservers.remove(&id)
    }

    /// Adds or replaces a copyset.
    pub fn insert_copyset(&self, copyset: CopysetInfo) {
        self.inner.write().copysets.insert(copyset.key, copyset);
    }

    /// Removes a copyset.
    pub fn remove_copyset(&self, key: CopysetKey) -> Option<CopysetInfo> {
        self.inner.write().copysets.remove(&key)
    }

    /// Copies a stored copyset, stamping the pool's current readiness.
    fn snapshot(fixture: &Fixture, copyset: &CopysetInfo) -> CopysetInfo {
        let mut copy = copyset.clone();
        if let Some(pool) = fixture.pools.get(&copyset.key.pool_id) {
            copy.pool_available = pool.available;
        }
        copy
    }

    fn collect_copysets<F>(&self, mut keep: F) -> Vec<CopysetInfo>
    where
        F: FnMut(&Fixture, &CopysetInfo) -> bool,
    {
        let guard = self.inner.read();
        let inner: &Fixture = &guard;
        inner
            .copysets
            .values()
            .filter(|c| keep(inner, *c))
            .map(|c| Self::snapshot(inner, c))
            .collect()
    }
}

impl TopoAdapter for StaticTopoAdapter {
    fn logical_pools(&self) -> Vec<PoolId> {
        self.inner.read().pools.keys().copied().collect()
    }

    fn find_copyset(&self, key: CopysetKey) -> ScheduleResult<Option<CopysetInfo>> {
        let inner = self.inner.read();
        Ok(inner.copysets.get(&key).map(|c| Self::snapshot(&inner, c)))
    }

    fn find_chunkserver(&self, id: ChunkServerId) -> ScheduleResult<Option<ChunkServerInfo>> {
        Ok(self.inner.read().chunkservers.get(&id).cloned())
    }

    fn copysets(&self) -> Vec<CopysetInfo> {
        self.collect_copysets(|fixture, c| {
            fixture.pools.get(&c.key.pool_id).is_some_and(|pool| pool.available)
        })
    }

    fn copysets_on_chunkserver(&self, id: ChunkServerId) -> Vec<CopysetInfo> {
        self.collect_copysets(|_, c| c.contains_peer(id))
    }

    fn copysets_in_pool(&self, pool_id: PoolId) -> Vec<CopysetInfo> {
        self.collect_copysets(|_, c| c.key.pool_id == pool_id)
    }

    fn chunkservers(&self) -> Vec<ChunkServerInfo> {
        self.inner.read().chunkservers.values().cloned().collect()
    }

    fn chunkservers_in_pool(&self, pool_id: PoolId) -> Vec<ChunkServerInfo> {
        let inner = self.inner.read();
        let Some(members) = inner.pool_members.get(&pool_id) else {
            return Vec::new();
        };
        members.iter().filter_map(|id| inner.chunkservers.get(id).cloned()).collect()
    }

    fn standard_zone_count(&self, pool_id: PoolId) -> u32 {
        self.inner.read().pools.get(&pool_id).map_or(0, |pool| pool.zone_count)
    }

    fn standard_replica_count(&self, pool_id: PoolId) -> u32 {
        self.inner.read().pools.get(&pool_id).map_or(0, |pool| pool.replica_count)
    }

    fn convert_copyset(&self, record: &CopysetRecord) -> ScheduleResult<CopysetInfo> {
        let key = record.key;
        let inner = self.inner.read();
        let conversion = |reason: String| ScheduleError::conversion(format!("copyset {key}"), reason);
        let peer = |id: ChunkServerId| -> Result<PeerInfo, String> {
            inner
                .chunkservers
                .get(&id)
                .map(|cs| cs.info.clone())
                .ok_or_else(|| format!("chunkserver {id} not found"))
        };

        let pool = inner
            .pools
            .get(&key.pool_id)
            .ok_or_else(|| conversion(format!("logical pool {} not found", key.pool_id)))?;
        let peers =
            record.peers.iter().map(|id| peer(*id)).collect::<Result<Vec<_>, _>>().map_err(conversion)?;

        let mut info = CopysetInfo::new(key, record.epoch, record.leader, peers);
        info.pool_available = pool.available;

        match &record.pending {
            Some(pending) if is_outstanding(record, pending) => {
                attach_pending(info, peer(pending.change.target), &pending.change)
            }
            _ => validated(info),
        }
    }

    fn convert_chunkserver(&self, record: &ChunkServerRecord) -> ScheduleResult<ChunkServerInfo> {
        let zone_id = self.inner.read().servers.get(&record.server_id).copied().ok_or_else(|| {
            ScheduleError::conversion(
                format!("chunkserver {}", record.id),
                format!("server {} not found", record.server_id),
            )
        })?;

        let info =
            PeerInfo::new(record.id, zone_id, record.server_id, record.host_ip.clone(), record.port);
        let cs = ChunkServerInfo {
            start_up_time: record.start_up_time,
            state: record.online_state,
            disk_state: record.disk_state,
            status: record.status,
            disk_capacity: record.disk_capacity,
            disk_used: record.disk_used,
            ..ChunkServerInfo::new(info)
        };
        cs.validate()
            .map_err(|e| ScheduleError::conversion(format!("chunkserver {}", record.id), e.to_string()))?;
        Ok(cs)
    }
}
