// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! In-memory topology store.
//!
//! Backs tests, the inspection CLI and single-process deployments. Each
//! entity kind lives in its own `DashMap`; copyset writes take the shard
//! lock for that key, which makes every per-copyset check-then-set atomic
//! without a global lock.

use std::path::Path;

use chunkmeta_core::{
    ChunkServerId, ConfigChangeInfo, CopysetKey, Epoch, PoolId, ServerId, ZoneId,
    UNINITIALIZED_ID,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::records::{
    ChunkServerRecord, CopysetRecord, LogicalPoolRecord, PendingChangeRecord, ServerRecord,
    ZoneRecord,
};
use crate::store::{ConfigChangeStore, TopologyStore};

/// Serializable form of a whole topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySnapshot {
    /// Logical pools.
    pub pools: Vec<LogicalPoolRecord>,
    /// Zones.
    pub zones: Vec<ZoneRecord>,
    /// Servers.
    pub servers: Vec<ServerRecord>,
    /// Chunkservers.
    pub chunkservers: Vec<ChunkServerRecord>,
    /// Copysets.
    pub copysets: Vec<CopysetRecord>,
}

impl TopologySnapshot {
    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Renders the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reads a JSON snapshot from a file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(std::io::Error::from)
    }
}

/// Topology store held entirely in memory.
#[derive(Default)]
pub struct MemoryTopologyStore {
    pools: DashMap<PoolId, LogicalPoolRecord>,
    zones: DashMap<ZoneId, ZoneRecord>,
    servers: DashMap<ServerId, ServerRecord>,
    chunkservers: DashMap<ChunkServerId, ChunkServerRecord>,
    copysets: DashMap<CopysetKey, CopysetRecord>,
}

impl MemoryTopologyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a snapshot, checking every reference.
    ///
    /// Entities are inserted parents first, so a zone, server, chunkserver
    /// or copyset pointing at something missing is rejected.
    ///
    /// # Errors
    ///
    /// Returns the first duplicate, uninitialized id or dangling reference.
    pub fn from_snapshot(snapshot: TopologySnapshot) -> StoreResult<Self> {
        let store = Self::new();
        for pool in snapshot.pools {
            store.add_logical_pool(pool)?;
        }
        for zone in snapshot.zones {
            store.add_zone(zone)?;
        }
        for server in snapshot.servers {
            store.add_server(server)?;
        }
        for cs in snapshot.chunkservers {
            store.add_chunkserver(cs)?;
        }
        for copyset in snapshot.copysets {
            for peer in &copyset.peers {
                if !store.chunkservers.contains_key(peer) {
                    return Err(StoreError::ChunkServerNotFound(*peer));
                }
            }
            store.add_copyset(copyset)?;
        }

        info!(
            pools = store.pools.len(),
            chunkservers = store.chunkservers.len(),
            copysets = store.copysets.len(),
            "Loaded topology snapshot"
        );
        Ok(store)
    }

    /// Exports the current contents, each list sorted by id.
    pub fn snapshot(&self) -> TopologySnapshot {
        let mut pools: Vec<_> = self.pools.iter().map(|e| e.value().clone()).collect();
        pools.sort_by_key(|p| p.id);
        let mut zones: Vec<_> = self.zones.iter().map(|e| e.value().clone()).collect();
        zones.sort_by_key(|z| z.id);
        let mut servers: Vec<_> = self.servers.iter().map(|e| e.value().clone()).collect();
        servers.sort_by_key(|s| s.id);

        TopologySnapshot {
            pools,
            zones,
            servers,
            chunkservers: self.chunkservers(),
            copysets: self.copysets(),
        }
    }

    /// Adds a logical pool.
    ///
    /// # Errors
    ///
    /// Rejects the uninitialized id and duplicates.
    pub fn add_logical_pool(&self, pool: LogicalPoolRecord) -> StoreResult<()> {
        check_id("logical pool", pool.id)?;
        insert_new(&self.pools, pool.id, pool, "logical pool")
    }

    /// Adds a zone.
    ///
    /// # Errors
    ///
    /// Rejects the uninitialized id and duplicates.
    pub fn add_zone(&self, zone: ZoneRecord) -> StoreResult<()> {
        check_id("zone", zone.id)?;
        insert_new(&self.zones, zone.id, zone, "zone")
    }

    /// Adds a server. Its zone must exist.
    ///
    /// # Errors
    ///
    /// Rejects the uninitialized id, duplicates and unknown zones.
    pub fn add_server(&self, server: ServerRecord) -> StoreResult<()> {
        check_id("server", server.id)?;
        if !self.zones.contains_key(&server.zone_id) {
            return Err(StoreError::ZoneNotFound(server.zone_id));
        }
        insert_new(&self.servers, server.id, server, "server")
    }

    /// Adds a chunkserver. Its server must exist.
    ///
    /// # Errors
    ///
    /// Rejects the uninitialized id, duplicates and unknown servers.
    pub fn add_chunkserver(&self, cs: ChunkServerRecord) -> StoreResult<()> {
        check_id("chunkserver", cs.id)?;
        if !self.servers.contains_key(&cs.server_id) {
            return Err(StoreError::ServerNotFound(cs.server_id));
        }
        debug!(chunkserver = cs.id, server = cs.server_id, "Adding chunkserver");
        insert_new(&self.chunkservers, cs.id, cs, "chunkserver")
    }

    /// Adds a copyset. Its logical pool must exist.
    ///
    /// # Errors
    ///
    /// Rejects uninitialized ids, duplicates and unknown pools.
    pub fn add_copyset(&self, copyset: CopysetRecord) -> StoreResult<()> {
        check_id("copyset", copyset.key.copyset_id)?;
        if !self.pools.contains_key(&copyset.key.pool_id) {
            return Err(StoreError::PoolNotFound(copyset.key.pool_id));
        }
        insert_new(&self.copysets, copyset.key, copyset, "copyset")
    }

    /// Marks a logical pool as ready (or not) for scheduling.
    ///
    /// # Errors
    ///
    /// `PoolNotFound` if the pool is unknown.
    pub fn set_pool_available(&self, id: PoolId, available: bool) -> StoreResult<()> {
        let mut pool = self.pools.get_mut(&id).ok_or(StoreError::PoolNotFound(id))?;
        pool.available = available;
        Ok(())
    }

    /// Applies `f` to a chunkserver record in place.
    ///
    /// # Errors
    ///
    /// `ChunkServerNotFound` if the chunkserver is unknown.
    pub fn update_chunkserver<F>(&self, id: ChunkServerId, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ChunkServerRecord),
    {
        let mut cs = self.chunkservers.get_mut(&id).ok_or(StoreError::ChunkServerNotFound(id))?;
        f(cs.value_mut());
        cs.id = id;
        Ok(())
    }

    /// Removes a server, leaving its chunkservers dangling.
    ///
    /// Returns the removed record.
    pub fn remove_server(&self, id: ServerId) -> Option<ServerRecord> {
        self.servers.remove(&id).map(|(_, server)| server)
    }

    /// Removes a chunkserver. Copysets keep referencing it until a report
    /// drops it from their membership.
    pub fn remove_chunkserver(&self, id: ChunkServerId) -> Option<ChunkServerRecord> {
        self.chunkservers.remove(&id).map(|(_, cs)| cs)
    }

    /// Applies a heartbeat membership report for a copyset.
    ///
    /// The recorded configuration change is kept; reconciling it against the
    /// new membership is the adapter's job.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound` for unknown copysets and `StaleEpoch` when the
    /// report is older than what the store holds.
    pub fn report_copyset(
        &self,
        key: CopysetKey,
        epoch: Epoch,
        leader: Option<ChunkServerId>,
        peers: Vec<ChunkServerId>,
    ) -> StoreResult<()> {
        let mut copyset = self.copysets.get_mut(&key).ok_or(StoreError::CopysetNotFound(key))?;
        if epoch < copyset.epoch {
            return Err(StoreError::StaleEpoch { key, expected: epoch, actual: copyset.epoch });
        }

        if epoch > copyset.epoch {
            debug!(copyset = %key, from = copyset.epoch, to = epoch, "Copyset epoch advanced");
        }
        copyset.epoch = epoch;
        copyset.leader = leader;
        copyset.peers = peers;
        Ok(())
    }
}

fn check_id(entity: &'static str, id: u32) -> StoreResult<()> {
    if id == UNINITIALIZED_ID {
        return Err(StoreError::UninitializedId { entity });
    }
    Ok(())
}

fn insert_new<K, V>(map: &DashMap<K, V>, key: K, value: V, entity: &'static str) -> StoreResult<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
{
    match map.entry(key) {
        Entry::Occupied(e) => Err(StoreError::duplicate(entity, e.key())),
        Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}

impl TopologyStore for MemoryTopologyStore {
    fn logical_pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<_> = self.pools.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    fn logical_pool(&self, id: PoolId) -> Option<LogicalPoolRecord> {
        self.pools.get(&id).map(|p| p.clone())
    }

    fn zone(&self, id: ZoneId) -> Option<ZoneRecord> {
        self.zones.get(&id).map(|z| z.clone())
    }

    fn server(&self, id: ServerId) -> Option<ServerRecord> {
        self.servers.get(&id).map(|s| s.clone())
    }

    fn chunkserver(&self, id: ChunkServerId) -> Option<ChunkServerRecord> {
        self.chunkservers.get(&id).map(|cs| cs.clone())
    }

    fn chunkservers(&self) -> Vec<ChunkServerRecord> {
        let mut all: Vec<_> = self.chunkservers.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|cs| cs.id);
        all
    }

    fn copyset(&self, key: CopysetKey) -> Option<CopysetRecord> {
        self.copysets.get(&key).map(|c| c.clone())
    }

    fn copysets(&self) -> Vec<CopysetRecord> {
        let mut all: Vec<_> = self.copysets.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|c| c.key);
        all
    }
}

impl ConfigChangeStore for MemoryTopologyStore {
    fn begin_change(
        &self,
        key: CopysetKey,
        expected_epoch: Epoch,
        change: ConfigChangeInfo,
    ) -> StoreResult<PendingChangeRecord> {
        let mut copyset = self.copysets.get_mut(&key).ok_or(StoreError::CopysetNotFound(key))?;
        if copyset.epoch != expected_epoch {
            return Err(StoreError::StaleEpoch {
                key,
                expected: expected_epoch,
                actual: copyset.epoch,
            });
        }
        if let Some(existing) = &copyset.pending {
            return Err(StoreError::ChangeInFlight { key, existing: existing.change.clone() });
        }

        let record = PendingChangeRecord::new(change, expected_epoch);
        copyset.pending = Some(record.clone());
        debug!(copyset = %key, change = %record.change, "Recorded configuration change");
        Ok(record)
    }

    fn clear_change(&self, key: CopysetKey, observed: &PendingChangeRecord) -> StoreResult<bool> {
        let mut copyset = self.copysets.get_mut(&key).ok_or(StoreError::CopysetNotFound(key))?;
        if copyset.pending.as_ref() == Some(observed) {
            copyset.pending = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn cancel_change(&self, key: CopysetKey) -> StoreResult<Option<PendingChangeRecord>> {
        let mut copyset = self.copysets.get_mut(&key).ok_or(StoreError::CopysetNotFound(key))?;
        Ok(copyset.pending.take())
    }

    fn pending_changes(&self) -> Vec<(CopysetKey, PendingChangeRecord)> {
        let mut pending: Vec<_> = self
            .copysets
            .iter()
            .filter_map(|e| e.value().pending.clone().map(|p| (*e.key(), p)))
            .collect();
        pending.sort_by_key(|(key, _)| *key);
        pending
    }
}
