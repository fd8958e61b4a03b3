// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Reports built from the scheduler's view of a topology snapshot.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chunkmeta_core::{ChunkServerId, CopysetId, Epoch, PoolId, ServerId, ZoneId};
use chunkmeta_schedule::{
    scatter_width, ChunkServerInfo, CopysetInfo, ScatterMap, TopoAdapter, TopoAdapterImpl,
};
use chunkmeta_topology::{MemoryTopologyStore, NoOpStatisticsCollector, TopologySnapshot};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::OutputFormat;

/// Loads a JSON snapshot and wraps it in a topology adapter.
pub fn load_adapter(path: &Path) -> Result<TopoAdapterImpl> {
    let snapshot = TopologySnapshot::from_file(path)
        .with_context(|| format!("Failed to read topology snapshot {}", path.display()))?;
    debug!(
        path = %path.display(),
        pools = snapshot.pools.len(),
        chunkservers = snapshot.chunkservers.len(),
        copysets = snapshot.copysets.len(),
        "Loaded topology snapshot"
    );
    let store =
        MemoryTopologyStore::from_snapshot(snapshot).context("Invalid topology snapshot")?;
    Ok(TopoAdapterImpl::new(Arc::new(store), Arc::new(NoOpStatisticsCollector)))
}

/// Per-pool summary.
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolReport {
    /// Logical pool id.
    pub id: PoolId,
    /// Whether the pool has copysets and all of them have been created.
    pub available: bool,
    /// Standard replica count.
    pub replica_count: u32,
    /// Standard zone count.
    pub zone_count: u32,
    /// Chunkservers serving the pool.
    pub chunkservers: usize,
    /// How many of them are healthy.
    pub healthy_chunkservers: usize,
    /// Copysets in the pool.
    pub copysets: usize,
    /// Copysets with a configuration change in flight.
    pub pending_changes: usize,
    /// Average scatter width of the pool's chunkservers.
    pub average_scatter_width: u32,
}

/// One chunkserver as the scheduler sees it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkServerSummary {
    /// Chunkserver id.
    pub id: ChunkServerId,
    /// Replication endpoint (`ip:port:0`).
    pub endpoint: String,
    /// Zone of the owning server.
    pub zone_id: ZoneId,
    /// Owning server.
    pub server_id: ServerId,
    /// Liveness (online, offline, unstable).
    pub state: String,
    /// Whether the scheduler may place replicas on it.
    pub healthy: bool,
    /// Copysets it is a member of.
    pub copysets: usize,
}

/// Output of `inspect`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectReport {
    /// Logical pools, by id.
    pub pools: Vec<PoolReport>,
    /// Chunkservers, by id.
    pub chunkservers: Vec<ChunkServerSummary>,
}

/// Output of `scatter`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScatterReport {
    /// Chunkserver the map was built for.
    pub chunkserver: ChunkServerId,
    /// Copysets it is a member of.
    pub copysets: usize,
    /// Number of distinct peers.
    pub scatter_width: u32,
    /// Peer id to shared-copyset count.
    pub peers: ScatterMap,
}

/// One copyset line of `copysets`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CopysetSummary {
    /// Logical pool id.
    pub pool_id: PoolId,
    /// Copyset id within the pool.
    pub copyset_id: CopysetId,
    /// Configuration epoch.
    pub epoch: Epoch,
    /// Current leader, if known.
    pub leader: Option<ChunkServerId>,
    /// Member ids.
    pub peers: Vec<ChunkServerId>,
    /// Whether the owning pool is schedulable.
    pub pool_available: bool,
    /// Candidate of the change in flight.
    pub candidate: Option<ChunkServerId>,
    /// The change in flight, rendered.
    pub change: Option<String>,
}

impl From<&CopysetInfo> for CopysetSummary {
    fn from(copyset: &CopysetInfo) -> Self {
        Self {
            pool_id: copyset.key.pool_id,
            copyset_id: copyset.key.copyset_id,
            epoch: copyset.epoch,
            leader: copyset.leader,
            peers: copyset.peer_ids(),
            pool_available: copyset.pool_available,
            candidate: copyset.candidate().map(|p| p.id),
            change: copyset.config_change().map(ToString::to_string),
        }
    }
}

fn summarize_chunkserver(adapter: &dyn TopoAdapter, cs: &ChunkServerInfo) -> ChunkServerSummary {
    ChunkServerSummary {
        id: cs.id(),
        endpoint: cs.info.endpoint().to_string(),
        zone_id: cs.info.zone_id,
        server_id: cs.info.server_id,
        state: format!("{:?}", cs.state).to_lowercase(),
        healthy: cs.is_healthy(),
        copysets: adapter.copysets_on_chunkserver(cs.id()).len(),
    }
}

/// Builds the pool and chunkserver overview.
pub fn inspect(adapter: &dyn TopoAdapter) -> InspectReport {
    let pools = adapter
        .logical_pools()
        .into_iter()
        .map(|id| {
            let chunkservers = adapter.chunkservers_in_pool(id);
            let copysets = adapter.copysets_in_pool(id);
            PoolReport {
                id,
                available: copysets.iter().any(|c| c.pool_available),
                replica_count: adapter.standard_replica_count(id),
                zone_count: adapter.standard_zone_count(id),
                chunkservers: chunkservers.len(),
                healthy_chunkservers: chunkservers.iter().filter(|cs| cs.is_healthy()).count(),
                copysets: copysets.len(),
                pending_changes: copysets.iter().filter(|c| c.has_candidate()).count(),
                average_scatter_width: adapter.average_scatter_width(id),
            }
        })
        .collect();

    let chunkservers =
        adapter.chunkservers().iter().map(|cs| summarize_chunkserver(adapter, cs)).collect();

    InspectReport { pools, chunkservers }
}

/// Builds the scatter report of one chunkserver.
pub fn scatter(adapter: &dyn TopoAdapter, id: ChunkServerId) -> Result<ScatterReport> {
    if adapter.chunkserver(id).is_none() {
        anyhow::bail!("Chunkserver {id} not found");
    }
    let peers = adapter.chunkserver_scatter_map(id);
    Ok(ScatterReport {
        chunkserver: id,
        copysets: adapter.copysets_on_chunkserver(id).len(),
        scatter_width: scatter_width(&peers),
        peers,
    })
}

/// Lists copysets of one pool, or of every pool.
pub fn copysets(adapter: &dyn TopoAdapter, pool: Option<PoolId>) -> Vec<CopysetSummary> {
    let pools = match pool {
        Some(id) => vec![id],
        None => adapter.logical_pools(),
    };
    pools
        .into_iter()
        .flat_map(|id| adapter.copysets_in_pool(id))
        .map(|c| CopysetSummary::from(&c))
        .collect()
}

/// Prints a report as pretty JSON or through `text`.
pub fn emit<T, F>(report: &T, format: OutputFormat, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => text(report),
    }
    Ok(())
}

/// Print the inspect report in human-readable format.
pub fn print_inspect(report: &InspectReport) {
    println!("\n  Logical Pools");
    println!("  ─────────────────────────────────────────────────────────────");
    println!(
        "  {:>6}  {:>9}  {:>8}  {:>5}  {:>13}  {:>8}  {:>7}  {:>7}",
        "ID", "AVAILABLE", "REPLICAS", "ZONES", "CHUNKSERVERS", "COPYSETS", "PENDING", "SCATTER"
    );
    for pool in &report.pools {
        println!(
            "  {:>6}  {:>9}  {:>8}  {:>5}  {:>13}  {:>8}  {:>7}  {:>7}",
            pool.id,
            if pool.available { "yes" } else { "no" },
            pool.replica_count,
            pool.zone_count,
            format!("{}/{}", pool.healthy_chunkservers, pool.chunkservers),
            pool.copysets,
            pool.pending_changes,
            pool.average_scatter_width,
        );
    }

    println!("\n  Chunkservers");
    println!("  ─────────────────────────────────────────────────────────────");
    println!(
        "  {:>6}  {:>6}  {:>6}  {:>9}  {:>7}  {:>8}  {}",
        "ID", "ZONE", "SERVER", "STATE", "HEALTHY", "COPYSETS", "ENDPOINT"
    );
    for cs in &report.chunkservers {
        println!(
            "  {:>6}  {:>6}  {:>6}  {:>9}  {:>7}  {:>8}  {}",
            cs.id,
            cs.zone_id,
            cs.server_id,
            cs.state,
            if cs.healthy { "yes" } else { "no" },
            cs.copysets,
            cs.endpoint
        );
    }
    println!();
}

/// Print the scatter report in human-readable format.
pub fn print_scatter(report: &ScatterReport) {
    println!("\n  Chunkserver {}", report.chunkserver);
    println!("  ─────────────────────────────────────────────");
    println!("  Copysets:       {}", report.copysets);
    println!("  Scatter Width:  {}", report.scatter_width);
    if !report.peers.is_empty() {
        println!();
        println!("  {:>6}  {:>15}", "PEER", "SHARED COPYSETS");
        for (peer, shared) in &report.peers {
            println!("  {peer:>6}  {shared:>15}");
        }
    }
    println!();
}

/// Print copyset summaries in human-readable format.
pub fn print_copysets(copysets: &[CopysetSummary]) {
    if copysets.is_empty() {
        println!("No copysets.");
        return;
    }
    println!("  {:>10}  {:>6}  {:>6}  {:<16}  {}", "COPYSET", "EPOCH", "LEADER", "PEERS", "CHANGE");
    for c in copysets {
        let peers = c.peers.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        let leader = c.leader.map_or_else(|| "-".to_string(), |id| id.to_string());
        let mut change = c.change.clone().unwrap_or_else(|| "-".to_string());
        if !c.pool_available {
            change.push_str(" (pool not ready)");
        }
        println!(
            "  {:>10}  {:>6}  {:>6}  {:<16}  {}",
            format!("({},{})", c.pool_id, c.copyset_id),
            c.epoch,
            leader,
            peers,
            change
        );
    }
}
