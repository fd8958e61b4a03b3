// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Placement model: the values scheduling policies reason about.
//!
//! Every value here is a snapshot returned by the topology adapter. Mutating
//! one never touches cluster state.

use std::collections::HashSet;
use std::fmt;

use chunkmeta_core::{
    ChunkServerId, ChunkServerStatistics, ChunkServerStatus, ConfigChangeInfo, ConfigChangeType,
    CopysetKey, CopysetStatistics, DiskState, Epoch, OnlineState, ServerId, ZoneId,
    UNINITIALIZED_ID,
};
use chunkmeta_topology::ReplicaEndpoint;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A chunkserver as a replication-group participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Chunkserver id.
    pub id: ChunkServerId,
    /// Zone the chunkserver's server lives in.
    pub zone_id: ZoneId,
    /// Server the chunkserver runs on.
    pub server_id: ServerId,
    /// Listen address.
    pub ip: String,
    /// Listen port.
    pub port: u16,
}

impl PeerInfo {
    /// Creates a peer.
    pub fn new(
        id: ChunkServerId,
        zone_id: ZoneId,
        server_id: ServerId,
        ip: impl Into<String>,
        port: u16,
    ) -> Self {
        Self { id, zone_id, server_id, ip: ip.into(), port }
    }

    /// Returns the RPC endpoint of this peer.
    pub fn endpoint(&self) -> ReplicaEndpoint {
        ReplicaEndpoint::new(self.id, self.ip.clone(), self.port)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.id == UNINITIALIZED_ID {
            return Err(ModelError::UninitializedId { entity: "chunkserver" });
        }
        Ok(())
    }
}

/// A configuration change in flight together with its candidate peer.
///
/// Descriptor and candidate travel together, so a copyset cannot carry one
/// without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// The chunkserver the change targets.
    pub candidate: PeerInfo,
    /// The change descriptor.
    pub change: ConfigChangeInfo,
}

/// Whether a copyset is mid-change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    /// No configuration change in flight.
    Stable,
    /// A configuration change has been submitted and not yet observed.
    Pending,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// A copyset as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopysetInfo {
    /// Copyset key.
    pub key: CopysetKey,
    /// True once the owning logical pool finished initial copyset creation.
    pub pool_available: bool,
    /// Configuration epoch.
    pub epoch: Epoch,
    /// Current leader, if known.
    pub leader: Option<ChunkServerId>,
    /// Member peers. Order carries no meaning.
    pub peers: Vec<PeerInfo>,
    /// Configuration change in flight.
    pub pending: Option<PendingChange>,
    /// Operation counters.
    pub statistics: CopysetStatistics,
}

impl CopysetInfo {
    /// Creates a steady-state copyset with no statistics.
    pub fn new(
        key: CopysetKey,
        epoch: Epoch,
        leader: Option<ChunkServerId>,
        peers: Vec<PeerInfo>,
    ) -> Self {
        Self {
            key,
            pool_available: true,
            epoch,
            leader,
            peers,
            pending: None,
            statistics: CopysetStatistics::default(),
        }
    }

    /// Attaches a pending change.
    #[must_use]
    pub fn with_pending(mut self, candidate: PeerInfo, change: ConfigChangeInfo) -> Self {
        self.pending = Some(PendingChange { candidate, change });
        self
    }

    /// Returns true if `id` is a member. The candidate does not count.
    pub fn contains_peer(&self, id: ChunkServerId) -> bool {
        self.peers.iter().any(|p| p.id == id)
    }

    /// Returns true while a configuration change is in flight.
    pub fn has_candidate(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the candidate peer, if any.
    pub fn candidate(&self) -> Option<&PeerInfo> {
        self.pending.as_ref().map(|p| &p.candidate)
    }

    /// Returns the change descriptor, if any.
    pub fn config_change(&self) -> Option<&ConfigChangeInfo> {
        self.pending.as_ref().map(|p| &p.change)
    }

    /// Returns whether the copyset is mid-change.
    pub fn change_state(&self) -> ChangeState {
        if self.has_candidate() {
            ChangeState::Pending
        } else {
            ChangeState::Stable
        }
    }

    /// Returns the member ids in the stored order.
    pub fn peer_ids(&self) -> Vec<ChunkServerId> {
        self.peers.iter().map(|p| p.id).collect()
    }

    /// Checks the model invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.key.copyset_id == UNINITIALIZED_ID {
            return Err(ModelError::UninitializedId { entity: "copyset" });
        }

        let mut seen = HashSet::with_capacity(self.peers.len());
        for peer in &self.peers {
            peer.validate()?;
            if !seen.insert(peer.id) {
                return Err(ModelError::DuplicatePeer(peer.id));
            }
        }

        let Some(pending) = &self.pending else {
            // Steady state: a known leader must be a member.
            if let Some(leader) = self.leader {
                if !self.contains_peer(leader) {
                    return Err(ModelError::LeaderNotMember(leader));
                }
            }
            return Ok(());
        };

        pending.candidate.validate()?;
        let candidate = pending.candidate.id;
        let change = &pending.change;
        if candidate != change.target {
            return Err(ModelError::CandidateMismatch { candidate, target: change.target });
        }

        match change.kind {
            ConfigChangeType::AddPeer => {
                if self.contains_peer(candidate) {
                    return Err(ModelError::CandidateIsMember(candidate));
                }
            }
            ConfigChangeType::ChangePeer => {
                if self.contains_peer(candidate) {
                    return Err(ModelError::CandidateIsMember(candidate));
                }
                let replaced = change.replaced.ok_or(ModelError::MissingReplaced)?;
                if !self.contains_peer(replaced) {
                    return Err(ModelError::ReplacedNotMember(replaced));
                }
            }
            ConfigChangeType::RemovePeer | ConfigChangeType::TransferLeader => {
                if !self.contains_peer(candidate) {
                    return Err(ModelError::CandidateNotMember(candidate));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for CopysetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "copyset {} epoch={} leader=", self.key, self.epoch)?;
        match self.leader {
            Some(leader) => write!(f, "{leader}")?,
            None => f.write_str("none")?,
        }
        f.write_str(" peers=[")?;
        for (i, peer) in self.peers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", peer.id)?;
        }
        f.write_str("]")?;
        match &self.pending {
            Some(pending) => {
                write!(f, " candidate={} change={}", pending.candidate.id, pending.change)
            }
            None => f.write_str(" candidate=none"),
        }
    }
}

/// A chunkserver as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkServerInfo {
    /// Identity and address.
    pub info: PeerInfo,
    /// Process start time, seconds since the epoch.
    pub start_up_time: u64,
    /// Heartbeat-derived liveness.
    pub state: OnlineState,
    /// Disk health.
    pub disk_state: DiskState,
    /// Operational status.
    pub status: ChunkServerStatus,
    /// Copysets this chunkserver leads.
    pub leader_count: u32,
    /// Disk capacity in bytes.
    pub disk_capacity: u64,
    /// Used disk bytes.
    pub disk_used: u64,
    /// Recent I/O statistics.
    pub statistics: ChunkServerStatistics,
}

impl ChunkServerInfo {
    /// Creates an online, read-write chunkserver with a healthy empty disk.
    pub fn new(info: PeerInfo) -> Self {
        Self {
            info,
            start_up_time: 0,
            state: OnlineState::Online,
            disk_state: DiskState::Normal,
            status: ChunkServerStatus::ReadWrite,
            leader_count: 0,
            disk_capacity: 0,
            disk_used: 0,
            statistics: ChunkServerStatistics::default(),
        }
    }

    /// Returns the chunkserver id.
    pub fn id(&self) -> ChunkServerId {
        self.info.id
    }

    /// Heartbeats arrive on time.
    pub fn is_online(&self) -> bool {
        self.state == OnlineState::Online
    }

    /// Heartbeats have been missing beyond the offline threshold.
    pub fn is_offline(&self) -> bool {
        self.state == OnlineState::Offline
    }

    /// Heartbeats are late but the node is not yet offline.
    pub fn is_unstable(&self) -> bool {
        self.state == OnlineState::Unstable
    }

    /// The node is being drained and must not receive new replicas.
    pub fn is_pending(&self) -> bool {
        self.status == ChunkServerStatus::Pending
    }

    /// Online, read-write and with a usable disk.
    pub fn is_healthy(&self) -> bool {
        self.is_online()
            && self.status == ChunkServerStatus::ReadWrite
            && self.disk_state == DiskState::Normal
    }

    /// Checks the model invariants.
    ///
    /// # Errors
    ///
    /// Rejects the uninitialized chunkserver id.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.info.validate()
    }
}

/// A configuration-change request derived from a copyset snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopysetConf {
    /// Copyset key.
    pub key: CopysetKey,
    /// Epoch the request was built against.
    pub epoch: Epoch,
    /// Members at that epoch.
    pub peers: Vec<PeerInfo>,
    /// The requested change.
    pub change: ConfigChangeInfo,
}

impl CopysetConf {
    /// Builds a request for `change` against the snapshot `copyset`.
    pub fn new(copyset: &CopysetInfo, change: ConfigChangeInfo) -> Self {
        Self { key: copyset.key, epoch: copyset.epoch, peers: copyset.peers.clone(), change }
    }
}
