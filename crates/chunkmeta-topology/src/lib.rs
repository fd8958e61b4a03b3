// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Collaborator contracts consumed by the chunkmeta scheduling layer.
//!
//! This crate describes the parts of the metadata server the scheduler
//! reads from and writes through, without owning any of them:
//! - [`TopologyStore`]: pools, zones, servers, chunkservers and copysets
//! - [`ConfigChangeStore`]: the per-copyset configuration-change slot
//! - [`StatisticsCollector`]: heartbeat-derived statistics
//! - [`ReplicationGroupTransport`]: RPCs to chunkservers
//!
//! [`MemoryTopologyStore`] and [`MemoryStatisticsCollector`] implement the
//! store and collector in memory, and [`TopologySnapshot`] is the JSON form
//! of a whole topology.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod records;
pub mod stats;
pub mod store;
pub mod transport;

pub use error::{StoreError, StoreResult, TransportError};
pub use memory::{MemoryTopologyStore, TopologySnapshot};
pub use records::{
    ChunkServerRecord, CopysetRecord, LogicalPoolRecord, PendingChangeRecord, PoolConfig,
    ServerRecord, ZoneRecord,
};
pub use stats::{MemoryStatisticsCollector, NoOpStatisticsCollector, StatisticsCollector};
pub use store::{ConfigChangeStore, TopologyStore};
pub use transport::{NoOpTransport, ReplicaEndpoint, ReplicationGroupTransport};
