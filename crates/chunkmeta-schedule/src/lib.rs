// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Scheduler-facing view of cluster topology.
//!
//! This crate sits between scheduling policies (replica recovery, rebalance,
//! leader balancing) and the cluster's topology store:
//! - [`model`]: copysets, chunkservers and peers as policies see them
//! - [`scatter`]: scatter-width, the replica-diversification metric
//! - [`adapter`]: the [`TopoAdapter`] query and conversion contract
//! - [`dispatcher`]: two-phase configuration changes and their tracking
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chunkmeta_schedule::{TopoAdapter, TopoAdapterImpl};
//! use chunkmeta_topology::{MemoryTopologyStore, NoOpStatisticsCollector};
//!
//! let store = Arc::new(MemoryTopologyStore::new());
//! let adapter = TopoAdapterImpl::new(store, Arc::new(NoOpStatisticsCollector));
//!
//! for pool in adapter.logical_pools() {
//!     println!("pool {pool}: avg scatter width {}", adapter.average_scatter_width(pool));
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod scatter;

pub use adapter::{StaticTopoAdapter, TopoAdapter, TopoAdapterImpl};
pub use dispatcher::{ConfigChangeDispatcher, DispatchEvent, DispatcherConfig, ReconcileSummary};
pub use error::{ModelError, ScheduleError, ScheduleResult};
pub use model::{
    ChangeState, ChunkServerInfo, CopysetConf, CopysetInfo, PeerInfo, PendingChange,
};
pub use scatter::{average_scatter_width, scatter_map, scatter_width, ScatterMap};
