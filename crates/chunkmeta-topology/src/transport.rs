// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! RPC transport to chunkservers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chunkmeta_core::{ChunkServerId, CopysetKey};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Network identity of one replica of a replication group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaEndpoint {
    /// Chunkserver id.
    pub id: ChunkServerId,
    /// Listen address.
    pub ip: String,
    /// Listen port.
    pub port: u16,
}

impl ReplicaEndpoint {
    /// Creates a new endpoint.
    pub fn new(id: ChunkServerId, ip: impl Into<String>, port: u16) -> Self {
        Self { id, ip: ip.into(), port }
    }
}

/// Renders the replication-group peer form `ip:port:0`; the trailing index
/// is always zero because each chunkserver hosts one replica per copyset.
impl fmt::Display for ReplicaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:0", self.ip, self.port)
    }
}

/// Issues replication-group RPCs to chunkservers.
///
/// Retry and backoff are the implementation's business; callers see one
/// outcome per call.
#[async_trait]
pub trait ReplicationGroupTransport: Send + Sync {
    /// Asks `target` to instantiate the replication group for `key` with the
    /// given peer list, without joining it yet.
    async fn create_replication_group(
        &self,
        target: &ReplicaEndpoint,
        key: CopysetKey,
        peers: &[ReplicaEndpoint],
        timeout: Duration,
    ) -> Result<(), TransportError>;
}

/// A transport that accepts every request, for testing.
pub struct NoOpTransport;

#[async_trait]
impl ReplicationGroupTransport for NoOpTransport {
    async fn create_replication_group(
        &self,
        _target: &ReplicaEndpoint,
        _key: CopysetKey,
        _peers: &[ReplicaEndpoint],
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}
