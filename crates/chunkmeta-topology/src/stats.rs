// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Heartbeat statistics collaborators.

use chunkmeta_core::{ChunkServerId, ChunkServerStatistics, CopysetKey, CopysetStatistics};
use dashmap::DashMap;

/// Source of per-chunkserver and per-copyset statistics.
///
/// Best effort: unknown ids yield zeroed statistics, and calls never block
/// on collection.
pub trait StatisticsCollector: Send + Sync {
    /// Returns the latest statistics for a chunkserver.
    fn chunkserver_stats(&self, id: ChunkServerId) -> ChunkServerStatistics;

    /// Returns the latest statistics for a copyset.
    fn copyset_stats(&self, key: CopysetKey) -> CopysetStatistics;
}

/// A collector that knows nothing.
pub struct NoOpStatisticsCollector;

impl StatisticsCollector for NoOpStatisticsCollector {
    fn chunkserver_stats(&self, _id: ChunkServerId) -> ChunkServerStatistics {
        ChunkServerStatistics::default()
    }

    fn copyset_stats(&self, _key: CopysetKey) -> CopysetStatistics {
        CopysetStatistics::default()
    }
}

/// In-memory collector fed by heartbeat processing.
#[derive(Default)]
pub struct MemoryStatisticsCollector {
    chunkservers: DashMap<ChunkServerId, ChunkServerStatistics>,
    copysets: DashMap<CopysetKey, CopysetStatistics>,
}

impl MemoryStatisticsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the statistics of a chunkserver.
    pub fn record_chunkserver(&self, id: ChunkServerId, stats: ChunkServerStatistics) {
        self.chunkservers.insert(id, stats);
    }

    /// Replaces the statistics of a copyset.
    pub fn record_copyset(&self, key: CopysetKey, stats: CopysetStatistics) {
        self.copysets.insert(key, stats);
    }
}

impl StatisticsCollector for MemoryStatisticsCollector {
    fn chunkserver_stats(&self, id: ChunkServerId) -> ChunkServerStatistics {
        self.chunkservers.get(&id).map(|s| *s).unwrap_or_default()
    }

    fn copyset_stats(&self, key: CopysetKey) -> CopysetStatistics {
        self.copysets.get(&key).map(|s| *s).unwrap_or_default()
    }
}
