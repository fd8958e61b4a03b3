// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Scatter-width computation.
//!
//! The scatter map of a chunkserver counts, for every other chunkserver,
//! how many copysets the two share. Its scatter width is the number of
//! entries: how many peers would take part in rebuilding its replicas.

use std::collections::{BTreeMap, BTreeSet};

use chunkmeta_core::ChunkServerId;

use crate::model::CopysetInfo;

/// Peer id to number of shared copysets, ordered by peer id.
pub type ScatterMap = BTreeMap<ChunkServerId, u32>;

/// Computes the scatter map of `cs` over `copysets`, the copysets residing
/// on it.
///
/// Every member other than `cs` is counted once per copyset. Candidates are
/// not members and do not count.
pub fn scatter_map(cs: ChunkServerId, copysets: &[CopysetInfo]) -> ScatterMap {
    let mut map = ScatterMap::new();
    for copyset in copysets {
        let others: BTreeSet<_> =
            copyset.peers.iter().map(|p| p.id).filter(|id| *id != cs).collect();
        for peer in others {
            *map.entry(peer).or_insert(0) += 1;
        }
    }
    map
}

/// Returns the scatter width of a scatter map.
pub fn scatter_width(map: &ScatterMap) -> u32 {
    u32::try_from(map.len()).unwrap_or(u32::MAX)
}

/// Integer mean of `widths`, or 0 when there are none.
pub fn average_scatter_width<I>(widths: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    let (sum, count) =
        widths.into_iter().fold((0u64, 0u64), |(sum, count), w| (sum + u64::from(w), count + 1));
    if count == 0 {
        return 0;
    }
    u32::try_from(sum / count).unwrap_or(u32::MAX)
}
