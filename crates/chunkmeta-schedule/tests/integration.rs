// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Integration tests for the topology adapter and config-change dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chunkmeta_core::{
    ChunkServerId, ChunkServerStatus, ConfigChangeInfo, CopysetKey, DiskState, OnlineState,
};
use chunkmeta_schedule::{
    scatter_width, ChangeState, ChunkServerInfo, ConfigChangeDispatcher, CopysetConf, CopysetInfo,
    DispatchEvent, DispatcherConfig, PeerInfo, ScatterMap, ScheduleError, StaticTopoAdapter,
    TopoAdapter, TopoAdapterImpl,
};
use chunkmeta_topology::{
    ChunkServerRecord, ConfigChangeStore, CopysetRecord, LogicalPoolRecord, MemoryTopologyStore,
    NoOpStatisticsCollector, ReplicaEndpoint, ReplicationGroupTransport, ServerRecord,
    TopologyStore, TransportError, ZoneRecord,
};
use parking_lot::Mutex;

/// Transport mock that records every call.
#[derive(Default)]
struct RecordingTransport {
    calls: AtomicUsize,
    delay: Option<Duration>,
    reject: bool,
    last: Mutex<Option<(ReplicaEndpoint, CopysetKey, Vec<ReplicaEndpoint>)>>,
}

impl RecordingTransport {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplicationGroupTransport for RecordingTransport {
    async fn create_replication_group(
        &self,
        target: &ReplicaEndpoint,
        key: CopysetKey,
        peers: &[ReplicaEndpoint],
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((target.clone(), key, peers.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject {
            return Err(TransportError::AlreadyExists { chunkserver: target.id, key });
        }
        Ok(())
    }
}

fn pool(id: u32, physical_pool_id: u32, available: bool) -> LogicalPoolRecord {
    LogicalPoolRecord {
        id,
        name: format!("pool{id}"),
        physical_pool_id,
        replica_count: 3,
        zone_count: 3,
        available,
    }
}

/// Pools 1 (ready) and 2 (bootstrapping) share physical pool 1; pool 3 sits
/// on an empty physical pool. Chunkservers 1-6 spread over three servers,
/// one per zone.
fn store() -> Arc<MemoryTopologyStore> {
    let store = MemoryTopologyStore::new();
    store.add_logical_pool(pool(1, 1, true)).unwrap();
    store.add_logical_pool(pool(2, 1, false)).unwrap();
    store.add_logical_pool(pool(3, 9, true)).unwrap();
    for i in 1..=3 {
        store.add_zone(ZoneRecord { id: i, name: format!("zone{i}"), physical_pool_id: 1 }).unwrap();
        store
            .add_server(ServerRecord {
                id: i,
                hostname: format!("node{i}"),
                internal_ip: format!("10.0.0.{i}"),
                zone_id: i,
            })
            .unwrap();
    }
    for id in 1..=6 {
        let server_id = (id - 1) % 3 + 1;
        store
            .add_chunkserver(ChunkServerRecord {
                id,
                server_id,
                host_ip: format!("10.0.0.{server_id}"),
                port: 8200 + u16::try_from(id).unwrap(),
                start_up_time: 0,
                online_state: OnlineState::Online,
                disk_state: DiskState::Normal,
                status: ChunkServerStatus::ReadWrite,
                disk_capacity: 1 << 30,
                disk_used: 0,
            })
            .unwrap();
    }
    let copysets = [
        ((1, 1), 1, vec![1, 2, 3]),
        ((1, 2), 4, vec![4, 5, 6]),
        ((1, 3), 5, vec![1, 5, 6]),
        ((2, 1), 2, vec![1, 2, 6]),
    ];
    for (key, leader, peers) in copysets {
        store.add_copyset(CopysetRecord::new(key.into(), 1, Some(leader), peers)).unwrap();
    }
    Arc::new(store)
}

fn adapter(store: &Arc<MemoryTopologyStore>) -> Arc<TopoAdapterImpl> {
    Arc::new(TopoAdapterImpl::new(store.clone(), Arc::new(NoOpStatisticsCollector)))
}

fn dispatcher(
    store: &Arc<MemoryTopologyStore>,
    transport: &Arc<RecordingTransport>,
    config: DispatcherConfig,
) -> ConfigChangeDispatcher {
    ConfigChangeDispatcher::new(config, adapter(store), store.clone(), transport.clone())
}

fn keys(copysets: &[CopysetInfo]) -> Vec<CopysetKey> {
    copysets.iter().map(|c| c.key).collect()
}

#[test]
fn test_list_copysets_only_ready_pools() {
    let store = store();
    let adapter = adapter(&store);

    let ready = adapter.copysets();
    assert!(ready.iter().all(|c| c.key.pool_id != 2));
    assert_eq!(ready.len(), 3);

    let on_one = keys(&adapter.copysets_on_chunkserver(1));
    assert_eq!(on_one, vec![CopysetKey::new(1, 1), CopysetKey::new(1, 3), CopysetKey::new(2, 1)]);
    assert!(!adapter.copyset((2, 1).into()).unwrap().pool_available);

    assert_eq!(adapter.copysets_in_pool(2).len(), 1);
    assert_eq!(adapter.logical_pools(), vec![1, 2, 3]);
}

#[test]
fn test_contains_peer_matches_members() {
    let store = store();
    let adapter = adapter(&store);
    store
        .begin_change((1, 1).into(), 1, ConfigChangeInfo::add_peer(4))
        .unwrap();

    for copyset in adapter.copysets_in_pool(1) {
        let members: Vec<ChunkServerId> = copyset.peer_ids();
        for id in 1..=6 {
            assert_eq!(copyset.contains_peer(id), members.contains(&id), "{copyset}");
        }
    }
    assert!(!adapter.copyset((1, 1).into()).unwrap().contains_peer(4));
}

#[test]
fn test_descriptor_presence_matches_candidate() {
    let store = store();
    let adapter = adapter(&store);
    store
        .begin_change((1, 2).into(), 1, ConfigChangeInfo::transfer_leader(5))
        .unwrap();

    for copyset in adapter.copysets_in_pool(1).into_iter().chain(adapter.copysets_in_pool(2)) {
        assert_eq!(copyset.config_change().is_some(), copyset.has_candidate());
        assert_eq!(copyset.candidate().is_some(), copyset.has_candidate());
        let expected = if copyset.has_candidate() { ChangeState::Pending } else { ChangeState::Stable };
        assert_eq!(copyset.change_state(), expected);
    }
}

#[test]
fn test_scatter_map_through_adapter() {
    let adapter = StaticTopoAdapter::new();
    adapter.add_pool(1, 3, 3, true);
    let peer = |id: ChunkServerId| PeerInfo::new(id, id, id, "127.0.0.1", 8200);
    for id in 1..=6 {
        adapter.insert_chunkserver(1, ChunkServerInfo::new(peer(id)));
    }
    let members: [&[ChunkServerId]; 3] = [&[1, 2, 3], &[1, 2, 3, 4], &[1, 4, 5, 6]];
    for (i, m) in members.iter().enumerate() {
        let id = u32::try_from(i).unwrap() + 1;
        adapter.insert_copyset(CopysetInfo::new(
            (1, id).into(),
            1,
            Some(1),
            m.iter().copied().map(peer).collect(),
        ));
    }

    let map = adapter.chunkserver_scatter_map(1);
    assert_eq!(map, ScatterMap::from([(2, 2), (3, 2), (4, 2), (5, 1), (6, 1)]));
    assert_eq!(scatter_width(&map), 5);
    // Same topology, same answer.
    assert_eq!(adapter.chunkserver_scatter_map(1), map);
}

#[test]
fn test_average_scatter_width() {
    let store = store();
    let adapter = adapter(&store);

    // Widths of chunkservers 1-6 are 4, 3, 2, 2, 3, 4.
    assert_eq!(adapter.average_scatter_width(1), 3);
    assert_eq!(adapter.average_scatter_width(3), 0);
    assert_eq!(adapter.average_scatter_width(42), 0);
}

#[test]
fn test_pool_standards() {
    let store = store();
    let adapter = adapter(&store);
    assert_eq!(adapter.standard_replica_count(1), 3);
    assert_eq!(adapter.standard_zone_count(2), 3);
    assert_eq!(adapter.standard_replica_count(7), 0);
    assert_eq!(adapter.chunkservers_in_pool(1).len(), 6);
    assert!(adapter.chunkservers_in_pool(3).is_empty());
}

#[test]
fn test_health_predicates_on_converted_chunkservers() {
    let store = store();
    store.update_chunkserver(2, |cs| cs.online_state = OnlineState::Offline).unwrap();
    store.update_chunkserver(3, |cs| cs.online_state = OnlineState::Unstable).unwrap();
    store.update_chunkserver(4, |cs| cs.status = ChunkServerStatus::Pending).unwrap();
    store.update_chunkserver(5, |cs| cs.disk_state = DiskState::Error).unwrap();
    let adapter = adapter(&store);

    let healthy: Vec<_> =
        adapter.chunkservers().iter().filter(|cs| cs.is_healthy()).map(|cs| cs.id()).collect();
    assert_eq!(healthy, vec![1, 6]);

    for cs in adapter.chunkservers() {
        if cs.is_healthy() {
            assert!(cs.is_online());
            assert!(!cs.is_pending());
        }
        assert!(!(cs.is_online() && cs.is_offline()));
    }
    assert!(adapter.chunkserver(3).unwrap().is_unstable());
    assert!(adapter.chunkserver(4).unwrap().is_pending());
}

#[test]
fn test_lookup_absent_is_none() {
    let store = store();
    let adapter = adapter(&store);
    assert!(adapter.copyset((9, 9).into()).is_none());
    assert!(adapter.chunkserver(99).is_none());
}

#[test]
fn test_conversion_failure_is_reported() {
    let store = store();
    let adapter = adapter(&store);
    store.remove_chunkserver(3);

    let record = store.copyset((1, 1).into()).unwrap();
    let err = adapter.convert_copyset(&record).unwrap_err();
    assert!(matches!(err, ScheduleError::Conversion { .. }));

    // Lists skip what cannot be converted.
    assert_eq!(keys(&adapter.copysets()), vec![CopysetKey::new(1, 2), CopysetKey::new(1, 3)]);
}

#[tokio::test]
async fn test_change_that_cannot_apply_keeps_copyset_listed() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let key = CopysetKey::new(1, 1);

    // Leadership was to move to 3, but 3 got replaced by 4 first.
    store.begin_change(key, 1, ConfigChangeInfo::transfer_leader(3)).unwrap();
    store.report_copyset(key, 2, Some(1), vec![1, 2, 4]).unwrap();

    let copyset = adapter.copyset(key).unwrap();
    assert_eq!(copyset.change_state(), ChangeState::Stable);
    assert_eq!(
        keys(&adapter.copysets_on_chunkserver(1)),
        vec![key, CopysetKey::new(1, 3), CopysetKey::new(2, 1)]
    );
    assert_eq!(
        adapter.chunkserver_scatter_map(1),
        ScatterMap::from([(2, 2), (4, 1), (5, 1), (6, 2)])
    );

    let summary = dispatcher.reconcile_pending();
    assert_eq!(summary.completed, 1);
    assert!(store.pending_changes().is_empty());
}

#[tokio::test]
async fn test_deregistered_candidate_keeps_copyset_listed() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let key = CopysetKey::new(1, 1);

    store.begin_change(key, 1, ConfigChangeInfo::add_peer(4)).unwrap();
    assert!(adapter.copyset(key).unwrap().has_candidate());
    store.remove_chunkserver(4);

    let copyset = adapter.copyset(key).unwrap();
    assert!(!copyset.has_candidate());
    assert_eq!(copyset.peer_ids(), vec![1, 2, 3]);
    assert!(keys(&adapter.copysets_on_chunkserver(1)).contains(&key));

    assert_eq!(dispatcher.reconcile_pending().completed, 1);
    assert!(store.copyset(key).unwrap().pending.is_none());
}

#[tokio::test]
async fn test_unconvertible_copyset_is_not_reported_missing() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let key = CopysetKey::new(1, 1);
    let conf = CopysetConf::new(&adapter.copyset(key).unwrap(), ConfigChangeInfo::add_peer(4));

    store.remove_server(3);

    let err = dispatcher.prepare_copyset_on_chunkserver(key, 4).await.unwrap_err();
    assert!(matches!(err, ScheduleError::Conversion { .. }), "{err}");
    assert_eq!(transport.calls(), 0);

    let err = dispatcher.submit_change(&conf).unwrap_err();
    assert!(matches!(err, ScheduleError::Conversion { .. }), "{err}");
    assert!(store.pending_changes().is_empty());

    let err = dispatcher.prepare_copyset_on_chunkserver((9, 9).into(), 4).await.unwrap_err();
    assert!(matches!(err, ScheduleError::CopysetNotFound(_)));
}

#[test]
fn test_copyset_conf_preserves_identity() {
    let store = store();
    let adapter = adapter(&store);
    store.report_copyset((1, 3).into(), 7, Some(5), vec![1, 5, 6]).unwrap();

    let record = store.copyset((1, 3).into()).unwrap();
    let copyset = adapter.convert_copyset(&record).unwrap();
    let conf = CopysetConf::new(&copyset, ConfigChangeInfo::remove_peer(1));

    assert_eq!(conf.key.pool_id, record.key.pool_id);
    assert_eq!(conf.key.copyset_id, record.key.copyset_id);
    assert_eq!(conf.epoch, record.epoch);
}

#[tokio::test]
async fn test_second_change_rejected_without_rpc() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let key = CopysetKey::new(1, 1);

    store.begin_change(key, 1, ConfigChangeInfo::add_peer(4)).unwrap();

    let err = dispatcher.prepare_copyset_on_chunkserver(key, 5).await.unwrap_err();
    match err {
        ScheduleError::ChangeInFlight { key: k, existing } => {
            assert_eq!(k, key);
            assert_eq!(existing, ConfigChangeInfo::add_peer(4));
        }
        other => panic!("Expected ChangeInFlight, got {other}"),
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_prepare_sends_current_members() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());

    dispatcher.prepare_copyset_on_chunkserver((1, 1).into(), 4).await.unwrap();

    assert_eq!(transport.calls(), 1);
    let (target, key, peers) = transport.last.lock().clone().unwrap();
    assert_eq!(target.to_string(), "10.0.0.1:8204:0");
    assert_eq!(key, CopysetKey::new(1, 1));
    let peers: Vec<_> = peers.iter().map(|p| p.id).collect();
    assert_eq!(peers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_prepare_transport_failure() {
    let store = store();
    let transport = Arc::new(RecordingTransport { reject: true, ..Default::default() });
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());

    let err = dispatcher.prepare_copyset_on_chunkserver((1, 1).into(), 4).await.unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Transport { chunkserver: 4, source: TransportError::AlreadyExists { .. } }
    ));
    assert!(err.is_transport_failure());
}

#[tokio::test]
async fn test_prepare_timeout_is_failure() {
    let store = store();
    let transport =
        Arc::new(RecordingTransport { delay: Some(Duration::from_secs(5)), ..Default::default() });
    let config = DispatcherConfig {
        create_copyset_timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let dispatcher = dispatcher(&store, &transport, config);
    let mut events = dispatcher.subscribe();

    let err = dispatcher.prepare_copyset_on_chunkserver((1, 1).into(), 4).await.unwrap_err();
    assert!(matches!(err, ScheduleError::Timeout { chunkserver: 4, timeout_ms: 20 }));
    assert_eq!(transport.calls(), 1);

    match events.try_recv().unwrap() {
        DispatchEvent::PrepareFailed { target, .. } => assert_eq!(target, 4),
        other => panic!("Expected PrepareFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_change_lifecycle() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let mut events = dispatcher.subscribe();
    let key = CopysetKey::new(1, 1);

    // Phase 1, then record the change.
    dispatcher.prepare_copyset_on_chunkserver(key, 4).await.unwrap();
    let copyset = adapter.copyset(key).unwrap();
    let conf = CopysetConf::new(&copyset, ConfigChangeInfo::change_peer(4, 1));
    dispatcher.submit_change(&conf).unwrap();

    let pending = adapter.copyset(key).unwrap();
    assert_eq!(pending.change_state(), ChangeState::Pending);
    assert_eq!(pending.candidate().unwrap().id, 4);

    // Nothing observed yet.
    let summary = dispatcher.reconcile_pending();
    assert_eq!((summary.completed, summary.expired, summary.remaining), (0, 0, 1));

    // Heartbeat shows the replacement at a newer epoch.
    store.report_copyset(key, 2, Some(2), vec![2, 3, 4]).unwrap();
    let summary = dispatcher.reconcile_pending();
    assert_eq!(summary.completed, 1);
    assert!(store.pending_changes().is_empty());

    let stable = adapter.copyset(key).unwrap();
    assert_eq!(stable.change_state(), ChangeState::Stable);
    assert_eq!(stable.epoch, 2);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen[2],
        DispatchEvent::ChangeCompleted { key, change: ConfigChangeInfo::change_peer(4, 1) }
    );
}

#[tokio::test]
async fn test_submit_rejects_stale_epoch_and_double_change() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let key = CopysetKey::new(1, 2);

    let snapshot = adapter.copyset(key).unwrap();
    store.report_copyset(key, 3, Some(5), vec![4, 5, 6]).unwrap();

    let err = dispatcher
        .submit_change(&CopysetConf::new(&snapshot, ConfigChangeInfo::transfer_leader(6)))
        .unwrap_err();
    assert!(matches!(err, ScheduleError::StaleEpoch { expected: 1, actual: 3, .. }));

    let fresh = adapter.copyset(key).unwrap();
    dispatcher.submit_change(&CopysetConf::new(&fresh, ConfigChangeInfo::transfer_leader(6))).unwrap();
    let err = dispatcher
        .submit_change(&CopysetConf::new(&fresh, ConfigChangeInfo::transfer_leader(4)))
        .unwrap_err();
    assert!(matches!(err, ScheduleError::ChangeInFlight { .. }));
}

#[tokio::test]
async fn test_submit_rejects_change_that_does_not_fit() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = dispatcher(&store, &transport, DispatcherConfig::default());
    let adapter = adapter(&store);
    let copyset = adapter.copyset((1, 1).into()).unwrap();

    let err = dispatcher
        .submit_change(&CopysetConf::new(&copyset, ConfigChangeInfo::add_peer(2)))
        .unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidChange { .. }));

    let err = dispatcher
        .submit_change(&CopysetConf::new(&copyset, ConfigChangeInfo::remove_peer(77)))
        .unwrap_err();
    assert!(matches!(err, ScheduleError::ChunkServerNotFound(77)));
    assert!(store.pending_changes().is_empty());
}

#[tokio::test]
async fn test_cancel_and_expire() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let config =
        DispatcherConfig { pending_change_timeout: Some(Duration::ZERO), ..Default::default() };
    let dispatcher = dispatcher(&store, &transport, config);
    let adapter = adapter(&store);

    let one = adapter.copyset((1, 1).into()).unwrap();
    dispatcher.submit_change(&CopysetConf::new(&one, ConfigChangeInfo::remove_peer(3))).unwrap();
    let cancelled = dispatcher.cancel_change((1, 1).into()).unwrap();
    assert_eq!(cancelled, Some(ConfigChangeInfo::remove_peer(3)));
    assert_eq!(dispatcher.cancel_change((1, 1).into()).unwrap(), None);

    let three = adapter.copyset((1, 3).into()).unwrap();
    dispatcher.submit_change(&CopysetConf::new(&three, ConfigChangeInfo::add_peer(2))).unwrap();
    let summary = dispatcher.reconcile_pending();
    assert_eq!(summary.expired, 1);
    assert!(!adapter.copyset((1, 3).into()).unwrap().has_candidate());
}

#[tokio::test]
async fn test_concurrent_submits_have_one_winner() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(dispatcher(&store, &transport, DispatcherConfig::default()));
    let snapshot = adapter(&store).copyset((1, 2).into()).unwrap();

    let handles: Vec<_> = [5, 6, 5, 6, 5, 6]
        .into_iter()
        .map(|leader| {
            let dispatcher = Arc::clone(&dispatcher);
            let conf = CopysetConf::new(&snapshot, ConfigChangeInfo::transfer_leader(leader));
            tokio::spawn(async move { dispatcher.submit_change(&conf).is_ok() })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_reconcile_loop_clears_applied_change() {
    let store = store();
    let transport = Arc::new(RecordingTransport::default());
    let config =
        DispatcherConfig { reconcile_interval: Duration::from_millis(10), ..Default::default() };
    let mut dispatcher = dispatcher(&store, &transport, config);
    let key = CopysetKey::new(1, 2);

    store.begin_change(key, 1, ConfigChangeInfo::transfer_leader(6)).unwrap();
    store.report_copyset(key, 1, Some(6), vec![4, 5, 6]).unwrap();

    dispatcher.start().await;
    let mut cleared = false;
    for _ in 0..100 {
        if store.pending_changes().is_empty() {
            cleared = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    dispatcher.stop().await;
    assert!(cleared);
}
