// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Chunkmeta Authors

//! Config-change dispatcher: the scheduler's write path.
//!
//! Changing copyset membership happens in two phases:
//! 1. **Prepare**: the target chunkserver instantiates the replication
//!    group for the copyset without joining it
//!    ([`ConfigChangeDispatcher::prepare_copyset_on_chunkserver`]).
//! 2. **Apply**: the policy sends the membership command and records the
//!    change ([`ConfigChangeDispatcher::submit_change`]) so later adapter
//!    queries see the copyset as pending.
//!
//! A copyset carrying a change is never the target of a second one. The
//! recorded change is cleared once the cluster reflects it, when it is
//! cancelled, or when it outlives the pending-change timeout
//! ([`ConfigChangeDispatcher::reconcile_pending`], run periodically after
//! [`ConfigChangeDispatcher::start`]).

mod config;
mod events;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chunkmeta_core::{ChunkServerId, ConfigChangeInfo, CopysetKey};
use chunkmeta_topology::{
    ConfigChangeStore, PendingChangeRecord, ReplicaEndpoint, ReplicationGroupTransport, StoreError,
};
pub use config::DispatcherConfig;
pub use events::{DispatchEvent, ReconcileSummary};
use metrics::{counter, gauge};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::adapter::TopoAdapter;
use crate::error::{ScheduleError, ScheduleResult};
use crate::model::{CopysetConf, PeerInfo};

/// Issues configuration changes and tracks them until the cluster settles.
pub struct ConfigChangeDispatcher {
    config: DispatcherConfig,
    adapter: Arc<dyn TopoAdapter>,
    changes: Arc<dyn ConfigChangeStore>,
    transport: Arc<dyn ReplicationGroupTransport>,
    /// Event broadcaster.
    event_tx: broadcast::Sender<DispatchEvent>,
    /// Shutdown channel of the reconciliation loop.
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ConfigChangeDispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        config: DispatcherConfig,
        adapter: Arc<dyn TopoAdapter>,
        changes: Arc<dyn ConfigChangeStore>,
        transport: Arc<dyn ReplicationGroupTransport>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self { config, adapter, changes, transport, event_tx, shutdown_tx: None }
    }

    /// Subscribes to dispatcher events.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_tx.subscribe()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Phase 1: asks `target` to instantiate the replication group of `key`.
    ///
    /// The copyset is re-read first; if it already carries a change the call
    /// fails with `ChangeInFlight` and no RPC is sent. The RPC is bounded by
    /// the create-copyset timeout. Any error means phase 2 must not run.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound`, `ChunkServerNotFound`, `Conversion` when either
    /// cannot be read into the model, `ChangeInFlight`, `InvalidChange` when
    /// the target is already a member, `Transport` or `Timeout`.
    pub async fn prepare_copyset_on_chunkserver(
        &self,
        key: CopysetKey,
        target: ChunkServerId,
    ) -> ScheduleResult<()> {
        counter!("chunkmeta_schedule_prepare_total").increment(1);

        let result = self.prepare(key, target).await;
        match &result {
            Ok(()) => {
                info!(copyset = %key, chunkserver = target, "Prepared copyset on chunkserver");
                let _ = self.event_tx.send(DispatchEvent::Prepared { key, target });
            }
            Err(e) => {
                if matches!(e, ScheduleError::ChangeInFlight { .. }) {
                    counter!("chunkmeta_schedule_change_rejected_total").increment(1);
                }
                counter!("chunkmeta_schedule_prepare_failed_total").increment(1);
                warn!(copyset = %key, chunkserver = target, error = %e, "Failed to prepare copyset");
                let _ = self.event_tx.send(DispatchEvent::PrepareFailed {
                    key,
                    target,
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn prepare(&self, key: CopysetKey, target: ChunkServerId) -> ScheduleResult<()> {
        let copyset =
            self.adapter.find_copyset(key)?.ok_or(ScheduleError::CopysetNotFound(key))?;
        if let Some(existing) = copyset.config_change() {
            return Err(ScheduleError::ChangeInFlight { key, existing: existing.clone() });
        }

        let cs = self
            .adapter
            .find_chunkserver(target)?
            .ok_or(ScheduleError::ChunkServerNotFound(target))?;
        if copyset.contains_peer(target) {
            return Err(ScheduleError::invalid_change(
                key,
                format!("chunkserver {target} is already a member"),
            ));
        }

        let endpoint = cs.info.endpoint();
        let peers: Vec<ReplicaEndpoint> = copyset.peers.iter().map(PeerInfo::endpoint).collect();
        let timeout = self.config.create_copyset_timeout;
        debug!(
            copyset = %key,
            target = %endpoint,
            peers = peers.len(),
            timeout_ms = timeout.as_millis(),
            "Creating replication group on target"
        );

        let call = self.transport.create_replication_group(&endpoint, key, &peers, timeout);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ScheduleError::Transport { chunkserver: target, source }),
            Err(_) => Err(ScheduleError::Timeout {
                chunkserver: target,
                timeout_ms: duration_ms(timeout),
            }),
        }
    }

    /// Records the change described by `conf` against its copyset.
    ///
    /// The copyset is re-read and must still be at `conf.epoch` with no
    /// change in flight; the store repeats both checks atomically.
    ///
    /// # Errors
    ///
    /// `CopysetNotFound`, `ChunkServerNotFound` for an unknown target,
    /// `Conversion`, `StaleEpoch`, `ChangeInFlight`, or `InvalidChange` when the change
    /// does not fit the copyset's membership.
    pub fn submit_change(&self, conf: &CopysetConf) -> ScheduleResult<PendingChangeRecord> {
        let key = conf.key;
        let result = self.submit(conf);
        match &result {
            Ok(record) => {
                counter!("chunkmeta_schedule_change_submitted_total").increment(1);
                info!(copyset = %key, epoch = record.epoch, change = %record.change, "Submitted configuration change");
                let _ = self
                    .event_tx
                    .send(DispatchEvent::ChangeSubmitted { key, change: record.change.clone() });
            }
            Err(e) => {
                counter!("chunkmeta_schedule_change_rejected_total").increment(1);
                warn!(copyset = %key, change = %conf.change, error = %e, "Rejected configuration change");
            }
        }
        result
    }

    fn submit(&self, conf: &CopysetConf) -> ScheduleResult<PendingChangeRecord> {
        let key = conf.key;
        let copyset =
            self.adapter.find_copyset(key)?.ok_or(ScheduleError::CopysetNotFound(key))?;
        if copyset.epoch != conf.epoch {
            return Err(ScheduleError::StaleEpoch {
                key,
                expected: conf.epoch,
                actual: copyset.epoch,
            });
        }
        if let Some(existing) = copyset.config_change() {
            return Err(ScheduleError::ChangeInFlight { key, existing: existing.clone() });
        }

        let target = conf.change.target;
        let candidate = self
            .adapter
            .find_chunkserver(target)?
            .ok_or(ScheduleError::ChunkServerNotFound(target))?;
        copyset
            .with_pending(candidate.info, conf.change.clone())
            .validate()
            .map_err(|e| ScheduleError::invalid_change(key, e.to_string()))?;

        self.changes.begin_change(key, conf.epoch, conf.change.clone()).map_err(|e| match e {
            StoreError::ChangeInFlight { key, existing } => {
                ScheduleError::ChangeInFlight { key, existing }
            }
            StoreError::StaleEpoch { key, expected, actual } => {
                ScheduleError::StaleEpoch { key, expected, actual }
            }
            other => other.into(),
        })
    }

    /// Drops whatever change is recorded against `key`.
    ///
    /// Returns the cancelled change, if there was one.
    ///
    /// # Errors
    ///
    /// `Store` if the copyset is unknown.
    pub fn cancel_change(&self, key: CopysetKey) -> ScheduleResult<Option<ConfigChangeInfo>> {
        let cancelled = self.changes.cancel_change(key)?.map(|record| record.change);
        if let Some(change) = &cancelled {
            info!(copyset = %key, change = %change, "Cancelled configuration change");
            let _ = self
                .event_tx
                .send(DispatchEvent::ChangeCancelled { key, change: change.clone() });
        }
        Ok(cancelled)
    }

    /// Clears recorded changes the cluster now reflects and those older than
    /// the pending-change timeout.
    pub fn reconcile_pending(&self) -> ReconcileSummary {
        Self::reconcile_static(
            &self.config,
            self.adapter.as_ref(),
            self.changes.as_ref(),
            &self.event_tx,
        )
    }

    /// Static version of reconcile_pending for use in the spawned loop.
    fn reconcile_static(
        config: &DispatcherConfig,
        adapter: &dyn TopoAdapter,
        changes: &dyn ConfigChangeStore,
        event_tx: &broadcast::Sender<DispatchEvent>,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for (key, observed) in changes.pending_changes() {
            let age = (Utc::now() - observed.submitted_at).to_std().unwrap_or_default();
            // The adapter drops a recorded change from its view once the
            // cluster reflects it or it can no longer apply. Seeing a
            // different change means the slot moved on since the listing;
            // leave it for the next pass.
            let completed = match adapter.copyset(key) {
                Some(copyset) => match copyset.config_change() {
                    None => true,
                    Some(change) if *change == observed.change => false,
                    Some(_) => continue,
                },
                None => false,
            };
            let expired = !completed && config.pending_change_timeout.is_some_and(|t| age >= t);
            if !completed && !expired {
                summary.remaining += 1;
                continue;
            }

            match changes.clear_change(key, &observed) {
                Ok(true) if completed => {
                    summary.completed += 1;
                    counter!("chunkmeta_schedule_change_completed_total").increment(1);
                    info!(copyset = %key, change = %observed.change, "Configuration change completed");
                    let _ = event_tx
                        .send(DispatchEvent::ChangeCompleted { key, change: observed.change });
                }
                Ok(true) => {
                    summary.expired += 1;
                    counter!("chunkmeta_schedule_change_expired_total").increment(1);
                    warn!(
                        copyset = %key,
                        change = %observed.change,
                        age_ms = duration_ms(age),
                        "Configuration change expired"
                    );
                    let _ = event_tx.send(DispatchEvent::ChangeExpired {
                        key,
                        change: observed.change,
                        age,
                    });
                }
                Ok(false) => {
                    debug!(copyset = %key, "Recorded change superseded during reconciliation");
                }
                Err(e) => {
                    warn!(copyset = %key, error = %e, "Failed to clear configuration change");
                }
            }
        }

        gauge!("chunkmeta_schedule_pending_changes").set(summary.remaining as f64);
        summary
    }

    /// Starts the periodic reconciliation loop.
    pub async fn start(&mut self) {
        if self.shutdown_tx.is_some() {
            return;
        }
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let config = self.config.clone();
        let adapter = Arc::clone(&self.adapter);
        let changes = Arc::clone(&self.changes);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.reconcile_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let summary = Self::reconcile_static(
                            &config,
                            adapter.as_ref(),
                            changes.as_ref(),
                            &event_tx,
                        );
                        if summary.completed > 0 || summary.expired > 0 {
                            debug!(
                                completed = summary.completed,
                                expired = summary.expired,
                                remaining = summary.remaining,
                                "Reconciled pending changes"
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Config-change dispatcher shutting down");
                        break;
                    }
                }
            }
        });

        info!(
            reconcile_interval_ms = self.config.reconcile_interval.as_millis(),
            create_copyset_timeout_ms = self.config.create_copyset_timeout.as_millis(),
            "Config-change dispatcher started"
        );
    }

    /// Stops the reconciliation loop.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Returns whether the reconciliation loop is running.
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
