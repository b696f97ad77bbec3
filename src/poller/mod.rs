//! Per-kind snapshot polling.
//!
//! Each entity kind gets its own task: recurring kinds tick on a fixed
//! interval, slow-changing kinds fetch once when their layer is first shown.
//! Every tick is gated on layer visibility so hidden layers cost nothing.

mod source;

pub use source::{HttpSource, SnapshotSource};

use crate::config::PollConfig;
use crate::context::MapContext;
use crate::entity::EntityKind;
use crate::error::SyncError;
use crate::reconcile::{ReconcileReport, Reconciler};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// When a kind is fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct KindSchedule {
    pub kind: EntityKind,
    /// Recurring, visibility-gated cadence
    pub every: Option<Duration>,
    /// Fetch once the first time the kind's layer is shown
    pub on_first_show: bool,
    /// Fetch once at startup regardless of visibility
    pub prefetch: bool,
}

impl KindSchedule {
    /// The map's standard schedule.
    pub fn defaults(poll: &PollConfig) -> Vec<KindSchedule> {
        let secs = Duration::from_secs;
        vec![
            KindSchedule {
                kind: EntityKind::Sighting,
                every: Some(secs(poll.sightings_interval_secs)),
                on_first_show: false,
                prefetch: false,
            },
            KindSchedule {
                kind: EntityKind::ControlPoint,
                every: Some(secs(poll.control_points_interval_secs)),
                on_first_show: true,
                prefetch: false,
            },
            KindSchedule {
                kind: EntityKind::Worker,
                every: Some(secs(poll.workers_interval_secs)),
                on_first_show: false,
                prefetch: true,
            },
            KindSchedule {
                kind: EntityKind::SpawnPoint,
                every: None,
                on_first_show: true,
                prefetch: false,
            },
            KindSchedule {
                kind: EntityKind::StopPoint,
                every: None,
                on_first_show: true,
                prefetch: false,
            },
            KindSchedule {
                kind: EntityKind::ScanArea,
                every: None,
                on_first_show: false,
                prefetch: true,
            },
        ]
    }
}

/// Result of one poll tick.
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    /// Every layer of the kind was hidden; nothing fetched
    Hidden,
    Fetched(ReconcileReport),
    /// Tick dropped; the next scheduled tick retries
    Failed,
}

/// Status information for one kind's polling.
#[derive(Clone, Debug, Default)]
pub struct PollStatus {
    /// Last successful poll timestamp
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub poll_count: u64,
    pub error_count: u64,
    /// Ticks skipped because the layer was hidden
    pub hidden_skips: u64,
}

/// Fetches snapshots and hands them to the reconciler.
pub struct Poller {
    ctx: Arc<MapContext>,
    reconciler: Arc<Reconciler>,
    source: Arc<dyn SnapshotSource>,
    schedule: Vec<KindSchedule>,
    status: DashMap<EntityKind, PollStatus>,
}

impl Poller {
    pub fn new(
        ctx: Arc<MapContext>,
        reconciler: Arc<Reconciler>,
        source: Arc<dyn SnapshotSource>,
        schedule: Vec<KindSchedule>,
    ) -> Self {
        Self {
            ctx,
            reconciler,
            source,
            schedule,
            status: DashMap::new(),
        }
    }

    pub fn schedule(&self) -> &[KindSchedule] {
        &self.schedule
    }

    /// Polling status for one kind.
    pub fn status(&self, kind: EntityKind) -> PollStatus {
        self.status.get(&kind).map(|s| s.clone()).unwrap_or_default()
    }

    /// One visibility-gated tick for `kind`.
    pub async fn poll_once(&self, kind: EntityKind) -> PollOutcome {
        if self.ctx.layers.all_hidden(kind.layers()) {
            self.status.entry(kind).or_default().hidden_skips += 1;
            debug!(kind = %kind, "Layer hidden, skipping poll");
            return PollOutcome::Hidden;
        }
        self.fetch_and_reconcile(kind).await
    }

    /// Fetch and reconcile without checking visibility.
    pub async fn fetch_and_reconcile(&self, kind: EntityKind) -> PollOutcome {
        let result = match self.source.fetch(kind.endpoint()).await {
            Ok(snapshot) => self.reconciler.reconcile(kind, &snapshot),
            Err(e) => Err(e),
        };

        let mut status = self.status.entry(kind).or_default();
        match result {
            Ok(report) => {
                status.last_poll = Some(Utc::now());
                status.last_error = None;
                status.poll_count += 1;
                PollOutcome::Fetched(report)
            }
            Err(e) => {
                match &e {
                    SyncError::DuplicateEntity { .. } => {
                        error!(kind = %kind, error = %e, "Reconciliation invariant violated")
                    }
                    _ => warn!(kind = %kind, error = %e, "Poll failed, dropping tick"),
                }
                status.last_error = Some(e.to_string());
                status.error_count += 1;
                PollOutcome::Failed
            }
        }
    }

    /// Spawn every task in the schedule.
    pub fn start(self: &Arc<Self>) -> Result<Vec<JoinHandle<()>>, SyncError> {
        let mut handles = Vec::new();

        for entry in self.schedule.clone() {
            if entry.prefetch {
                let poller = Arc::clone(self);
                handles.push(tokio::spawn(async move {
                    poller.fetch_and_reconcile(entry.kind).await;
                }));
            }
            if entry.on_first_show {
                handles.push(self.spawn_first_show(entry.kind)?);
            }
            if let Some(every) = entry.every {
                // An immediate first tick would duplicate the startup fetch
                let skip_first = entry.prefetch || entry.on_first_show;
                handles.push(self.spawn_recurring(entry.kind, every, skip_first));
            }
        }

        info!(tasks = handles.len(), "Poller started");
        Ok(handles)
    }

    fn spawn_first_show(self: &Arc<Self>, kind: EntityKind) -> Result<JoinHandle<()>, SyncError> {
        let shown = Arc::new(Notify::new());
        let signal = Arc::clone(&shown);
        let layer = kind.layers()[0];
        self.ctx
            .layers
            .on_become_visible(layer, move || signal.notify_one())?;

        let poller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            shown.notified().await;
            info!(kind = %kind, layer = %layer, "Layer shown, fetching once");
            poller.fetch_and_reconcile(kind).await;
        }))
    }

    fn spawn_recurring(self: &Arc<Self>, kind: EntityKind, every: Duration, skip_first: bool) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            info!(kind = %kind, interval_secs = every.as_secs(), "Starting recurring poll");

            let mut timer = interval(every);
            if skip_first {
                timer.tick().await;
            }

            loop {
                timer.tick().await;
                // Not awaited: a slow fetch may overlap the next tick
                let tick = Arc::clone(&poller);
                tokio::spawn(async move {
                    tick.poll_once(kind).await;
                });
            }
        })
    }
}
