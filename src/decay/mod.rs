// Decay scheduler: fades displayed entities toward expiry, then evicts them

use crate::context::MapContext;
use crate::entity::{EntityId, EntityKind};
use crate::render::VisualHandle;
use crate::store::EntityRecord;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};


/// Maps remaining time-to-live to an opacity.
///
/// Full weight above `threshold_secs`, then linear down to `floor` at zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeCurve {
    pub threshold_secs: f64,
    pub floor: f64,
}

impl FadeCurve {
    pub fn weight(&self, remaining_secs: f64) -> f64 {
        if remaining_secs > self.threshold_secs {
            return 1.0;
        }
        if remaining_secs <= 0.0 || self.threshold_secs <= 0.0 {
            return self.floor;
        }
        self.floor + (1.0 - self.floor) * remaining_secs / self.threshold_secs
    }
}

impl Default for FadeCurve {
    fn default() -> Self {
        Self {
            threshold_secs: 300.0,
            floor: 0.5,
        }
    }
}

#[derive(Clone, Debug)]
struct Tracked {
    visual: VisualHandle,
    layer: &'static str,
    expires_at: f64,
}

/// Counts from one decay tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecayReport {
    pub faded: usize,
    pub evicted: usize,
    /// Skipped because their layer is hidden
    pub paused: usize,
    /// Trackers whose record was already gone or replaced
    pub dropped: usize,
}

/// Ages TTL-bearing records and evicts them at expiry.
///
/// Each tracked record is checked independently on every tick; a record's
/// check ends when the record is evicted.
pub struct DecayScheduler {
    ctx: Arc<MapContext>,
    curve: FadeCurve,
    tick_interval: Duration,
    tracked: DashMap<(EntityKind, EntityId), Tracked>,
}

impl DecayScheduler {
    pub fn new(ctx: Arc<MapContext>, curve: FadeCurve, tick_interval: Duration) -> Self {
        Self {
            ctx,
            curve,
            tick_interval,
            tracked: DashMap::new(),
        }
    }

    pub fn curve(&self) -> FadeCurve {
        self.curve
    }

    /// Start fading `record` toward `expires_at` (epoch seconds).
    ///
    /// The initial weight is applied immediately and returned. Tracking an id
    /// again supersedes the previous tracker.
    pub fn track(&self, record: &EntityRecord, expires_at: f64) -> f64 {
        let remaining = expires_at - self.ctx.clock.now();
        let weight = self.curve.weight(remaining);

        self.ctx.renderer.set_opacity(record.visual, weight);
        self.ctx
            .store
            .set_fade_weight(record.kind, &record.id, record.visual, weight);

        self.tracked.insert(
            (record.kind, record.id.clone()),
            Tracked {
                visual: record.visual,
                layer: record.layer,
                expires_at,
            },
        );

        debug!(kind = %record.kind, id = %record.id, remaining, weight, "Tracking entity decay");
        weight
    }

    pub fn is_tracked(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.tracked.contains_key(&(kind, id.clone()))
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Run one check over every tracked record.
    pub fn tick(&self) -> DecayReport {
        let now = self.ctx.clock.now();
        let mut report = DecayReport::default();

        // Copy out so store mutation never happens under a tracker lock
        let entries: Vec<((EntityKind, EntityId), Tracked)> = self
            .tracked
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        for ((kind, id), tracked) in entries {
            if self.ctx.layers.is_hidden(tracked.layer) {
                report.paused += 1;
                continue;
            }

            let remaining = tracked.expires_at - now;
            if remaining <= 0.0 {
                if self.ctx.store.evict_if_current(kind, &id, tracked.visual).is_some() {
                    report.evicted += 1;
                    debug!(kind = %kind, id = %id, "Entity expired");
                } else {
                    report.dropped += 1;
                }
                self.untrack_if(kind, &id, tracked.visual);
                continue;
            }

            let weight = self.curve.weight(remaining);
            if self.ctx.store.set_fade_weight(kind, &id, tracked.visual, weight) {
                self.ctx.renderer.set_opacity(tracked.visual, weight);
                report.faded += 1;
            } else {
                // Record evicted or replaced elsewhere
                self.untrack_if(kind, &id, tracked.visual);
                report.dropped += 1;
            }
        }

        report
    }

    fn untrack_if(&self, kind: EntityKind, id: &EntityId, visual: VisualHandle) {
        self.tracked
            .remove_if(&(kind, id.clone()), |_, t| t.visual == visual);
    }

    /// Spawn the recurring decay loop.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_ms = self.tick_interval.as_millis() as u64,
                threshold_secs = self.curve.threshold_secs,
                floor = self.curve.floor,
                "Starting decay scheduler"
            );

            let mut timer = interval(self.tick_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                let report = self.tick();
                if report.evicted > 0 || report.dropped > 0 {
                    debug!(
                        faded = report.faded,
                        evicted = report.evicted,
                        paused = report.paused,
                        dropped = report.dropped,
                        "Decay tick"
                    );
                }
            }
        })
    }
}
