// Reconciler: applies a fetched snapshot to the entity store

use crate::context::MapContext;
use crate::decay::DecayScheduler;
use crate::entity::{EntityId, EntityKind, Payload, ReconcilePolicy};
use crate::error::SyncError;
use crate::render::{geometry_for, style_for, VisualHandle};
use crate::store::EntityRecord;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};


/// What one reconciliation changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub skipped_malformed: usize,
    /// Records dropped up front by a clear-and-repopulate kind
    pub cleared: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.replaced > 0 || self.cleared > 0
    }
}

/// Diffs snapshots against the store and applies the minimal changes.
pub struct Reconciler {
    ctx: Arc<MapContext>,
    decay: Arc<DecayScheduler>,
    /// Serializes batches; overlapping polls must not interleave mid-diff
    batch_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(ctx: Arc<MapContext>, decay: Arc<DecayScheduler>) -> Self {
        Self {
            ctx,
            decay,
            batch_lock: Mutex::new(()),
        }
    }

    /// Apply one snapshot of `kind`.
    ///
    /// Malformed items are logged and skipped. Item order does not matter.
    /// A [`SyncError::DuplicateEntity`] means the diff logic itself is wrong
    /// and aborts the batch.
    pub fn reconcile(&self, kind: EntityKind, snapshot: &[Value]) -> Result<ReconcileReport, SyncError> {
        let _batch = self.batch_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = ReconcileReport::default();
        let policy = kind.policy();

        if policy == ReconcilePolicy::ClearAndRepopulate {
            report.cleared = self.ctx.store.clear_kind(kind);
        }

        for (index, item) in snapshot.iter().enumerate() {
            let (id, payload) = match Payload::parse(kind, item, index) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(kind = %kind, index, error = %e, "Skipping malformed snapshot item");
                    report.skipped_malformed += 1;
                    continue;
                }
            };

            match policy {
                ReconcilePolicy::InsertIfNew | ReconcilePolicy::ClearAndRepopulate => {
                    if self.ctx.store.contains(kind, &id) {
                        report.unchanged += 1;
                    } else {
                        self.insert_new(id, payload)?;
                        report.inserted += 1;
                    }
                }
                ReconcilePolicy::ChangeKey => {
                    let same = self
                        .ctx
                        .store
                        .peek(kind, &id, |r| r.change_key.as_ref() == payload.change_key());
                    match same {
                        None => {
                            self.insert_new(id, payload)?;
                            report.inserted += 1;
                        }
                        Some(true) => report.unchanged += 1,
                        Some(false) => {
                            if self.replace_existing(id, payload) {
                                report.replaced += 1;
                            }
                        }
                    }
                }
            }
        }

        debug!(
            kind = %kind,
            items = snapshot.len(),
            inserted = report.inserted,
            replaced = report.replaced,
            unchanged = report.unchanged,
            malformed = report.skipped_malformed,
            cleared = report.cleared,
            "Snapshot reconciled"
        );

        Ok(report)
    }

    fn place(&self, payload: &Payload) -> VisualHandle {
        self.ctx
            .renderer
            .place(payload.layer(), &geometry_for(payload), &style_for(payload))
    }

    fn insert_new(&self, id: EntityId, payload: Payload) -> Result<(), SyncError> {
        let visual = self.place(&payload);
        let expires_at = payload.expires_at();
        let record = EntityRecord::new(id, payload, visual);

        if let Err(e) = self.ctx.store.insert(record.clone()) {
            self.ctx.renderer.remove(visual);
            return Err(e);
        }

        self.track_if_ttl(&record, expires_at);
        Ok(())
    }

    fn replace_existing(&self, id: EntityId, payload: Payload) -> bool {
        let kind = payload.kind();
        let visual = self.place(&payload);
        let expires_at = payload.expires_at();

        if self.ctx.store.replace(kind, &id, payload, visual).is_none() {
            return false;
        }
        debug!(kind = %kind, id = %id, "Entity replaced");

        if let Some(record) = self.ctx.store.get(kind, &id) {
            self.track_if_ttl(&record, expires_at);
        }
        true
    }

    fn track_if_ttl(&self, record: &EntityRecord, expires_at: Option<f64>) {
        if !record.kind.is_ttl_bearing() {
            return;
        }
        if let Some(expires_at) = expires_at {
            self.decay.track(record, expires_at);
        }
    }
}
