// Entity store: one record per (kind, id), owning its visual

use crate::entity::{EntityId, EntityKind, Payload};
use crate::error::SyncError;
use crate::render::{Renderer, VisualHandle};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;


/// Locally held state for one displayed entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Last snapshot fields received
    pub payload: Payload,
    /// Visual owned by this record; removed when the record goes
    pub visual: VisualHandle,
    pub layer: &'static str,
    pub change_key: Option<EntityId>,
    /// Current opacity, maintained by the decay scheduler
    pub fade_weight: f64,
}

impl EntityRecord {
    pub fn new(id: EntityId, payload: Payload, visual: VisualHandle) -> Self {
        Self {
            kind: payload.kind(),
            id,
            layer: payload.layer(),
            change_key: payload.change_key().cloned(),
            payload,
            visual,
            fade_weight: 1.0,
        }
    }
}

type Key = (EntityKind, EntityId);

/// Mapping from `(kind, id)` to the record displayed for it.
///
/// Every removal also removes the record's visual, so a visual never
/// outlives its record.
pub struct EntityStore {
    records: DashMap<Key, EntityRecord>,
    renderer: Arc<dyn Renderer>,
}

impl EntityStore {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            records: DashMap::new(),
            renderer,
        }
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<EntityRecord> {
        self.records.get(&(kind, id.clone())).map(|r| r.clone())
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.records.contains_key(&(kind, id.clone()))
    }

    /// Inspect a record in place without cloning it.
    pub fn peek<R>(&self, kind: EntityKind, id: &EntityId, f: impl FnOnce(&EntityRecord) -> R) -> Option<R> {
        self.records.get(&(kind, id.clone())).map(|r| f(&r))
    }

    /// Insert a new record.
    ///
    /// Fails with [`SyncError::DuplicateEntity`] if the key is taken; the
    /// caller must evict first.
    pub fn insert(&self, record: EntityRecord) -> Result<(), SyncError> {
        match self.records.entry((record.kind, record.id.clone())) {
            Entry::Occupied(_) => Err(SyncError::DuplicateEntity {
                kind: record.kind,
                id: record.id,
            }),
            Entry::Vacant(e) => {
                e.insert(record);
                Ok(())
            }
        }
    }

    /// Remove a record and its visual.
    ///
    /// Evicting an absent id is a harmless no-op; racing timers may do it.
    pub fn evict(&self, kind: EntityKind, id: &EntityId) -> Option<EntityRecord> {
        match self.records.remove(&(kind, id.clone())) {
            Some((_, record)) => {
                self.renderer.remove(record.visual);
                Some(record)
            }
            None => {
                debug!(kind = %kind, id = %id, "Evict of absent entity ignored");
                None
            }
        }
    }

    /// Evict only while the record still owns `visual`.
    ///
    /// A tracker created for an earlier incarnation of the id must not remove
    /// its replacement.
    pub fn evict_if_current(&self, kind: EntityKind, id: &EntityId, visual: VisualHandle) -> Option<EntityRecord> {
        let (_, record) = self
            .records
            .remove_if(&(kind, id.clone()), |_, r| r.visual == visual)?;
        self.renderer.remove(record.visual);
        Some(record)
    }

    /// Swap in a new payload and visual, removing the old visual in the
    /// same step.
    ///
    /// Returns the previous record. If the id was evicted meanwhile nothing
    /// is installed and `new_visual` is removed, so it cannot dangle.
    pub fn replace(
        &self,
        kind: EntityKind,
        id: &EntityId,
        new_payload: Payload,
        new_visual: VisualHandle,
    ) -> Option<EntityRecord> {
        match self.records.get_mut(&(kind, id.clone())) {
            Some(mut slot) => {
                let record = EntityRecord::new(id.clone(), new_payload, new_visual);
                let old = std::mem::replace(&mut *slot, record);
                // Old visual goes while the entry is still locked
                self.renderer.remove(old.visual);
                Some(old)
            }
            None => {
                debug!(kind = %kind, id = %id, "Replace of evicted entity ignored");
                self.renderer.remove(new_visual);
                None
            }
        }
    }

    /// Record a new fade weight if `visual` is still the record's visual.
    pub fn set_fade_weight(&self, kind: EntityKind, id: &EntityId, visual: VisualHandle, weight: f64) -> bool {
        match self.records.get_mut(&(kind, id.clone())) {
            Some(mut record) if record.visual == visual => {
                record.fade_weight = weight;
                true
            }
            _ => false,
        }
    }

    /// Evict every record of one kind. Returns how many were removed.
    pub fn clear_kind(&self, kind: EntityKind) -> usize {
        let mut removed = 0;
        self.records.retain(|(k, _), record| {
            if *k != kind {
                return true;
            }
            self.renderer.remove(record.visual);
            removed += 1;
            false
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    /// Ids currently held for one kind, sorted.
    pub fn ids(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
