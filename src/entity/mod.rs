// Entity kinds, identifiers and typed snapshot payloads

mod payload;

pub use payload::{ControlPoint, LatLon, Payload, ScanArea, ScanAreaType, Sighting, SpawnPoint, StopPoint, Worker};

use crate::layer::names;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;


/// The kinds of transient entity shown on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sighting,
    ControlPoint,
    Worker,
    SpawnPoint,
    StopPoint,
    ScanArea,
}

/// How an incoming snapshot item is merged with an existing record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Presence implies still valid; only decay removes the record.
    InsertIfNew,
    /// Replace when the change key differs, skip otherwise.
    ChangeKey,
    /// Drop every record of the kind and rebuild from the snapshot.
    ClearAndRepopulate,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Sighting,
        EntityKind::ControlPoint,
        EntityKind::Worker,
        EntityKind::SpawnPoint,
        EntityKind::StopPoint,
        EntityKind::ScanArea,
    ];

    /// Snapshot endpoint path for this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            EntityKind::Sighting => "/data",
            EntityKind::ControlPoint => "/gym_data",
            EntityKind::Worker => "/workers_data",
            EntityKind::SpawnPoint => "/spawnpoints",
            EntityKind::StopPoint => "/pokestops",
            EntityKind::ScanArea => "/scan_coords",
        }
    }

    pub fn policy(self) -> ReconcilePolicy {
        match self {
            EntityKind::ControlPoint => ReconcilePolicy::ChangeKey,
            EntityKind::Worker | EntityKind::ScanArea => ReconcilePolicy::ClearAndRepopulate,
            EntityKind::Sighting | EntityKind::SpawnPoint | EntityKind::StopPoint => {
                ReconcilePolicy::InsertIfNew
            }
        }
    }

    /// Whether records of this kind carry a server expiry and fade out.
    pub fn is_ttl_bearing(self) -> bool {
        matches!(self, EntityKind::Sighting)
    }

    /// Layers whose visibility gates fetching for this kind.
    ///
    /// A poll is skipped only when every listed layer is hidden.
    pub fn layers(self) -> &'static [&'static str] {
        match self {
            EntityKind::Sighting => &[names::SIGHTINGS, names::TRASH],
            EntityKind::ControlPoint => &[names::CONTROL_POINTS],
            EntityKind::Worker => &[names::WORKERS],
            EntityKind::SpawnPoint => &[names::SPAWN_POINTS],
            EntityKind::StopPoint => &[names::STOP_POINTS],
            EntityKind::ScanArea => &[names::SCAN_AREA],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Sighting => "sighting",
            EntityKind::ControlPoint => "control_point",
            EntityKind::Worker => "worker",
            EntityKind::SpawnPoint => "spawn_point",
            EntityKind::StopPoint => "stop_point",
            EntityKind::ScanArea => "scan_area",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned identifier, unique within one kind.
///
/// The server sends ids as strings ("pokemon-12") or bare numbers; both
/// normalize to the same textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number(deserializer).map(EntityId)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Accepts a JSON string or number and yields its textual form.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}
