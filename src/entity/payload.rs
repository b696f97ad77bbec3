use super::{string_or_number, EntityId, EntityKind};
use crate::error::SyncError;
use crate::layer::names;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geographic coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Creature sighting with a server-declared expiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub id: EntityId,
    pub lat: f64,
    pub lon: f64,
    pub pokemon_id: u32,
    /// Expiry, epoch seconds
    pub expires_at: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub atk: Option<u8>,
    #[serde(default)]
    pub def: Option<u8>,
    #[serde(default)]
    pub sta: Option<u8>,
    #[serde(default)]
    pub move1: Option<Value>,
    #[serde(default)]
    pub move2: Option<Value>,
    #[serde(default)]
    pub damage1: Option<f64>,
    #[serde(default)]
    pub damage2: Option<f64>,
    /// Routes the sighting to the secondary layer
    #[serde(default)]
    pub trash: bool,
}

impl Sighting {
    /// Individual value percentage, when all three stats are known.
    pub fn iv_percent(&self) -> Option<f64> {
        match (self.atk, self.def, self.sta) {
            (Some(a), Some(d), Some(s)) => {
                let total = u16::from(a) + u16::from(d) + u16::from(s);
                Some(100.0 * f64::from(total) / 45.0)
            }
            _ => None,
        }
    }
}

/// Control point (gym). `sighting_id` versions the guard state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: EntityId,
    pub lat: f64,
    pub lon: f64,
    pub team: u8,
    pub sighting_id: EntityId,
    #[serde(default)]
    pub prestige: Option<i64>,
    #[serde(default)]
    pub pokemon_id: Option<u32>,
    #[serde(default)]
    pub pokemon_name: Option<String>,
}

/// Scan worker position and counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub lat: f64,
    pub lon: f64,
    pub worker_no: EntityId,
    #[serde(deserialize_with = "string_or_number")]
    pub time: String,
    #[serde(deserialize_with = "string_or_number")]
    pub speed: String,
    pub total_seen: u64,
    pub visits: u64,
    pub seen_here: u64,
    #[serde(default)]
    pub sent_notification: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub lat: f64,
    pub lon: f64,
    pub spawn_id: EntityId,
    /// Seconds past the hour at which the spawn ends, when known
    #[serde(default)]
    pub despawn_time: Option<u32>,
    /// Minutes the spawn stays active
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopPoint {
    pub lat: f64,
    pub lon: f64,
    pub external_id: EntityId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAreaType {
    Scanarea,
    Scanblacklist,
}

/// Outline of the scanned area or of a blacklisted region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanArea {
    #[serde(rename = "type")]
    pub area_type: ScanAreaType,
    pub coords: Vec<[f64; 2]>,
}

/// Last snapshot fields received for one entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Sighting(Sighting),
    ControlPoint(ControlPoint),
    Worker(Worker),
    SpawnPoint(SpawnPoint),
    StopPoint(StopPoint),
    ScanArea(ScanArea),
}

impl Payload {
    /// Parse one raw snapshot item as the given kind.
    ///
    /// `index` is the item's position in its snapshot; scan areas carry no id
    /// of their own and are keyed by it.
    pub fn parse(kind: EntityKind, item: &Value, index: usize) -> Result<(EntityId, Payload), SyncError> {
        Ok(match kind {
            EntityKind::Sighting => {
                let s: Sighting = decode(kind, item)?;
                if !s.expires_at.is_finite() {
                    return Err(SyncError::MalformedItem {
                        kind,
                        reason: "expires_at is not a finite timestamp".to_string(),
                    });
                }
                (s.id.clone(), Payload::Sighting(s))
            }
            EntityKind::ControlPoint => {
                let c: ControlPoint = decode(kind, item)?;
                (c.id.clone(), Payload::ControlPoint(c))
            }
            EntityKind::Worker => {
                let w: Worker = decode(kind, item)?;
                (w.worker_no.clone(), Payload::Worker(w))
            }
            EntityKind::SpawnPoint => {
                let s: SpawnPoint = decode(kind, item)?;
                (s.spawn_id.clone(), Payload::SpawnPoint(s))
            }
            EntityKind::StopPoint => {
                let s: StopPoint = decode(kind, item)?;
                (s.external_id.clone(), Payload::StopPoint(s))
            }
            EntityKind::ScanArea => {
                let a: ScanArea = decode(kind, item)?;
                if a.coords.len() < 2 {
                    return Err(SyncError::MalformedItem {
                        kind,
                        reason: format!("scan area needs at least 2 points, got {}", a.coords.len()),
                    });
                }
                (EntityId::from(index as u64), Payload::ScanArea(a))
            }
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Payload::Sighting(_) => EntityKind::Sighting,
            Payload::ControlPoint(_) => EntityKind::ControlPoint,
            Payload::Worker(_) => EntityKind::Worker,
            Payload::SpawnPoint(_) => EntityKind::SpawnPoint,
            Payload::StopPoint(_) => EntityKind::StopPoint,
            Payload::ScanArea(_) => EntityKind::ScanArea,
        }
    }

    /// Layer the visual for this payload belongs to.
    pub fn layer(&self) -> &'static str {
        match self {
            Payload::Sighting(s) if s.trash => names::TRASH,
            Payload::Sighting(_) => names::SIGHTINGS,
            Payload::ControlPoint(_) => names::CONTROL_POINTS,
            Payload::Worker(_) => names::WORKERS,
            Payload::SpawnPoint(_) => names::SPAWN_POINTS,
            Payload::StopPoint(_) => names::STOP_POINTS,
            Payload::ScanArea(_) => names::SCAN_AREA,
        }
    }

    /// Cheap version value for kinds reconciled by change key.
    pub fn change_key(&self) -> Option<&EntityId> {
        match self {
            Payload::ControlPoint(c) => Some(&c.sighting_id),
            _ => None,
        }
    }

    /// Server expiry in epoch seconds, for TTL-bearing kinds.
    pub fn expires_at(&self) -> Option<f64> {
        match self {
            Payload::Sighting(s) => Some(s.expires_at),
            _ => None,
        }
    }

    /// Anchor coordinate (first vertex for scan areas).
    pub fn position(&self) -> LatLon {
        match self {
            Payload::Sighting(s) => LatLon::new(s.lat, s.lon),
            Payload::ControlPoint(c) => LatLon::new(c.lat, c.lon),
            Payload::Worker(w) => LatLon::new(w.lat, w.lon),
            Payload::SpawnPoint(s) => LatLon::new(s.lat, s.lon),
            Payload::StopPoint(s) => LatLon::new(s.lat, s.lon),
            Payload::ScanArea(a) => a
                .coords
                .first()
                .map(|&[lat, lon]| LatLon::new(lat, lon))
                .unwrap_or(LatLon::new(0.0, 0.0)),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: EntityKind, item: &Value) -> Result<T, SyncError> {
    T::deserialize(item).map_err(|e| SyncError::MalformedItem {
        kind,
        reason: e.to_string(),
    })
}
