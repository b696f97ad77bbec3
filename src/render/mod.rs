// Rendering capability used by the sync engine

mod canvas;

pub use canvas::{Canvas, PlacedVisual};

use crate::entity::{LatLon, Payload, ScanAreaType};
use serde::Serialize;
use std::fmt;

/// Opaque reference to a placed visual object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VisualHandle(pub u64);

impl fmt::Display for VisualHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Where a visual sits on the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Geometry {
    Point(LatLon),
    Path(Vec<LatLon>),
}

/// Icon or shape for a visual. Asset lookup is left to the renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum VisualStyle {
    CreatureIcon { pokemon_id: u32 },
    TeamIcon { team: u8 },
    /// Worker marker with a ring of `radius_m` meters
    WorkerIcon { notified: bool, radius_m: f64 },
    /// Spawn circle; `unknown_despawn` draws it highlighted
    SpawnCircle { radius_m: f64, unknown_despawn: bool },
    StopIcon,
    AreaOutline { blacklist: bool },
}

/// Capability interface implemented by a concrete map toolkit.
///
/// The engine only ever places, removes and fades visuals and toggles layer
/// visibility; it never touches a concrete rendering API.
pub trait Renderer: Send + Sync {
    /// Place a visual on `layer` and return its handle.
    fn place(&self, layer: &str, geometry: &Geometry, style: &VisualStyle) -> VisualHandle;

    /// Remove a visual from its layer. Unknown handles are ignored.
    fn remove(&self, handle: VisualHandle);

    /// Set a visual's opacity in `[0, 1]`.
    fn set_opacity(&self, handle: VisualHandle, weight: f64);

    /// Show or hide a whole layer on the map.
    fn set_visible(&self, layer: &str, visible: bool);
}

/// Geometry for a payload.
pub fn geometry_for(payload: &Payload) -> Geometry {
    match payload {
        Payload::ScanArea(area) => Geometry::Path(
            area.coords
                .iter()
                .map(|&[lat, lon]| LatLon::new(lat, lon))
                .collect(),
        ),
        other => Geometry::Point(other.position()),
    }
}

/// Style for a payload.
pub fn style_for(payload: &Payload) -> VisualStyle {
    match payload {
        Payload::Sighting(s) => VisualStyle::CreatureIcon {
            pokemon_id: s.pokemon_id,
        },
        Payload::ControlPoint(c) => VisualStyle::TeamIcon { team: c.team },
        Payload::Worker(w) => VisualStyle::WorkerIcon {
            notified: w.sent_notification,
            radius_m: 70.0,
        },
        Payload::SpawnPoint(s) => VisualStyle::SpawnCircle {
            radius_m: 5.0,
            unknown_despawn: s.despawn_time.is_none(),
        },
        Payload::StopPoint(_) => VisualStyle::StopIcon,
        Payload::ScanArea(a) => VisualStyle::AreaOutline {
            blacklist: a.area_type == ScanAreaType::Scanblacklist,
        },
    }
}
