// Named visual layers and their visibility tracking

mod registry;

pub use registry::{LayerHandle, LayerRegistry, VisibilityCallback};


/// Stable layer names used by the map.
pub mod names {
    pub const SIGHTINGS: &str = "Sightings";
    pub const TRASH: &str = "Trash";
    pub const CONTROL_POINTS: &str = "ControlPoints";
    pub const STOP_POINTS: &str = "StopPoints";
    pub const WORKERS: &str = "Workers";
    pub const SPAWN_POINTS: &str = "SpawnPoints";
    pub const SCAN_AREA: &str = "ScanArea";

    /// Every layer with its initial hidden flag.
    pub const DEFAULT_LAYERS: [(&str, bool); 7] = [
        (SIGHTINGS, false),
        (TRASH, true),
        (CONTROL_POINTS, true),
        (STOP_POINTS, true),
        (WORKERS, true),
        (SPAWN_POINTS, true),
        (SCAN_AREA, false),
    ];
}
