use super::{Geometry, Renderer, VisualHandle, VisualStyle};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// A visual currently on the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedVisual {
    pub layer: String,
    pub geometry: Geometry,
    pub style: VisualStyle,
    pub opacity: f64,
}

/// Headless in-memory renderer.
///
/// Keeps every live visual so the binary can report map contents without a
/// display, and so tests can observe placements, removals and fading.
pub struct Canvas {
    visuals: DashMap<VisualHandle, PlacedVisual>,
    layer_visibility: DashMap<String, bool>,
    next_handle: AtomicU64,
    placed_total: AtomicU64,
    removed_total: AtomicU64,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            visuals: DashMap::new(),
            layer_visibility: DashMap::new(),
            next_handle: AtomicU64::new(1),
            placed_total: AtomicU64::new(0),
            removed_total: AtomicU64::new(0),
        }
    }

    pub fn get(&self, handle: VisualHandle) -> Option<PlacedVisual> {
        self.visuals.get(&handle).map(|v| v.clone())
    }

    pub fn contains(&self, handle: VisualHandle) -> bool {
        self.visuals.contains_key(&handle)
    }

    pub fn opacity(&self, handle: VisualHandle) -> Option<f64> {
        self.visuals.get(&handle).map(|v| v.opacity)
    }

    /// Number of live visuals on all layers.
    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }

    /// Number of live visuals on one layer.
    pub fn count_on(&self, layer: &str) -> usize {
        self.visuals.iter().filter(|v| v.layer == layer).count()
    }

    pub fn placed_total(&self) -> u64 {
        self.placed_total.load(Ordering::Relaxed)
    }

    pub fn removed_total(&self) -> u64 {
        self.removed_total.load(Ordering::Relaxed)
    }

    /// Last visibility requested for a layer, if any.
    pub fn layer_visible(&self, layer: &str) -> Option<bool> {
        self.layer_visibility.get(layer).map(|v| *v)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for Canvas {
    fn place(&self, layer: &str, geometry: &Geometry, style: &VisualStyle) -> VisualHandle {
        let handle = VisualHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.visuals.insert(
            handle,
            PlacedVisual {
                layer: layer.to_string(),
                geometry: geometry.clone(),
                style: style.clone(),
                opacity: 1.0,
            },
        );
        self.placed_total.fetch_add(1, Ordering::Relaxed);
        trace!(handle = %handle, layer = %layer, "Visual placed");
        handle
    }

    fn remove(&self, handle: VisualHandle) {
        if self.visuals.remove(&handle).is_some() {
            self.removed_total.fetch_add(1, Ordering::Relaxed);
            trace!(handle = %handle, "Visual removed");
        }
    }

    fn set_opacity(&self, handle: VisualHandle, weight: f64) {
        if let Some(mut visual) = self.visuals.get_mut(&handle) {
            visual.opacity = weight.clamp(0.0, 1.0);
        }
    }

    fn set_visible(&self, layer: &str, visible: bool) {
        self.layer_visibility.insert(layer.to_string(), visible);
        debug!(layer = %layer, visible, "Layer visibility set");
    }
}
