use crate::clock::Clock;
use crate::error::SyncError;
use crate::layer::LayerRegistry;
use crate::render::Renderer;
use crate::store::EntityStore;
use std::sync::Arc;

/// Shared state for one map view.
///
/// Passed explicitly to the reconciler, decay scheduler and poller, so each
/// test can build a fresh one.
pub struct MapContext {
    pub layers: LayerRegistry,
    pub store: EntityStore,
    pub renderer: Arc<dyn Renderer>,
    pub clock: Arc<dyn Clock>,
}

impl MapContext {
    /// Context with the standard layer set.
    pub fn new(renderer: Arc<dyn Renderer>, clock: Arc<dyn Clock>) -> Self {
        Self::with_layers(LayerRegistry::with_default_layers(), renderer, clock)
    }

    pub fn with_layers(layers: LayerRegistry, renderer: Arc<dyn Renderer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            layers,
            store: EntityStore::new(Arc::clone(&renderer)),
            renderer,
            clock,
        }
    }

    /// Toggle a layer on the map, as the layer control would.
    ///
    /// The renderer is told first; the registry then sees the matching
    /// attach or detach event. Requesting the current state does nothing.
    pub fn set_layer_visible(&self, layer: &str, visible: bool) -> Result<(), SyncError> {
        if !self.layers.contains(layer) {
            return Err(SyncError::UnknownLayer(layer.to_string()));
        }
        if self.layers.is_hidden(layer) != visible {
            return Ok(());
        }
        self.renderer.set_visible(layer, visible);
        if visible {
            self.layers.attach(layer)?;
        } else {
            self.layers.detach(layer)?;
        }
        Ok(())
    }
}
