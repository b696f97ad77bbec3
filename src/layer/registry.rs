use crate::error::SyncError;
use dashmap::DashMap;
use tracing::{debug, info};

/// Callback run once when a layer is first shown.
pub type VisibilityCallback = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Handle returned by [`LayerRegistry::register_layer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerHandle {
    name: String,
}

impl LayerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Layer {
    /// True while nothing attaches the layer to the map
    hidden: bool,
    initial_hidden: bool,
    /// Attach events minus detach events
    attachments: usize,
    /// Set on the first empty -> non-empty transition (or at start when visible)
    shown_once: bool,
    pending_on_visible: Vec<VisibilityCallback>,
}

/// Registry of process-wide map layers.
///
/// `hidden` is never set directly: it follows the attach/detach events the
/// rendering side reports, flipping only on count transitions.
pub struct LayerRegistry {
    layers: DashMap<String, Layer>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self {
            layers: DashMap::new(),
        }
    }

    /// Registry pre-populated with the map's standard layers.
    pub fn with_default_layers() -> Self {
        let registry = Self::new();
        for (name, initial_hidden) in super::names::DEFAULT_LAYERS {
            registry.register_layer(name, initial_hidden);
        }
        registry
    }

    /// Register a layer.
    ///
    /// # Panics
    /// Layers are defined once at startup; registering a name twice panics.
    pub fn register_layer(&self, name: &str, initial_hidden: bool) -> LayerHandle {
        let layer = Layer {
            hidden: initial_hidden,
            initial_hidden,
            attachments: if initial_hidden { 0 } else { 1 },
            shown_once: !initial_hidden,
            pending_on_visible: Vec::new(),
        };

        match self.layers.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                panic!("layer '{}' registered twice", name)
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(layer);
            }
        }

        debug!(layer = %name, initial_hidden, "Layer registered");

        LayerHandle {
            name: name.to_string(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Whether the layer is hidden. Unknown layers count as hidden.
    pub fn is_hidden(&self, name: &str) -> bool {
        self.layers.get(name).map(|l| l.hidden).unwrap_or(true)
    }

    /// True when every named layer is hidden.
    pub fn all_hidden(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.is_hidden(name))
    }

    pub fn initial_hidden(&self, name: &str) -> Result<bool, SyncError> {
        self.layers
            .get(name)
            .map(|l| l.initial_hidden)
            .ok_or_else(|| SyncError::UnknownLayer(name.to_string()))
    }

    /// Whether the layer has been visible at least once.
    pub fn has_been_shown(&self, name: &str) -> bool {
        self.layers.get(name).map(|l| l.shown_once).unwrap_or(false)
    }

    /// Run `callback` the first time the layer becomes visible.
    ///
    /// If the layer has already been shown the callback runs immediately.
    pub fn on_become_visible(
        &self,
        name: &str,
        callback: impl FnOnce() + Send + Sync + 'static,
    ) -> Result<(), SyncError> {
        {
            let mut layer = self
                .layers
                .get_mut(name)
                .ok_or_else(|| SyncError::UnknownLayer(name.to_string()))?;
            if !layer.shown_once {
                layer.pending_on_visible.push(Box::new(callback));
                return Ok(());
            }
        }
        callback();
        Ok(())
    }

    /// Record that the layer was attached to the map.
    ///
    /// Returns true on the hidden -> visible transition.
    pub fn attach(&self, name: &str) -> Result<bool, SyncError> {
        let callbacks = {
            let mut layer = self
                .layers
                .get_mut(name)
                .ok_or_else(|| SyncError::UnknownLayer(name.to_string()))?;
            layer.attachments += 1;
            if layer.attachments != 1 {
                return Ok(false);
            }
            layer.hidden = false;
            layer.shown_once = true;
            std::mem::take(&mut layer.pending_on_visible)
        };

        info!(layer = %name, callbacks = callbacks.len(), "Layer shown");

        // Guard dropped above; callbacks may query the registry
        for callback in callbacks {
            callback();
        }
        Ok(true)
    }

    /// Record that the layer was detached from the map.
    ///
    /// Returns true on the visible -> hidden transition. Detaching an already
    /// empty layer is ignored.
    pub fn detach(&self, name: &str) -> Result<bool, SyncError> {
        let mut layer = self
            .layers
            .get_mut(name)
            .ok_or_else(|| SyncError::UnknownLayer(name.to_string()))?;
        if layer.attachments == 0 {
            return Ok(false);
        }
        layer.attachments -= 1;
        if layer.attachments > 0 {
            return Ok(false);
        }
        layer.hidden = true;
        drop(layer);

        info!(layer = %name, "Layer hidden");
        Ok(true)
    }

    /// Registered layer names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.layers.iter().map(|l| l.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for LayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
