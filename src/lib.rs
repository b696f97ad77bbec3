// Error taxonomy
pub mod error;

// Configuration (TOML + env)
pub mod config;

// Wall-clock abstraction
pub mod clock;

// Entity kinds and snapshot payloads
pub mod entity;

// Rendering capability and headless canvas
pub mod render;

// Layer registry and visibility tracking
pub mod layer;

// Entity store
pub mod store;

// Shared map context
pub mod context;

// Snapshot reconciliation
pub mod reconcile;

// TTL fading and eviction
pub mod decay;

// Per-kind snapshot polling
pub mod poller;

// Top-level wiring
pub mod map;

pub use context::MapContext;
pub use error::SyncError;
pub use map::LiveMap;

#[cfg(test)]
pub(crate) mod testing;
