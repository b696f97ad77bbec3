//! Wires the sync engine together for one map view.

use crate::clock::Clock;
use crate::config::LiveMapConfig;
use crate::context::MapContext;
use crate::decay::DecayScheduler;
use crate::error::SyncError;
use crate::poller::{KindSchedule, Poller, SnapshotSource};
use crate::reconcile::Reconciler;
use crate::render::Renderer;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// The context, decay scheduler, reconciler and poller of one map view.
pub struct LiveMap {
    pub ctx: Arc<MapContext>,
    pub decay: Arc<DecayScheduler>,
    pub reconciler: Arc<Reconciler>,
    pub poller: Arc<Poller>,
    handles: Vec<JoinHandle<()>>,
}

impl LiveMap {
    pub fn new(
        config: &LiveMapConfig,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        let ctx = Arc::new(MapContext::new(renderer, clock));
        let decay = Arc::new(DecayScheduler::new(
            Arc::clone(&ctx),
            config.decay.curve(),
            config.decay.tick_interval(),
        ));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&ctx), Arc::clone(&decay)));
        let poller = Arc::new(Poller::new(
            Arc::clone(&ctx),
            Arc::clone(&reconciler),
            source,
            KindSchedule::defaults(&config.poll),
        ));

        Self {
            ctx,
            decay,
            reconciler,
            poller,
            handles: Vec::new(),
        }
    }

    /// Start polling and decay. Returns the number of tasks spawned.
    pub fn start(&mut self) -> Result<usize, SyncError> {
        let mut handles = self.poller.start()?;
        handles.push(Arc::clone(&self.decay).start());
        self.handles.extend(handles);
        Ok(self.handles.len())
    }

    /// Abort every background task.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!(
            entities = self.ctx.store.len(),
            tracked = self.decay.tracked_count(),
            "Live map stopped"
        );
    }
}
