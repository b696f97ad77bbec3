// Shared fixtures for unit tests

use crate::clock::ManualClock;
use crate::context::MapContext;
use crate::decay::{DecayScheduler, FadeCurve};
use crate::reconcile::Reconciler;
use crate::render::Canvas;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const T0: f64 = 1_700_000_000.0;

pub struct Fixture {
    pub ctx: Arc<MapContext>,
    pub canvas: Arc<Canvas>,
    pub clock: Arc<ManualClock>,
    pub decay: Arc<DecayScheduler>,
    pub reconciler: Reconciler,
}

impl Fixture {
    pub fn new() -> Self {
        let canvas = Arc::new(Canvas::new());
        let clock = Arc::new(ManualClock::new(T0));
        let ctx = Arc::new(MapContext::new(canvas.clone(), clock.clone()));
        let decay = Arc::new(DecayScheduler::new(
            Arc::clone(&ctx),
            FadeCurve::default(),
            Duration::from_millis(2500),
        ));
        let reconciler = Reconciler::new(Arc::clone(&ctx), Arc::clone(&decay));
        Self {
            ctx,
            canvas,
            clock,
            decay,
            reconciler,
        }
    }
}

pub fn sighting(id: &str, expires_at: f64) -> Value {
    json!({
        "id": id,
        "lat": 10.0,
        "lon": 20.0,
        "pokemon_id": 16,
        "expires_at": expires_at,
    })
}

pub fn control_point(id: &str, sighting_id: u64, team: u8) -> Value {
    json!({
        "id": id,
        "lat": 51.5,
        "lon": -0.12,
        "team": team,
        "sighting_id": sighting_id,
        "prestige": 2000,
        "pokemon_id": 149,
        "pokemon_name": "Dragonite",
    })
}

pub fn worker(worker_no: u64, lat: f64) -> Value {
    json!({
        "lat": lat,
        "lon": 20.0,
        "worker_no": worker_no,
        "time": "3:04:05 PM",
        "speed": "12.3mph",
        "total_seen": 40,
        "visits": 12,
        "seen_here": 3,
        "sent_notification": false,
    })
}
