use super::*;
use crate::layer::names;
use crate::testing::{control_point, sighting, worker, Fixture, T0};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory snapshot source that counts fetches per endpoint.
#[derive(Default)]
struct MockSource {
    responses: DashMap<String, Vec<Value>>,
    fetches: DashMap<String, usize>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl MockSource {
    fn with(self, endpoint: &str, items: Vec<Value>) -> Self {
        self.responses.insert(endpoint.to_string(), items);
        self
    }

    fn fetch_count(&self, endpoint: &str) -> usize {
        self.fetches.get(endpoint).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotSource for MockSource {
    async fn fetch(&self, endpoint: &str) -> Result<Vec<Value>, SyncError> {
        *self.fetches.entry(endpoint.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::transport(endpoint, "connection refused"));
        }
        Ok(self
            .responses
            .get(endpoint)
            .map(|items| items.clone())
            .unwrap_or_default())
    }
}

fn poller(fx: &Fixture, source: Arc<MockSource>, schedule: Vec<KindSchedule>) -> Arc<Poller> {
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&fx.ctx), Arc::clone(&fx.decay)));
    Arc::new(Poller::new(Arc::clone(&fx.ctx), reconciler, source, schedule))
}

fn sightings_source() -> MockSource {
    MockSource::default().with(
        "/data",
        vec![sighting("pokemon-1", T0 + 600.0), sighting("pokemon-2", T0 + 600.0)],
    )
}

#[test]
fn test_default_schedule() {
    let schedule = KindSchedule::defaults(&PollConfig::default());
    assert_eq!(schedule.len(), EntityKind::ALL.len());

    let sightings = &schedule[0];
    assert_eq!(sightings.kind, EntityKind::Sighting);
    assert_eq!(sightings.every, Some(Duration::from_secs(30)));

    let workers = schedule.iter().find(|s| s.kind == EntityKind::Worker).unwrap();
    assert!(workers.prefetch);
    assert_eq!(workers.every, Some(Duration::from_secs(14)));

    let control = schedule.iter().find(|s| s.kind == EntityKind::ControlPoint).unwrap();
    assert!(control.on_first_show);
    assert_eq!(control.every, Some(Duration::from_secs(110)));
}

#[tokio::test]
async fn test_hidden_layer_never_fetches() {
    let fx = Fixture::new();
    let source = Arc::new(MockSource::default().with("/gym_data", vec![control_point("fort-1", 1, 1)]));
    let poller = poller(&fx, source.clone(), Vec::new());

    for _ in 0..5 {
        assert_eq!(poller.poll_once(EntityKind::ControlPoint).await, PollOutcome::Hidden);
    }

    assert_eq!(source.fetch_count("/gym_data"), 0);
    assert!(fx.ctx.store.is_empty());
    assert_eq!(poller.status(EntityKind::ControlPoint).hidden_skips, 5);
}

#[tokio::test]
async fn test_sightings_gated_on_both_layers() {
    let fx = Fixture::new();
    let source = Arc::new(sightings_source());
    let poller = poller(&fx, source.clone(), Vec::new());

    fx.ctx.set_layer_visible(names::SIGHTINGS, false).unwrap();
    assert_eq!(poller.poll_once(EntityKind::Sighting).await, PollOutcome::Hidden);

    // Trash alone is enough to keep the feed alive
    fx.ctx.set_layer_visible(names::TRASH, true).unwrap();
    let outcome = poller.poll_once(EntityKind::Sighting).await;
    assert!(matches!(outcome, PollOutcome::Fetched(ref r) if r.inserted == 2));
    assert_eq!(source.fetch_count("/data"), 1);
}

#[tokio::test]
async fn test_failed_fetch_drops_tick() {
    let fx = Fixture::new();
    let source = Arc::new(sightings_source());
    source.fail.store(true, Ordering::SeqCst);
    let poller = poller(&fx, source.clone(), Vec::new());

    assert_eq!(poller.poll_once(EntityKind::Sighting).await, PollOutcome::Failed);
    let status = poller.status(EntityKind::Sighting);
    assert_eq!(status.error_count, 1);
    assert!(status.last_error.unwrap().contains("connection refused"));
    assert!(status.last_poll.is_none());
    assert!(fx.ctx.store.is_empty());

    // Next tick retries normally
    source.fail.store(false, Ordering::SeqCst);
    assert!(matches!(
        poller.poll_once(EntityKind::Sighting).await,
        PollOutcome::Fetched(_)
    ));
    let status = poller.status(EntityKind::Sighting);
    assert_eq!(status.poll_count, 1);
    assert!(status.last_error.is_none());
    assert_eq!(fx.ctx.store.len(), 2);
}

#[tokio::test]
async fn test_overlapping_polls_do_not_duplicate() {
    let fx = Fixture::new();
    let source = Arc::new(MockSource {
        delay: Some(Duration::from_millis(20)),
        ..sightings_source()
    });
    let poller = poller(&fx, source.clone(), Vec::new());

    let (a, b, c) = tokio::join!(
        poller.poll_once(EntityKind::Sighting),
        poller.poll_once(EntityKind::Sighting),
        poller.poll_once(EntityKind::Sighting),
    );

    let inserted: usize = [a, b, c]
        .into_iter()
        .map(|o| match o {
            PollOutcome::Fetched(r) => r.inserted,
            other => panic!("unexpected outcome {:?}", other),
        })
        .sum();
    assert_eq!(inserted, 2);
    assert_eq!(source.fetch_count("/data"), 3);
    assert_eq!(fx.ctx.store.len(), 2);
    assert_eq!(fx.canvas.len(), 2);
}

#[tokio::test]
async fn test_first_show_fetches_exactly_once() {
    let fx = Fixture::new();
    let source = Arc::new(MockSource::default().with(
        "/spawnpoints",
        vec![json!({"lat": 1.0, "lon": 2.0, "spawn_id": 5, "despawn_time": 600})],
    ));
    let schedule = vec![KindSchedule {
        kind: EntityKind::SpawnPoint,
        every: None,
        on_first_show: true,
        prefetch: false,
    }];
    let poller = poller(&fx, source.clone(), schedule);

    let mut handles = poller.start().unwrap();
    assert_eq!(handles.len(), 1);
    tokio::task::yield_now().await;
    assert_eq!(source.fetch_count("/spawnpoints"), 0);

    fx.ctx.set_layer_visible(names::SPAWN_POINTS, true).unwrap();
    handles.remove(0).await.unwrap();
    assert_eq!(source.fetch_count("/spawnpoints"), 1);
    assert_eq!(fx.ctx.store.count_of(EntityKind::SpawnPoint), 1);

    fx.ctx.set_layer_visible(names::SPAWN_POINTS, false).unwrap();
    fx.ctx.set_layer_visible(names::SPAWN_POINTS, true).unwrap();
    tokio::task::yield_now().await;
    assert_eq!(source.fetch_count("/spawnpoints"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recurring_poll_waits_for_visibility() {
    let fx = Fixture::new();
    let source = Arc::new(sightings_source());
    let schedule = vec![KindSchedule {
        kind: EntityKind::Sighting,
        every: Some(Duration::from_secs(30)),
        on_first_show: false,
        prefetch: false,
    }];
    let poller = poller(&fx, source.clone(), schedule);
    fx.ctx.set_layer_visible(names::SIGHTINGS, false).unwrap();

    let handles = poller.start().unwrap();
    tokio::time::sleep(Duration::from_secs(95)).await;
    assert_eq!(source.fetch_count("/data"), 0);
    assert!(poller.status(EntityKind::Sighting).hidden_skips >= 3);

    fx.ctx.set_layer_visible(names::SIGHTINGS, true).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(source.fetch_count("/data") >= 1);
    assert_eq!(fx.ctx.store.count_of(EntityKind::Sighting), 2);

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_runs_while_hidden() {
    let fx = Fixture::new();
    let source = Arc::new(MockSource::default().with("/workers_data", vec![worker(0, 10.0), worker(1, 11.0)]));
    let schedule = vec![KindSchedule {
        kind: EntityKind::Worker,
        every: Some(Duration::from_secs(14)),
        on_first_show: false,
        prefetch: true,
    }];
    let poller = poller(&fx, source.clone(), schedule);
    assert!(fx.ctx.layers.is_hidden(names::WORKERS));

    let mut handles = poller.start().unwrap();
    assert_eq!(handles.len(), 2);
    handles.remove(0).await.unwrap();
    assert_eq!(source.fetch_count("/workers_data"), 1);
    assert_eq!(fx.ctx.store.count_of(EntityKind::Worker), 2);

    // Recurring ticks stay gated
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.fetch_count("/workers_data"), 1);

    for handle in handles {
        handle.abort();
    }
}

#[tokio::test]
async fn test_unknown_first_show_layer_fails_start() {
    let fx = Fixture::new();
    let ctx = Arc::new(MapContext::with_layers(
        crate::layer::LayerRegistry::new(),
        fx.canvas.clone(),
        fx.clock.clone(),
    ));
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&ctx), Arc::clone(&fx.decay)));
    let schedule = vec![KindSchedule {
        kind: EntityKind::StopPoint,
        every: None,
        on_first_show: true,
        prefetch: false,
    }];
    let poller = Arc::new(Poller::new(ctx, reconciler, Arc::new(MockSource::default()), schedule));

    assert!(matches!(poller.start(), Err(SyncError::UnknownLayer(_))));
}
