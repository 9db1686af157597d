//! One player's walk, end to end
//!
//! [`LootSession`] connects the positioning provider, the movement tracker,
//! the generator, the store, and the proximity index. Each sample runs the
//! tracker (and maybe one spawn write), then the proximity pass, which hands
//! every flagged box to its own background collect task. Store changes come
//! back through a [`SyncChannel`] whose listener is the session itself; the
//! subscription covers the proximity retain radius and is re-centered when
//! the player strays more than the query radius from its center.
//!
//! Only the store calls are awaited. Locks on session state are never held
//! across an `.await`.

use crate::collection::{with_retry, CollectOutcome, CollectionCoordinator};
use crate::config::LootConfig;
use crate::error::Result;
use crate::geo::{self, Position};
use crate::identity::IdentityProvider;
use crate::inventory::UserInventory;
use crate::location::{LocationProvider, LocationStream, LocationUpdate};
use crate::loot::{BoxId, LootBox, LootGenerator, UserId};
use crate::metrics::LootMetricsHandle;
use crate::movement::{MovementEvent, MovementState, MovementTracker};
use crate::proximity::ProximityIndex;
use crate::runtime::{AsyncSpawner, JoinHandle};
use crate::store::{ChangeEvent, LootBoxFilter, LootStore, SortOrder};
use crate::sync::{ChangeListener, Observable, SubscriptionHandle, SyncChannel};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What one position sample caused
#[derive(Debug, Default)]
pub struct PositionReport {
    /// Tracker output; empty when the sample was ignored
    pub events: Vec<MovementEvent>,
    /// The box committed for this sample, if any
    pub spawned: Option<LootBox>,
    /// Boxes handed to collect tasks
    pub dispatched: Vec<BoxId>,
    /// Handles of those tasks, in the same order
    pub tasks: Vec<JoinHandle>,
}

/// Result of tapping a box on the map
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Attempted(CollectOutcome),
    /// The box is farther than the collection radius
    OutOfRange { distance: f64 },
    /// A collect for this box is already running
    InFlight,
    /// No position yet, so range cannot be checked
    NoPosition,
}

/// Streams a started session needs pumped
pub struct SessionStreams {
    pub location: LocationStream,
    pub changes: SyncChannel,
}

/// The live subscription and the point it is centered on
struct Subscription {
    handle: SubscriptionHandle,
    center: Option<Position>,
}

struct SessionInner<S, P> {
    config: LootConfig,
    user_id: UserId,
    generator: LootGenerator,
    coordinator: CollectionCoordinator<S, P>,
    location: Arc<dyn LocationProvider>,
    tracker: Mutex<MovementTracker>,
    proximity: Mutex<ProximityIndex>,
    spawn_in_flight: AtomicBool,
    mirrored_distance: Mutex<f64>,
    subscription: Mutex<Option<Subscription>>,
    position: Observable<Option<Position>>,
    available: Observable<bool>,
    nearby: Observable<Vec<LootBox>>,
    last_collect: Observable<Option<(BoxId, CollectOutcome)>>,
}

/// A running loot session; clones share state
pub struct LootSession<S, P> {
    inner: Arc<SessionInner<S, P>>,
}

impl<S, P> Clone for LootSession<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> LootSession<S, P>
where
    S: LootStore + 'static,
    P: AsyncSpawner,
{
    /// Build a session; fails on invalid configuration or identity
    pub fn new(
        config: LootConfig,
        store: Arc<S>,
        spawner: P,
        identity: &dyn IdentityProvider,
        location: Arc<dyn LocationProvider>,
    ) -> Result<Self> {
        let generator = LootGenerator::new(&config)?;
        Self::with_generator(config, generator, store, spawner, identity, location)
    }

    /// Build a session around a prepared generator, e.g. a seeded one
    pub fn with_generator(
        config: LootConfig,
        generator: LootGenerator,
        store: Arc<S>,
        spawner: P,
        identity: &dyn IdentityProvider,
        location: Arc<dyn LocationProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let user_id = identity.user_id()?;
        let coordinator = CollectionCoordinator::new(store, spawner, config.retry);

        log::info!(
            "Loot session for {} on {} runtime",
            user_id,
            coordinator.spawner().runtime_name()
        );

        Ok(Self {
            inner: Arc::new(SessionInner {
                tracker: Mutex::new(MovementTracker::from_config(&config)),
                proximity: Mutex::new(ProximityIndex::from_config(&config)),
                config,
                user_id,
                generator,
                coordinator,
                location,
                spawn_in_flight: AtomicBool::new(false),
                mirrored_distance: Mutex::new(0.0),
                subscription: Mutex::new(None),
                position: Observable::new(None),
                available: Observable::new(false),
                nearby: Observable::new(Vec::new()),
                last_collect: Observable::new(None),
            }),
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.inner.user_id
    }

    pub fn config(&self) -> &LootConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &LootMetricsHandle {
        self.inner.coordinator.metrics()
    }

    pub fn coordinator(&self) -> &CollectionCoordinator<S, P> {
        &self.inner.coordinator
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.lock().is_tracking()
    }

    /// Snapshot of the walk so far
    pub fn movement(&self) -> MovementState {
        self.inner.tracker.lock().movement().clone()
    }

    /// Latest accepted position
    pub fn position(&self) -> &Observable<Option<Position>> {
        &self.inner.position
    }

    /// Whether the positioning provider currently delivers
    pub fn availability(&self) -> &Observable<bool> {
        &self.inner.available
    }

    /// Uncollected boxes near the player, nearest first
    pub fn nearby(&self) -> &Observable<Vec<LootBox>> {
        &self.inner.nearby
    }

    /// Outcome of the most recent finished collect
    pub fn last_collect(&self) -> &Observable<Option<(BoxId, CollectOutcome)>> {
        &self.inner.last_collect
    }

    /// Listener to attach to this session's [`SyncChannel`]
    pub fn change_listener(&self) -> Arc<dyn ChangeListener> {
        Arc::new(self.clone())
    }

    /// Start tracking
    ///
    /// Finishes any merges left pending by an earlier session, seeds the
    /// nearby set from the store, subscribes to uncollected boxes, and starts
    /// the positioning provider.
    pub async fn start(&self) -> Result<SessionStreams> {
        let inner = &self.inner;
        inner.tracker.lock().start();
        inner.proximity.lock().clear();
        *inner.mirrored_distance.lock() = 0.0;

        match inner.coordinator.recover_pending_merges(&inner.user_id).await {
            Ok(0) => {}
            Ok(n) => log::info!("Recovered {} pending merge(s) for {}", n, inner.user_id),
            Err(e) => log::warn!("Pending merge recovery failed: {}", e),
        }

        self.seed_nearby().await?;
        let center = inner.position.get();
        let filter = self.subscription_filter(center);
        let changes = SyncChannel::open(&**inner.coordinator.store(), filter).await?;
        *inner.subscription.lock() = Some(Subscription {
            handle: changes.handle(),
            center,
        });

        let location = inner.location.start()?;
        inner.available.set(true);
        log::info!("Session started for {}", inner.user_id);

        Ok(SessionStreams { location, changes })
    }

    async fn seed_nearby(&self) -> Result<()> {
        let inner = &self.inner;
        let mut filter = LootBoxFilter::uncollected();
        if let Some(position) = inner.position.get() {
            filter = filter.near(position, inner.config.query_radius_m);
        }

        let store = inner.coordinator.store();
        let filter_ref = &filter;
        let limit = inner.config.nearby_batch_limit;
        let boxes = with_retry(
            inner.coordinator.spawner(),
            &inner.config.retry,
            "nearby query",
            move || store.query_loot_boxes(filter_ref, SortOrder::NewestFirst, limit),
            || {},
        )
        .await?;

        log::debug!("Seeding nearby set with {} box(es)", boxes.len());
        {
            let mut proximity = inner.proximity.lock();
            for loot_box in boxes {
                proximity.on_store_event(&ChangeEvent::added(loot_box));
            }
        }
        self.refresh_nearby();
        Ok(())
    }

    fn subscription_filter(&self, center: Option<Position>) -> LootBoxFilter {
        let filter = LootBoxFilter::uncollected();
        match center {
            Some(center) => filter.near(center, self.inner.proximity.lock().retain_radius()),
            None => filter,
        }
    }

    /// Re-center the subscription once the player has left its core
    async fn follow_subscription(&self, position: Position) {
        let inner = &self.inner;
        let handle = match inner.subscription.lock().as_ref() {
            Some(sub)
                if !sub.center.is_some_and(|c| {
                    geo::distance(&c, &position) <= inner.config.query_radius_m
                }) =>
            {
                sub.handle.clone()
            }
            _ => return,
        };

        let filter = self.subscription_filter(Some(position));
        let store = inner.coordinator.store();
        let filter_ref = &filter;
        let stream = with_retry(
            inner.coordinator.spawner(),
            &inner.config.retry,
            "loot box subscription",
            move || store.subscribe_loot_boxes(filter_ref.clone()),
            || {},
        )
        .await;

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Could not re-center subscription: {}", e);
                return;
            }
        };

        if handle.replace(stream) {
            if let Some(sub) = inner.subscription.lock().as_mut() {
                sub.center = Some(position);
            }
            log::debug!(
                "Subscription re-centered on {}",
                geo::format_coordinates(&position)
            );
        } else {
            log::debug!("Change channel dropped, no longer following the player");
            *inner.subscription.lock() = None;
        }
    }

    /// Stop tracking and return the final walk state
    ///
    /// Collect tasks already running are left to finish; distance walked
    /// since the last mirror is written to the inventory on a best-effort
    /// basis.
    pub async fn stop(&self) -> MovementState {
        let inner = &self.inner;
        inner.location.stop();
        let final_state = inner.tracker.lock().stop();
        inner.proximity.lock().clear();
        *inner.subscription.lock() = None;
        inner.available.set(false);
        self.refresh_nearby();

        self.mirror_distance(final_state.cumulative_distance).await;
        log::info!(
            "Session stopped for {} after {:.1}m",
            inner.user_id,
            final_state.cumulative_distance
        );
        final_state
    }

    /// Apply one provider update
    pub async fn handle_update(&self, update: LocationUpdate) -> Result<PositionReport> {
        match update {
            LocationUpdate::Sample(position) => self.on_position(position).await,
            LocationUpdate::Availability(available) => {
                self.inner.tracker.lock().set_available(available);
                self.inner.available.set(available);
                Ok(PositionReport::default())
            }
        }
    }

    /// Consume provider updates until the stream ends
    pub async fn drive(&self, mut updates: LocationStream) {
        while let Some(update) = updates.next().await {
            if let Err(e) = self.handle_update(update).await {
                log::warn!("Failed to apply location update: {}", e);
            }
        }
    }

    /// Run one sample through tracking, spawning, and proximity
    pub async fn on_position(&self, position: Position) -> Result<PositionReport> {
        let events = {
            let mut tracker = self.inner.tracker.lock();
            if !tracker.accepts(&position) {
                return Ok(PositionReport::default());
            }
            tracker.on_position(position)
        };
        self.inner.position.set(Some(position));

        let mut report = PositionReport::default();
        for event in &events {
            if let MovementEvent::SpawnRequested { at } = event {
                self.metrics().record_spawn_requested();
                if let Some(spawned) = self.spawn_at(*at).await {
                    report.spawned = Some(spawned);
                }
            }
        }
        report.events = events;

        let tick = self.inner.proximity.lock().on_position(position);
        if !tick.delta.is_empty() {
            self.refresh_nearby();
        }
        for id in tick.triggered {
            report.tasks.push(self.dispatch_collect(id.clone()));
            report.dispatched.push(id);
        }

        self.follow_subscription(position).await;
        Ok(report)
    }

    async fn spawn_at(&self, at: Position) -> Option<LootBox> {
        let inner = &self.inner;
        if inner.spawn_in_flight.swap(true, Ordering::SeqCst) {
            log::debug!("Spawn already in flight, skipping request");
            return None;
        }

        let loot_box = inner.generator.generate(&at, &inner.user_id);
        let committed = match inner.coordinator.store().create_loot_box(loot_box.clone()).await {
            Ok(_) => {
                inner.tracker.lock().confirm_spawn(at);
                self.metrics().record_spawn_committed();
                log::info!("Spawned {} ({})", loot_box.describe(), loot_box.id);
                Some(loot_box)
            }
            Err(e) => {
                self.metrics().record_spawn_failed();
                log::warn!("Dropped spawn at {:.6},{:.6}: {}", at.latitude, at.longitude, e);
                None
            }
        };

        if committed.is_some() {
            let cumulative = inner.tracker.lock().cumulative_distance();
            self.mirror_distance(cumulative).await;
        }
        inner.spawn_in_flight.store(false, Ordering::SeqCst);
        committed
    }

    async fn mirror_distance(&self, cumulative: f64) {
        let inner = &self.inner;
        // Reserve the delta before awaiting so concurrent mirrors split it
        let delta = {
            let mut mirrored = inner.mirrored_distance.lock();
            let delta = cumulative - *mirrored;
            if delta <= 0.0 {
                return;
            }
            *mirrored += delta;
            delta
        };

        if let Err(e) = inner.coordinator.mirror_distance(&inner.user_id, delta).await {
            *inner.mirrored_distance.lock() -= delta;
            log::warn!("Distance mirror failed, will retry later: {}", e);
        }
    }

    fn dispatch_collect(&self, id: BoxId) -> JoinHandle {
        let session = self.clone();
        self.inner.coordinator.spawner().spawn(async move {
            let _ = session.collect(id).await;
        })
    }

    async fn collect(&self, id: BoxId) -> Result<CollectOutcome> {
        let result = self
            .inner
            .coordinator
            .attempt_collect(&id, &self.inner.user_id)
            .await;

        let delta = self.inner.proximity.lock().finish(&id, result.is_ok());
        if !delta.is_empty() {
            self.refresh_nearby();
        }

        match &result {
            Ok(outcome) => self.inner.last_collect.set(Some((id, outcome.clone()))),
            Err(e) => log::warn!("Collect of {} failed, will retry when in range: {}", id, e),
        }
        result
    }

    /// Collect a tapped box if the player is close enough
    pub async fn on_box_clicked(&self, id: &BoxId) -> Result<ClickOutcome> {
        let Some(position) = self.inner.position.get() else {
            return Ok(ClickOutcome::NoPosition);
        };

        let known = self.inner.proximity.lock().get(id).cloned();
        let loot_box = match known {
            Some(loot_box) => loot_box,
            None => match self.read_loot_box(id).await? {
                Some(loot_box) => loot_box,
                None => {
                    self.metrics().record_not_found();
                    return Ok(ClickOutcome::Attempted(CollectOutcome::NotFound));
                }
            },
        };

        if loot_box.collected {
            return Ok(ClickOutcome::Attempted(CollectOutcome::AlreadyCollected));
        }

        let distance = loot_box.distance_from(&position);
        if distance > self.inner.config.collection_radius_m {
            return Ok(ClickOutcome::OutOfRange { distance });
        }

        if !self.inner.proximity.lock().begin(id) {
            return Ok(ClickOutcome::InFlight);
        }
        Ok(ClickOutcome::Attempted(self.collect(id.clone()).await?))
    }

    async fn read_loot_box(&self, id: &BoxId) -> Result<Option<LootBox>> {
        let coordinator = &self.inner.coordinator;
        let store = coordinator.store();
        let loot_box = with_retry(
            coordinator.spawner(),
            &self.inner.config.retry,
            "loot box read",
            move || store.get_loot_box(id),
            || {},
        )
        .await?;
        Ok(loot_box)
    }

    /// Current inventory, empty if the player has never collected
    pub async fn inventory(&self) -> Result<UserInventory> {
        self.inner.coordinator.load_inventory(&self.inner.user_id).await
    }

    fn refresh_nearby(&self) {
        let boxes = self.inner.proximity.lock().nearby();
        self.inner.nearby.set(boxes);
    }
}

impl<S, P> ChangeListener for LootSession<S, P>
where
    S: LootStore + 'static,
    P: AsyncSpawner,
{
    fn on_change(&self, event: &ChangeEvent) {
        let delta = self.inner.proximity.lock().on_store_event(event);
        if !delta.is_empty() {
            self.refresh_nearby();
        }
    }
}
