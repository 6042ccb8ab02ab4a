//! Engine orchestration: configuration, the interaction state machine and
//! the public surface.
//!
//! The manager owns the task queue, the background registry, the target
//! list and the excluded set; the loader owns the in-flight map. All public
//! methods are synchronous and side-effecting. Internally every operation
//! runs under one lock, and anything that can re-enter the engine (load
//! triggers, stats callbacks, idle callbacks) is collected while locked and
//! invoked after the lock is released.
//!
//! State machine:
//!
//! ```text
//!            set_enabled(true)            move start
//! Disabled <------------------> Active <-------------> Interacting
//!            set_enabled(false)        move end + debounce
//! ```
//!
//! Interaction collapses the queue (to next-navigation tasks, plus the
//! active layer's spatial tasks in keep-active mode), abandons the
//! corresponding in-flight loads and suspends the tick scheduler; the
//! debounced move-end performs a full re-plan.


use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::category::{CategoryWeights, PrefetchCategory};
use crate::config::PrefetchConfig;
use crate::error::ConfigError;
use crate::host::{
    LayerId, ListenerGuard, MapSurface, SurfaceEvent, TileEventListener, TileHandle, TileLayer,
};
use crate::loader::{DispatchOutcome, TileLoader};
use crate::planner::{self, PlanContext};
use crate::scheduler::TickScheduler;
use crate::stats::{IdleSlot, IdleWaiter, PrefetchStats, StatsCallback, StatsSnapshot};
use crate::task::{BackgroundLayerEntry, PrefetchTarget, PrefetchTask, TaskId};

/// Interaction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    /// Scheduling and fills are gated.
    Disabled,
    /// Enabled, not interacting: full planning and dispatch.
    Active,
    /// Enabled, user actively panning or zooming: background work is
    /// suspended except what the collapse rules retain.
    Interacting,
}

/// Handle to a persistent stats subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSubscription(u64);

/// Host-facing work gathered under the lock, executed after release.
#[derive(Default)]
struct Effects {
    triggers: Vec<Arc<dyn TileHandle>>,
    publish: Option<(StatsSnapshot, Vec<StatsCallback>)>,
    idle: Vec<IdleWaiter>,
}

struct ManagerInner {
    state: EngineState,
    keep_active: bool,
    buffer_factor: f64,
    max_concurrent: usize,
    debounce: Duration,
    idle_timeout: Duration,

    active_layer: Option<Arc<dyn TileLayer>>,
    background: Vec<BackgroundLayerEntry>,
    targets: Vec<PrefetchTarget>,
    excluded: HashSet<LayerId>,
    weights: CategoryWeights,

    queue: VecDeque<PrefetchTask>,
    /// Target list used by the previous full build; gates the display-only
    /// continuity rule for next-nav queued counts.
    last_planned_targets: Vec<PrefetchTarget>,

    loader: TileLoader,
    scheduler: TickScheduler,
    stats: PrefetchStats,

    debounce_token: Option<CancellationToken>,
    surface_guard: Option<ListenerGuard>,
    disposed: bool,
}

/// Anticipatory tile prefetch engine.
///
/// Construct with [`PrefetchManager::new`] inside a Tokio runtime; the
/// manager captures the runtime handle for its debounce, tick and idle
/// timers. All methods are synchronous; completion feedback arrives through
/// the one-shot listeners the engine attaches to host tile handles.
pub struct PrefetchManager {
    runtime: Handle,
    surface: Arc<dyn MapSurface>,
    weak_self: Weak<PrefetchManager>,
    inner: Mutex<ManagerInner>,
}

impl PrefetchManager {
    /// Creates the engine and subscribes to the host surface's events.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        surface: Arc<dyn MapSurface>,
        config: PrefetchConfig,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let runtime = Handle::current();
        let enabled = config.enabled;
        let keep_active = config.keep_active_during_interaction;
        let state = if enabled {
            EngineState::Active
        } else {
            EngineState::Disabled
        };

        let manager = Arc::new_cyclic(|weak| Self {
            runtime,
            surface: Arc::clone(&surface),
            weak_self: weak.clone(),
            inner: Mutex::new(ManagerInner {
                state,
                keep_active: config.keep_active_during_interaction,
                buffer_factor: config.buffer_factor,
                max_concurrent: config.max_concurrent_loads,
                debounce: config.interaction_debounce,
                idle_timeout: config.idle_timeout,
                active_layer: None,
                background: Vec::new(),
                targets: Vec::new(),
                excluded: config.excluded_layers.into_iter().collect(),
                weights: CategoryWeights::default(),
                queue: VecDeque::new(),
                last_planned_targets: Vec::new(),
                loader: TileLoader::new(),
                scheduler: TickScheduler::new(config.tick_interval, config.enabled),
                stats: PrefetchStats::new(),
                debounce_token: None,
                surface_guard: None,
                disposed: false,
            }),
        });

        let weak = Arc::downgrade(&manager);
        let guard = surface.subscribe(Box::new(move |event| {
            if let Some(manager) = weak.upgrade() {
                manager.handle_surface_event(event);
            }
        }));

        {
            let mut inner = manager.lock();
            inner.surface_guard = Some(guard);
            if inner.state == EngineState::Active {
                manager.schedule_tick_locked(&mut inner);
            }
        }

        info!(enabled, keep_active, "prefetch manager started");
        Ok(manager)
    }

    // ==================== Layer registry ====================

    /// Registers a layer for background prefetch.
    ///
    /// The registry is kept sorted ascending by priority; layers with equal
    /// priority keep registration order.
    pub fn register_background_layer(&self, layer: Arc<dyn TileLayer>, priority: u32) {
        self.mutate_and_replan(|inner| {
            let id = layer.id();
            inner.background.retain(|entry| entry.layer.id() != id);
            inner.background.push(BackgroundLayerEntry { layer, priority });
            inner.background.sort_by_key(|entry| entry.priority);
            debug!(layer = %id, priority, "background layer registered");
        });
    }

    /// Removes a layer from the background registry.
    pub fn unregister_background_layer(&self, id: &LayerId) {
        self.mutate_and_replan(|inner| {
            inner.background.retain(|entry| entry.layer.id() != *id);
            debug!(layer = %id, "background layer unregistered");
        });
    }

    /// Sets (or clears) the active layer.
    pub fn set_active_layer(&self, layer: Option<Arc<dyn TileLayer>>) {
        self.mutate_and_replan(|inner| {
            inner.active_layer = layer;
        });
    }

    // ==================== Next-navigation targets ====================

    /// Replaces the ordered next-target list.
    pub fn set_next_targets(&self, targets: Vec<PrefetchTarget>) {
        self.mutate_and_replan(|inner| {
            inner.targets = targets;
        });
    }

    /// Appends a target to the list.
    pub fn push_next_target(&self, target: PrefetchTarget) {
        self.mutate_and_replan(|inner| {
            inner.targets.push(target);
        });
    }

    /// Removes the target at `index`; out-of-range indexes are ignored.
    pub fn remove_next_target(&self, index: usize) {
        self.mutate_and_replan(|inner| {
            if index < inner.targets.len() {
                inner.targets.remove(index);
            }
        });
    }

    /// Clears the target list.
    pub fn clear_next_targets(&self) {
        self.mutate_and_replan(|inner| {
            inner.targets.clear();
        });
    }

    // ==================== Exclusion / configuration ====================

    /// Suppresses a layer from all planning without losing its
    /// registration, or lifts the suppression.
    pub fn set_layer_excluded(&self, id: &LayerId, excluded: bool) {
        self.mutate_and_replan(|inner| {
            if excluded {
                inner.excluded.insert(id.clone());
            } else {
                inner.excluded.remove(id);
            }
        });
    }

    /// Current concurrency cap.
    pub fn max_concurrent_loads(&self) -> usize {
        self.lock().max_concurrent
    }

    /// Sets the concurrency cap, immediately attempting further fills.
    pub fn set_max_concurrent_loads(&self, max: usize) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            if max == 0 {
                warn!("max concurrent loads must be >= 1; clamping");
            }
            inner.max_concurrent = max.max(1);
            self.fill_slots_locked(inner, &mut effects);
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    /// Configured weight of one category.
    pub fn category_weight(&self, category: PrefetchCategory) -> f64 {
        self.lock().weights.get(category)
    }

    /// Applies a partial category weight update.
    ///
    /// Weights must keep enough spacing that sub-priority offsets (all
    /// below 1.0) cannot reorder tasks across categories; see
    /// [`CategoryWeights::set`].
    pub fn set_category_weights(&self, updates: &[(PrefetchCategory, f64)]) {
        self.mutate_and_replan(|inner| {
            inner.weights.apply(updates);
        });
    }

    /// True unless disabled or disposed.
    pub fn is_enabled(&self) -> bool {
        self.lock().state != EngineState::Disabled
    }

    /// Enables or disables the engine. Re-enabling triggers an immediate
    /// re-plan and tick.
    pub fn set_enabled(&self, enabled: bool) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            if enabled {
                if inner.state != EngineState::Disabled {
                    return;
                }
                inner.state = EngineState::Active;
                inner.scheduler.set_enabled(true);
                info!("prefetch enabled");
                self.replan_locked(inner);
                self.fill_slots_locked(inner, &mut effects);
                self.schedule_tick_locked(inner);
            } else {
                if inner.state == EngineState::Disabled {
                    return;
                }
                if let Some(token) = inner.debounce_token.take() {
                    token.cancel();
                }
                inner.state = EngineState::Disabled;
                inner.scheduler.set_enabled(false);
                info!("prefetch disabled");
            }
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    // ==================== Stats ====================

    /// Subscribes a persistent stats callback.
    pub fn on_stats(
        &self,
        callback: impl Fn(StatsSnapshot) + Send + Sync + 'static,
    ) -> StatsSubscription {
        let mut guard = self.lock();
        StatsSubscription(guard.stats.subscribe(Arc::new(callback)))
    }

    /// Removes a stats subscription.
    pub fn unsubscribe_stats(&self, subscription: StatsSubscription) {
        self.lock().stats.unsubscribe(subscription.0);
    }

    /// One-shot callback for the first time `queued + loading` reaches
    /// zero, guarded by the configured default safety timeout.
    pub fn on_idle(&self, callback: impl FnOnce() + Send + 'static) {
        let timeout = self.lock().idle_timeout;
        self.on_idle_with_timeout(callback, timeout);
    }

    /// Same as [`on_idle`](Self::on_idle) with an explicit safety timeout:
    /// the callback always eventually fires, even if tiles never fully
    /// resolve due to persistent errors.
    pub fn on_idle_with_timeout(&self, callback: impl FnOnce() + Send + 'static, timeout: Duration) {
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            if !inner.stats.is_idle() {
                let slot: IdleSlot = Arc::new(Mutex::new(Some(Box::new(callback))));
                let token = CancellationToken::new();
                inner.stats.add_idle_waiter(IdleWaiter {
                    slot: Arc::clone(&slot),
                    timeout_token: token.clone(),
                });
                self.runtime.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(timeout) => {
                            let callback = slot.lock().ok().and_then(|mut slot| slot.take());
                            if let Some(callback) = callback {
                                trace!("idle subscription fired by safety timeout");
                                callback();
                            }
                        }
                    }
                });
                return;
            }
        }
        // Already idle: fire immediately, outside the lock.
        callback();
    }

    /// Immutable copy of the current bookkeeping.
    pub fn snapshot(&self) -> StatsSnapshot {
        let guard = self.lock();
        Self::publish_args(&guard).0
    }

    // ==================== Disposal ====================

    /// Detaches all host listeners, cancels timers, abandons in-flight work
    /// and clears every internal collection. Idempotent and terminal: any
    /// later public call is a no-op.
    pub fn dispose(&self) {
        let surface_guard;
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.state = EngineState::Disabled;
            if let Some(token) = inner.debounce_token.take() {
                token.cancel();
            }
            inner.scheduler.set_enabled(false);
            inner.loader.abandon_all(&mut inner.stats);
            inner.queue.clear();
            inner.background.clear();
            inner.targets.clear();
            inner.excluded.clear();
            inner.stats.dispose();
            surface_guard = inner.surface_guard.take();
            info!("prefetch manager disposed");
        }
        drop(surface_guard);
    }

    // ==================== Event handling ====================

    fn handle_surface_event(&self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::MoveStart => self.on_move_start(),
            SurfaceEvent::MoveEnd => self.on_move_end(),
            SurfaceEvent::FrameRendered => self.on_frame_rendered(),
        }
    }

    fn on_move_start(&self) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            // A new drag before the debounce elapsed keeps us interacting.
            if let Some(token) = inner.debounce_token.take() {
                token.cancel();
            }
            if inner.state != EngineState::Active {
                return;
            }
            inner.state = EngineState::Interacting;

            let active_id = inner.active_layer.as_ref().map(|layer| layer.id());
            match (inner.keep_active, active_id) {
                (true, Some(active_id)) => inner
                    .loader
                    .abandon_non_active(&active_id, &mut inner.stats),
                _ => inner.loader.abandon_all(&mut inner.stats),
            }

            let keep_active = inner.keep_active;
            inner.queue.retain(|task| {
                task.category.is_next_nav()
                    || (keep_active && task.category == PrefetchCategory::SpatialActive)
            });
            Self::recompute_queued(inner);
            inner.scheduler.suspend();

            debug!(
                keep_active,
                retained = inner.queue.len(),
                "interaction started; prefetch suspended"
            );
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    fn on_move_end(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.disposed {
            return;
        }
        match inner.state {
            EngineState::Interacting => {
                if let Some(token) = inner.debounce_token.take() {
                    token.cancel();
                }
                let token = CancellationToken::new();
                inner.debounce_token = Some(token.clone());
                let debounce = inner.debounce;
                let weak = self.weak_self.clone();
                self.runtime.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(debounce) => {
                            if let Some(manager) = weak.upgrade() {
                                manager.on_interaction_settled();
                            }
                        }
                    }
                });
            }
            // A settle without an observed move start (programmatic jump)
            // still warrants a re-plan.
            EngineState::Active => self.schedule_tick_locked(inner),
            EngineState::Disabled => {}
        }
    }

    fn on_interaction_settled(&self) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed || inner.state != EngineState::Interacting {
                return;
            }
            inner.debounce_token = None;
            inner.state = EngineState::Active;
            debug!("interaction settled; resuming full prefetch");

            self.replan_locked(inner);
            self.fill_slots_locked(inner, &mut effects);
            self.schedule_tick_locked(inner);
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    fn on_frame_rendered(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.disposed || inner.state != EngineState::Active {
            return;
        }
        if !inner.queue.is_empty() {
            self.schedule_tick_locked(inner);
        }
    }

    /// Tick body: yield to the host's demand loading, otherwise re-plan and
    /// fill.
    fn on_tick(&self) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.scheduler.fired();
            if inner.disposed || inner.state != EngineState::Active {
                return;
            }
            if self.host_busy() {
                trace!("host loading queue busy; deferring tick");
                self.schedule_tick_locked(inner);
                return;
            }
            self.replan_locked(inner);
            self.fill_slots_locked(inner, &mut effects);
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    /// Loader completion feedback: settle the task, then try to dispatch
    /// further work into the freed slot.
    fn on_tile_settled(&self, id: TaskId) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            if inner.loader.complete(&id, &mut inner.stats).is_none() {
                // Late completion of an abandoned task; inert.
                return;
            }
            self.fill_slots_locked(inner, &mut effects);
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    // ==================== Internals ====================

    fn lock(&self) -> MutexGuard<'_, ManagerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn host_busy(&self) -> bool {
        self.surface
            .pending_demand_loads()
            .is_some_and(|pending| pending > 0)
    }

    /// Config mutations share one shape: apply, re-plan under the current
    /// state's restrictions, fill, publish.
    fn mutate_and_replan(&self, mutate: impl FnOnce(&mut ManagerInner)) {
        let mut effects = Effects::default();
        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if inner.disposed {
                return;
            }
            mutate(inner);
            if inner.state != EngineState::Disabled {
                self.replan_locked(inner);
                self.fill_slots_locked(inner, &mut effects);
            }
            Self::collect_idle(inner, &mut effects);
            effects.publish = Some(Self::publish_args(inner));
        }
        self.run_effects(effects);
    }

    /// Rebuilds the queue for the current state.
    fn replan_locked(&self, inner: &mut ManagerInner) {
        match inner.state {
            EngineState::Disabled => {}
            EngineState::Active => {
                let targets_unchanged = inner.targets == inner.last_planned_targets;
                let tasks = {
                    let ManagerInner {
                        ref active_layer,
                        ref background,
                        ref targets,
                        ref excluded,
                        ref weights,
                        buffer_factor,
                        ref mut stats,
                        ..
                    } = *inner;
                    let ctx = PlanContext {
                        active_layer: active_layer.as_ref(),
                        background,
                        targets,
                        excluded,
                        weights,
                        buffer_factor,
                        targets_unchanged,
                    };
                    planner::build_queue(self.surface.as_ref(), &ctx, stats)
                };
                trace!(tasks = tasks.len(), "full re-plan");
                inner.queue = tasks.into();
                inner.last_planned_targets = inner.targets.clone();
            }
            EngineState::Interacting => {
                // Keep next-navigation work; rebuild only the active
                // layer's spatial buffer when keep-active mode allows it.
                let retained: Vec<PrefetchTask> = inner
                    .queue
                    .drain(..)
                    .filter(|task| task.category.is_next_nav())
                    .collect();
                let mut tasks = if inner.keep_active {
                    let ManagerInner {
                        ref active_layer,
                        ref background,
                        ref targets,
                        ref excluded,
                        ref weights,
                        buffer_factor,
                        ref mut stats,
                        ..
                    } = *inner;
                    let ctx = PlanContext {
                        active_layer: active_layer.as_ref(),
                        background,
                        targets,
                        excluded,
                        weights,
                        buffer_factor,
                        targets_unchanged: true,
                    };
                    planner::build_active_spatial_queue(self.surface.as_ref(), &ctx, stats)
                } else {
                    Vec::new()
                };
                tasks.extend(retained);
                tasks.sort_by(|a, b| {
                    a.priority
                        .partial_cmp(&b.priority)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                let mut seen = HashSet::new();
                tasks.retain(|task| seen.insert(task.id.clone()));
                inner.queue = tasks.into();
                Self::recompute_queued(inner);
            }
        }
    }

    /// Re-derives every queued counter from the queue itself; used after
    /// collapse operations.
    fn recompute_queued(inner: &mut ManagerInner) {
        inner.stats.reset_queued();
        for task in &inner.queue {
            inner.stats.inc_queued(task.category);
        }
    }

    fn eligible(state: EngineState, keep_active: bool, task: &PrefetchTask) -> bool {
        match state {
            EngineState::Active => true,
            EngineState::Disabled => false,
            EngineState::Interacting => {
                keep_active && task.category == PrefetchCategory::SpatialActive
            }
        }
    }

    /// Dispatches queued tasks into free slots, highest priority first,
    /// yielding to the host's own loading and to the current state's
    /// eligibility filter.
    fn fill_slots_locked(&self, inner: &mut ManagerInner, effects: &mut Effects) {
        loop {
            if inner.disposed || inner.state == EngineState::Disabled {
                return;
            }
            if inner.loader.in_flight_count() >= inner.max_concurrent {
                return;
            }
            if inner.queue.is_empty() {
                return;
            }
            if self.host_busy() {
                // Background prefetch always yields bandwidth to demand.
                self.schedule_tick_locked(inner);
                return;
            }

            let position = inner
                .queue
                .iter()
                .position(|task| Self::eligible(inner.state, inner.keep_active, task));
            let Some(position) = position else {
                // Queue holds only currently-ineligible tasks; check back on
                // the next tick rather than spinning.
                self.schedule_tick_locked(inner);
                return;
            };

            let Some(task) = inner.queue.remove(position) else {
                return;
            };
            inner.stats.dequeued(task.category);

            let listener = self.completion_listener(task.id.clone());
            match inner.loader.start_task(&task, listener, &mut inner.stats) {
                DispatchOutcome::Started(handle) => effects.triggers.push(handle),
                DispatchOutcome::AlreadyLoaded
                | DispatchOutcome::AlreadyLoading
                | DispatchOutcome::Invalid => {}
            }
        }
    }

    fn completion_listener(&self, id: TaskId) -> TileEventListener {
        let weak = self.weak_self.clone();
        Box::new(move || {
            if let Some(manager) = weak.upgrade() {
                manager.on_tile_settled(id);
            }
        })
    }

    /// Arms the coalesced tick timer; no-op while one is pending, outside
    /// the Active state, or when scheduling is disabled.
    fn schedule_tick_locked(&self, inner: &mut ManagerInner) {
        if inner.disposed || inner.state != EngineState::Active {
            return;
        }
        let Some(token) = inner.scheduler.request() else {
            return;
        };
        let interval = inner.scheduler.interval();
        let weak = self.weak_self.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    if let Some(manager) = weak.upgrade() {
                        manager.on_tick();
                    }
                }
            }
        });
    }

    fn collect_idle(inner: &mut ManagerInner, effects: &mut Effects) {
        if inner.stats.is_idle() {
            effects.idle.extend(inner.stats.take_idle_waiters());
        }
    }

    fn publish_args(inner: &ManagerInner) -> (StatsSnapshot, Vec<StatsCallback>) {
        let snapshot = inner.stats.snapshot(
            inner.state != EngineState::Disabled,
            inner.state == EngineState::Interacting,
            inner.targets.clone(),
            &inner.weights,
        );
        (snapshot, inner.stats.subscribers())
    }

    /// Runs host-facing work outside the lock: load triggers first, then
    /// stats publication, then idle callbacks. Any of these may synchronously
    /// re-enter the engine.
    fn run_effects(&self, effects: Effects) {
        for handle in effects.triggers {
            handle.request_load();
        }
        if let Some((snapshot, subscribers)) = effects.publish {
            for subscriber in &subscribers {
                subscriber(snapshot.clone());
            }
        }
        for waiter in effects.idle {
            waiter.timeout_token.cancel();
            let callback = waiter.slot.lock().ok().and_then(|mut slot| slot.take());
            if let Some(callback) = callback {
                callback();
            }
        }
    }
}

impl Drop for PrefetchManager {
    fn drop(&mut self) {
        // Arc cycles are avoided by weak references, but timers may still
        // hold tokens; disposal is the explicit path and drop is best
        // effort.
        let mut inner = self.lock();
        if !inner.disposed {
            inner.disposed = true;
            inner.scheduler.set_enabled(false);
            if let Some(token) = inner.debounce_token.take() {
                token.cancel();
            }
        }
    }
}
