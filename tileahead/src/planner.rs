//! Queue planning: computes the full candidate task set for the current
//! engine state.
//!
//! Planning is a pure computation over the view state, the active layer, the
//! background registry and the next-navigation targets; it mutates nothing
//! but the queued counters it is handed. Candidates that cannot be resolved
//! (missing source, malformed grid) are skipped locally and never abort the
//! rest of the pass.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::category::{
    CategoryWeights, PrefetchCategory, LAYER_PRIORITY_SCALE, TARGET_PRIORITY_STEP,
};
use crate::coord::{buffered_extent, rounded_zoom, Extent};
use crate::host::{LayerId, MapSurface, TileLayer, TileLoadState};
use crate::stats::PrefetchStats;
use crate::task::{BackgroundLayerEntry, PrefetchTarget, PrefetchTask, TaskId};

/// Inputs to one planning pass, borrowed from the manager.
pub(crate) struct PlanContext<'a> {
    pub active_layer: Option<&'a Arc<dyn TileLayer>>,
    pub background: &'a [BackgroundLayerEntry],
    pub targets: &'a [PrefetchTarget],
    pub excluded: &'a HashSet<LayerId>,
    pub weights: &'a CategoryWeights,
    pub buffer_factor: f64,
    /// True when the registered target set matches the previous build; gates
    /// the display-only continuity rule for next-nav queued counts.
    pub targets_unchanged: bool,
}

impl<'a> PlanContext<'a> {
    fn is_excluded(&self, id: &LayerId) -> bool {
        self.excluded.contains(id)
    }

    fn active_id(&self) -> Option<LayerId> {
        self.active_layer.map(|layer| layer.id())
    }
}

/// Builds the complete prefetch queue for the current state, sorted
/// ascending by priority (stable with respect to append order).
///
/// Queued counters are reset and recomputed to reflect only this plan, with
/// one exception: if the target set is unchanged and a next-nav category's
/// fresh count is transiently zero, the previous non-zero count is retained
/// for display. That retention never affects which tasks are scheduled.
pub(crate) fn build_queue(
    surface: &dyn MapSurface,
    ctx: &PlanContext<'_>,
    stats: &mut PrefetchStats,
) -> Vec<PrefetchTask> {
    let prev_nav_active = stats.category(PrefetchCategory::NextNavActive).queued;
    let prev_nav_background = stats.category(PrefetchCategory::NextNavBackground).queued;
    stats.reset_queued();

    let Some(view) = surface.view() else {
        trace!("viewport geometry not resolvable; planning empty queue");
        return Vec::new();
    };

    let mut builder = QueueBuilder::new();
    let active_id = ctx.active_id();

    // Active layer: offscreen ring around the visible extent.
    if let Some(active) = ctx.active_layer {
        if !ctx.is_excluded(&active.id()) {
            builder.spatial_ring(
                active,
                &view.extent,
                view.zoom,
                ctx.buffer_factor,
                PrefetchCategory::SpatialActive,
                ctx.weights.get(PrefetchCategory::SpatialActive),
                stats,
            );
        }
    }

    // Background layers: the current viewport, no speculative buffer.
    let background_zoom = view.zoom;
    for entry in ctx.background {
        let id = entry.layer.id();
        if Some(&id) == active_id.as_ref() || ctx.is_excluded(&id) {
            continue;
        }
        let priority = ctx.weights.get(PrefetchCategory::BackgroundViewport)
            + entry.priority as f64 * LAYER_PRIORITY_SCALE;
        builder.viewport_tiles(
            &entry.layer,
            &view.extent,
            background_zoom,
            PrefetchCategory::BackgroundViewport,
            priority,
            stats,
        );
    }

    // Next-navigation targets, in list order.
    for (index, target) in ctx.targets.iter().enumerate() {
        let Some(extent) = surface.extent_at(target.center, target.zoom) else {
            debug!(
                target = index,
                zoom = target.zoom,
                "target extent not resolvable; skipping"
            );
            continue;
        };
        let offset = index as f64 * TARGET_PRIORITY_STEP;

        if let Some(active) = ctx.active_layer {
            if !ctx.is_excluded(&active.id()) {
                let priority = ctx.weights.get(PrefetchCategory::NextNavActive) + offset;
                builder.viewport_tiles(
                    active,
                    &extent,
                    target.zoom,
                    PrefetchCategory::NextNavActive,
                    priority,
                    stats,
                );
                builder.spatial_ring(
                    active,
                    &extent,
                    target.zoom,
                    ctx.buffer_factor,
                    PrefetchCategory::NextNavActive,
                    priority,
                    stats,
                );
            }
        }

        for entry in ctx.background {
            let id = entry.layer.id();
            if Some(&id) == active_id.as_ref() || ctx.is_excluded(&id) {
                continue;
            }
            let priority = ctx.weights.get(PrefetchCategory::NextNavBackground)
                + offset
                + entry.priority as f64 * LAYER_PRIORITY_SCALE;
            builder.viewport_tiles(
                &entry.layer,
                &extent,
                target.zoom,
                PrefetchCategory::NextNavBackground,
                priority,
                stats,
            );
        }
    }

    // Display continuity: a transiently empty next-nav recomputation keeps
    // the previous count on screen while the same targets are registered.
    if ctx.targets_unchanged {
        if stats.category(PrefetchCategory::NextNavActive).queued == 0 && prev_nav_active > 0 {
            stats.set_queued(PrefetchCategory::NextNavActive, prev_nav_active);
        }
        if stats.category(PrefetchCategory::NextNavBackground).queued == 0
            && prev_nav_background > 0
        {
            stats.set_queued(PrefetchCategory::NextNavBackground, prev_nav_background);
        }
    }

    builder.into_sorted()
}

/// Restricted build used while interaction is in progress: only the active
/// layer's offscreen buffer, with the same buffer math as the full build.
pub(crate) fn build_active_spatial_queue(
    surface: &dyn MapSurface,
    ctx: &PlanContext<'_>,
    stats: &mut PrefetchStats,
) -> Vec<PrefetchTask> {
    stats.reset_queued();

    let Some(view) = surface.view() else {
        return Vec::new();
    };

    let mut builder = QueueBuilder::new();
    if let Some(active) = ctx.active_layer {
        if !ctx.is_excluded(&active.id()) {
            builder.spatial_ring(
                active,
                &view.extent,
                view.zoom,
                ctx.buffer_factor,
                PrefetchCategory::SpatialActive,
                ctx.weights.get(PrefetchCategory::SpatialActive),
                stats,
            );
        }
    }

    builder.into_sorted()
}

/// Accumulates candidate tasks, deduplicating by task id within the pass.
struct QueueBuilder {
    tasks: Vec<PrefetchTask>,
    seen: HashSet<TaskId>,
}

impl QueueBuilder {
    fn new() -> Self {
        Self {
            tasks: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Appends one candidate unless it is a duplicate, already loaded or
    /// loading, or cannot be resolved.
    fn enqueue(
        &mut self,
        layer: &Arc<dyn TileLayer>,
        coord: crate::coord::TileCoord,
        category: PrefetchCategory,
        priority: f64,
        stats: &mut PrefetchStats,
    ) {
        let id = TaskId::new(layer.id(), coord);
        if self.seen.contains(&id) {
            return;
        }

        let handle = match layer.tile(coord) {
            Ok(handle) => handle,
            Err(error) => {
                trace!(layer = %id.layer, tile = %coord, %error, "candidate skipped");
                return;
            }
        };

        // Loaded and in-flight tiles belong to the host's own lifecycle.
        match handle.load_state() {
            TileLoadState::Loaded | TileLoadState::Loading => return,
            TileLoadState::Idle | TileLoadState::Error | TileLoadState::Empty => {}
        }

        self.seen.insert(id);
        stats.inc_queued(category);
        self.tasks
            .push(PrefetchTask::new(Arc::clone(layer), coord, category, priority));
    }

    /// Every tile covering `extent` at the rounded zoom.
    fn viewport_tiles(
        &mut self,
        layer: &Arc<dyn TileLayer>,
        extent: &Extent,
        zoom: f64,
        category: PrefetchCategory,
        priority: f64,
        stats: &mut PrefetchStats,
    ) {
        let z = rounded_zoom(zoom);
        let range = match layer.tile_range(extent, z) {
            Ok(range) => range,
            Err(error) => {
                debug!(layer = %layer.id(), %error, "tile range unavailable");
                return;
            }
        };
        for coord in range.iter() {
            self.enqueue(layer, coord, category, priority, stats);
        }
    }

    /// Only the offscreen tiles of the buffered extent: the covering range
    /// of the buffered extent minus the covering range of the visible one.
    #[allow(clippy::too_many_arguments)]
    fn spatial_ring(
        &mut self,
        layer: &Arc<dyn TileLayer>,
        extent: &Extent,
        zoom: f64,
        buffer_factor: f64,
        category: PrefetchCategory,
        priority: f64,
        stats: &mut PrefetchStats,
    ) {
        let z = rounded_zoom(zoom);
        let visible = match layer.tile_range(extent, z) {
            Ok(range) => range,
            Err(error) => {
                debug!(layer = %layer.id(), %error, "tile range unavailable");
                return;
            }
        };
        let buffered = buffered_extent(extent, buffer_factor);
        let ring = match layer.tile_range(&buffered, z) {
            Ok(range) => range,
            Err(error) => {
                debug!(layer = %layer.id(), %error, "buffered tile range unavailable");
                return;
            }
        };

        for coord in ring.iter() {
            if !visible.contains(&coord) {
                self.enqueue(layer, coord, category, priority, stats);
            }
        }
    }

    /// Finishes the pass: ascending by priority, stable for equal
    /// priorities so append order (category, registration order, target
    /// order) breaks ties.
    fn into_sorted(mut self) -> Vec<PrefetchTask> {
        self.tasks.sort_by(|a, b| {
            a.priority
                .partial_cmp(&b.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{Coordinate, TileCoord, TileRange};
    use crate::error::HostError;
    use crate::host::{
        ListenerGuard, SurfaceListener, TileEventListener, TileHandle, ViewState,
    };
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeHandle(TileLoadState);

    impl TileHandle for FakeHandle {
        fn load_state(&self) -> TileLoadState {
            self.0
        }
        fn error_detail(&self) -> Option<String> {
            None
        }
        fn on_settled(&self, _listener: TileEventListener) -> ListenerGuard {
            ListenerGuard::noop()
        }
        fn request_load(&self) {}
    }

    /// Layer with a one-unit-per-tile grid; individual tile states can be
    /// overridden and resolution failures forced.
    struct FakeLayer {
        id: LayerId,
        states: Mutex<HashMap<TileCoord, TileLoadState>>,
        broken: bool,
    }

    impl FakeLayer {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: LayerId::new(id),
                states: Mutex::new(HashMap::new()),
                broken: false,
            })
        }

        fn broken(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: LayerId::new(id),
                states: Mutex::new(HashMap::new()),
                broken: true,
            })
        }

        fn set_state(&self, coord: TileCoord, state: TileLoadState) {
            self.states.lock().unwrap().insert(coord, state);
        }
    }

    impl TileLayer for FakeLayer {
        fn id(&self) -> LayerId {
            self.id.clone()
        }
        fn name(&self) -> &str {
            self.id.as_str()
        }
        fn tile_range(&self, extent: &Extent, zoom: u8) -> Result<TileRange, HostError> {
            if self.broken {
                return Err(HostError::NoGrid);
            }
            Ok(TileRange::new(
                zoom,
                extent.min_x.floor().max(0.0) as u32,
                extent.min_y.floor().max(0.0) as u32,
                extent.max_x.floor().max(0.0) as u32,
                extent.max_y.floor().max(0.0) as u32,
            ))
        }
        fn tile(&self, coord: TileCoord) -> Result<Arc<dyn TileHandle>, HostError> {
            if self.broken {
                return Err(HostError::NoSource);
            }
            let state = self
                .states
                .lock()
                .unwrap()
                .get(&coord)
                .copied()
                .unwrap_or(TileLoadState::Idle);
            Ok(Arc::new(FakeHandle(state)))
        }
    }

    struct FakeSurface {
        view: Option<ViewState>,
        target_extents: bool,
    }

    impl FakeSurface {
        fn with_view(extent: Extent, zoom: f64) -> Self {
            Self {
                view: Some(ViewState {
                    center: extent.center(),
                    zoom,
                    extent,
                }),
                target_extents: true,
            }
        }

        fn without_view() -> Self {
            Self {
                view: None,
                target_extents: true,
            }
        }
    }

    impl MapSurface for FakeSurface {
        fn view(&self) -> Option<ViewState> {
            self.view
        }
        fn extent_at(&self, center: Coordinate, _zoom: f64) -> Option<Extent> {
            self.target_extents.then(|| {
                Extent::new(center.x - 1.0, center.y - 1.0, center.x + 1.0, center.y + 1.0)
            })
        }
        fn pending_demand_loads(&self) -> Option<usize> {
            None
        }
        fn subscribe(&self, _listener: SurfaceListener) -> ListenerGuard {
            ListenerGuard::noop()
        }
    }

    fn context<'a>(
        active: Option<&'a Arc<dyn TileLayer>>,
        background: &'a [BackgroundLayerEntry],
        targets: &'a [PrefetchTarget],
        excluded: &'a HashSet<LayerId>,
        weights: &'a CategoryWeights,
    ) -> PlanContext<'a> {
        PlanContext {
            active_layer: active,
            background,
            targets,
            excluded,
            weights,
            buffer_factor: 2.0,
            targets_unchanged: false,
        }
    }

    fn as_dyn(layer: &Arc<FakeLayer>) -> Arc<dyn TileLayer> {
        Arc::clone(layer) as Arc<dyn TileLayer>
    }

    #[test]
    fn test_empty_queue_without_view() {
        let surface = FakeSurface::without_view();
        let active = as_dyn(&FakeLayer::new("base"));
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &[], &excluded, &weights),
            &mut stats,
        );
        assert!(queue.is_empty());
        assert_eq!(stats.queued_total(), 0);
    }

    #[test]
    fn test_spatial_ring_excludes_visible_tiles() {
        // Visible 10..=12 squared (9 tiles); factor 2.0 buffers one unit on
        // each side, 9..=13 squared (25 tiles) -> ring of 16.
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &[], &excluded, &weights),
            &mut stats,
        );

        assert_eq!(queue.len(), 16);
        assert!(queue
            .iter()
            .all(|t| t.category == PrefetchCategory::SpatialActive));
        let visible = TileRange::new(5, 10, 10, 12, 12);
        assert!(queue.iter().all(|t| !visible.contains(&t.coord)));
        assert_eq!(stats.category(PrefetchCategory::SpatialActive).queued, 16);
    }

    #[test]
    fn test_background_layers_ordered_by_registered_priority() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 11.0, 11.0), 5.0);
        let slow = FakeLayer::new("slow");
        let fast = FakeLayer::new("fast");
        let background = vec![
            BackgroundLayerEntry {
                layer: as_dyn(&fast),
                priority: 1,
            },
            BackgroundLayerEntry {
                layer: as_dyn(&slow),
                priority: 10,
            },
        ];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(None, &background, &[], &excluded, &weights),
            &mut stats,
        );

        // 4 tiles per layer; every fast tile sorts before every slow tile.
        assert_eq!(queue.len(), 8);
        let first_slow = queue
            .iter()
            .position(|t| t.id.layer == LayerId::new("slow"))
            .unwrap();
        let last_fast = queue
            .iter()
            .rposition(|t| t.id.layer == LayerId::new("fast"))
            .unwrap();
        assert!(last_fast < first_slow);
        assert_eq!(
            stats.category(PrefetchCategory::BackgroundViewport).queued,
            8
        );
    }

    #[test]
    fn test_no_targets_no_next_nav_tasks() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let background = vec![BackgroundLayerEntry {
            layer: as_dyn(&FakeLayer::new("overlay")),
            priority: 1,
        }];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &background, &[], &excluded, &weights),
            &mut stats,
        );

        assert!(queue.iter().all(|t| !t.category.is_next_nav()));
    }

    #[test]
    fn test_target_order_within_category() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 11.0, 11.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let targets = vec![
            PrefetchTarget::new(Coordinate::new(50.0, 50.0), 5.0),
            PrefetchTarget::new(Coordinate::new(80.0, 80.0), 5.0),
        ];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &targets, &excluded, &weights),
            &mut stats,
        );

        let nav: Vec<&PrefetchTask> = queue
            .iter()
            .filter(|t| t.category == PrefetchCategory::NextNavActive)
            .collect();
        assert!(!nav.is_empty());

        // Every first-target tile precedes every second-target tile.
        let first_of_second = nav.iter().position(|t| t.coord.x >= 60).unwrap();
        assert!(nav[..first_of_second].iter().all(|t| t.coord.x <= 52));
        // Offsets stay within the category's weight band.
        for task in &nav {
            assert!(task.priority >= 4.0 && task.priority < 5.0);
        }
    }

    #[test]
    fn test_loaded_and_loading_tiles_skipped() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let layer = FakeLayer::new("base");
        layer.set_state(TileCoord::new(5, 9, 9), TileLoadState::Loaded);
        layer.set_state(TileCoord::new(5, 10, 9), TileLoadState::Loading);
        let active = as_dyn(&layer);
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &[], &excluded, &weights),
            &mut stats,
        );

        assert_eq!(queue.len(), 14);
        assert!(queue
            .iter()
            .all(|t| t.coord != TileCoord::new(5, 9, 9) && t.coord != TileCoord::new(5, 10, 9)));
    }

    #[test]
    fn test_broken_layer_does_not_abort_pass() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::broken("cracked"));
        let background = vec![BackgroundLayerEntry {
            layer: as_dyn(&FakeLayer::new("overlay")),
            priority: 1,
        }];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &background, &[], &excluded, &weights),
            &mut stats,
        );

        // The healthy background layer still planned its 9 viewport tiles.
        assert_eq!(queue.len(), 9);
        assert!(queue
            .iter()
            .all(|t| t.category == PrefetchCategory::BackgroundViewport));
    }

    #[test]
    fn test_excluded_layer_is_suppressed() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let overlay = FakeLayer::new("overlay");
        let background = vec![BackgroundLayerEntry {
            layer: as_dyn(&overlay),
            priority: 1,
        }];
        let mut excluded = HashSet::new();
        excluded.insert(LayerId::new("overlay"));
        let weights = CategoryWeights::default();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &background, &[], &excluded, &weights),
            &mut stats,
        );

        assert!(queue.iter().all(|t| t.id.layer != LayerId::new("overlay")));
    }

    #[test]
    fn test_duplicate_tiles_enqueued_once() {
        // A target centered on the current viewport overlaps the active
        // layer's spatial ring; shared tiles keep their first (spatial)
        // entry.
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let targets = vec![PrefetchTarget::new(Coordinate::new(11.0, 11.0), 5.0)];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &targets, &excluded, &weights),
            &mut stats,
        );

        let mut ids = HashSet::new();
        for task in &queue {
            assert!(ids.insert(task.id.clone()), "duplicate id {}", task.id);
        }
    }

    #[test]
    fn test_next_nav_count_continuity_is_display_only() {
        let layer = FakeLayer::new("base");
        let active = as_dyn(&layer);
        let targets = vec![PrefetchTarget::new(Coordinate::new(50.0, 50.0), 5.0)];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 11.0, 11.0), 5.0);
        let queue = build_queue(
            &surface,
            &context(Some(&active), &[], &targets, &excluded, &weights),
            &mut stats,
        );
        let nav_count = stats.category(PrefetchCategory::NextNavActive).queued;
        assert!(nav_count > 0);
        assert!(!queue.is_empty());

        // Same targets, but their extents transiently unresolvable.
        let mut blind = FakeSurface::with_view(Extent::new(10.0, 10.0, 11.0, 11.0), 5.0);
        blind.target_extents = false;
        let mut ctx = context(Some(&active), &[], &targets, &excluded, &weights);
        ctx.targets_unchanged = true;
        let queue = build_queue(&blind, &ctx, &mut stats);

        // Count retained for display, but no next-nav task was scheduled.
        assert_eq!(
            stats.category(PrefetchCategory::NextNavActive).queued,
            nav_count
        );
        assert!(queue.iter().all(|t| !t.category.is_next_nav()));
    }

    #[test]
    fn test_restricted_build_is_spatial_only() {
        let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
        let active = as_dyn(&FakeLayer::new("base"));
        let background = vec![BackgroundLayerEntry {
            layer: as_dyn(&FakeLayer::new("overlay")),
            priority: 1,
        }];
        let targets = vec![PrefetchTarget::new(Coordinate::new(50.0, 50.0), 5.0)];
        let weights = CategoryWeights::default();
        let excluded = HashSet::new();
        let mut stats = PrefetchStats::new();

        let queue = build_active_spatial_queue(
            &surface,
            &context(Some(&active), &background, &targets, &excluded, &weights),
            &mut stats,
        );

        assert_eq!(queue.len(), 16);
        assert!(queue
            .iter()
            .all(|t| t.category == PrefetchCategory::SpatialActive));
    }

    proptest! {
        /// Property: any planned queue is non-decreasing in priority.
        #[test]
        fn prop_queue_sorted_by_priority(
            priorities in proptest::collection::vec(0u32..100, 0..5),
            target_count in 0usize..4,
        ) {
            let surface = FakeSurface::with_view(Extent::new(10.0, 10.0, 12.0, 12.0), 5.0);
            let active = as_dyn(&FakeLayer::new("base"));
            let layers: Vec<Arc<FakeLayer>> = priorities
                .iter()
                .enumerate()
                .map(|(i, _)| FakeLayer::new(&format!("bg-{i}")))
                .collect();
            let background: Vec<BackgroundLayerEntry> = layers
                .iter()
                .zip(&priorities)
                .map(|(layer, &priority)| BackgroundLayerEntry {
                    layer: as_dyn(layer),
                    priority,
                })
                .collect();
            let targets: Vec<PrefetchTarget> = (0..target_count)
                .map(|i| PrefetchTarget::new(Coordinate::new(40.0 + 10.0 * i as f64, 40.0), 5.0))
                .collect();
            let weights = CategoryWeights::default();
            let excluded = HashSet::new();
            let mut stats = PrefetchStats::new();

            let queue = build_queue(
                &surface,
                &context(Some(&active), &background, &targets, &excluded, &weights),
                &mut stats,
            );

            for pair in queue.windows(2) {
                prop_assert!(pair[0].priority <= pair[1].priority);
            }

            let mut ids = HashSet::new();
            for task in &queue {
                prop_assert!(ids.insert(task.id.clone()));
            }
        }
    }
}
