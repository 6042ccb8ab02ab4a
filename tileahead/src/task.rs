//! Shared value shapes: prefetch tasks, background-layer registrations and
//! next-navigation targets.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::category::PrefetchCategory;
use crate::coord::{Coordinate, TileCoord};
use crate::host::{LayerId, TileLayer};

/// Identity of a planned tile load.
///
/// Derived deterministically from the layer identity and the tile
/// coordinate, so the same physical tile is never double-enqueued within one
/// planning pass.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TaskId {
    pub layer: LayerId,
    pub coord: TileCoord,
}

impl TaskId {
    pub fn new(layer: LayerId, coord: TileCoord) -> Self {
        Self { layer, coord }
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.layer, self.coord)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.layer, self.coord)
    }
}

/// One planned, not-yet-dispatched (or in-flight) tile load.
///
/// Created by the planner, consumed by the loader on dispatch or destroyed
/// by queue replacement on re-planning.
#[derive(Clone)]
pub struct PrefetchTask {
    pub id: TaskId,
    /// Total-ordered priority: category weight plus sub-priority offsets.
    /// Lower dispatches first.
    pub priority: f64,
    pub category: PrefetchCategory,
    pub layer: Arc<dyn TileLayer>,
    pub coord: TileCoord,
    pub created_at: Instant,
}

impl PrefetchTask {
    pub fn new(
        layer: Arc<dyn TileLayer>,
        coord: TileCoord,
        category: PrefetchCategory,
        priority: f64,
    ) -> Self {
        Self {
            id: TaskId::new(layer.id(), coord),
            priority,
            category,
            layer,
            coord,
            created_at: Instant::now(),
        }
    }
}

impl fmt::Debug for PrefetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("category", &self.category)
            .finish()
    }
}

/// A layer registered as eligible for background prefetch.
#[derive(Clone)]
pub struct BackgroundLayerEntry {
    pub layer: Arc<dyn TileLayer>,
    /// Relative priority among background layers; lower loads first. Ties
    /// keep registration order.
    pub priority: u32,
}

impl fmt::Debug for BackgroundLayerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundLayerEntry")
            .field("layer", &self.layer.id())
            .field("priority", &self.priority)
            .finish()
    }
}

/// An anticipated future viewport for which tiles are preloaded before the
/// user arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchTarget {
    pub center: Coordinate,
    pub zoom: f64,
}

impl PrefetchTarget {
    pub fn new(center: Coordinate, zoom: f64) -> Self {
        Self { center, zoom }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::coord::{Extent, TileRange};
    use crate::host::{ListenerGuard, TileEventListener, TileHandle, TileLoadState};

    struct StubHandle;

    impl TileHandle for StubHandle {
        fn load_state(&self) -> TileLoadState {
            TileLoadState::Idle
        }
        fn error_detail(&self) -> Option<String> {
            None
        }
        fn on_settled(&self, _listener: TileEventListener) -> ListenerGuard {
            ListenerGuard::noop()
        }
        fn request_load(&self) {}
    }

    struct StubLayer(LayerId);

    impl TileLayer for StubLayer {
        fn id(&self) -> LayerId {
            self.0.clone()
        }
        fn name(&self) -> &str {
            self.0.as_str()
        }
        fn tile_range(&self, _extent: &Extent, zoom: u8) -> Result<TileRange, HostError> {
            Ok(TileRange::new(zoom, 0, 0, 0, 0))
        }
        fn tile(&self, _coord: TileCoord) -> Result<Arc<dyn TileHandle>, HostError> {
            Ok(Arc::new(StubHandle))
        }
    }

    #[test]
    fn test_task_id_is_deterministic() {
        let coord = TileCoord::new(12, 100, 200);
        let a = TaskId::new(LayerId::new("base"), coord);
        let b = TaskId::new(LayerId::new("base"), coord);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "base:12/100/200");
    }

    #[test]
    fn test_task_id_distinguishes_layers() {
        let coord = TileCoord::new(12, 100, 200);
        let a = TaskId::new(LayerId::new("base"), coord);
        let b = TaskId::new(LayerId::new("overlay"), coord);
        assert_ne!(a, b);
    }

    #[test]
    fn test_task_carries_layer_identity() {
        let layer: Arc<dyn TileLayer> = Arc::new(StubLayer(LayerId::new("base")));
        let task = PrefetchTask::new(
            layer,
            TileCoord::new(10, 1, 2),
            PrefetchCategory::SpatialActive,
            1.0,
        );
        assert_eq!(task.id.layer, LayerId::new("base"));
        assert_eq!(task.coord, TileCoord::new(10, 1, 2));
        assert_eq!(task.category, PrefetchCategory::SpatialActive);
    }
}
