//! Capability interfaces consumed from the host rendering surface.
//!
//! The engine only ever talks to the host through the narrow traits in this
//! module: a [`MapSurface`] for view state and eventing, a [`TileLayer`] for
//! tile grid math and handle resolution, and a [`TileHandle`] for the
//! lifecycle of one tile. A different host can be adapted by implementing
//! these without touching the scheduler.
//!
//! Capability methods are expected to return quickly and must not call back
//! into the engine synchronously. The one sanctioned exception is
//! [`TileHandle::request_load`], which may settle the handle (and therefore
//! fire its listener) on the calling thread; the engine always invokes it
//! outside its internal lock.

use std::fmt;
use std::sync::Arc;

use crate::coord::{Coordinate, Extent, TileCoord, TileRange};
use crate::error::HostError;

/// Lifecycle state of a tile handle, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLoadState {
    /// Not yet requested.
    Idle,
    /// A load is outstanding.
    Loading,
    /// Imagery is available.
    Loaded,
    /// The load failed.
    Error,
    /// The load completed with no imagery for this coordinate.
    Empty,
}

impl fmt::Display for TileLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TileLoadState::Idle => "idle",
            TileLoadState::Loading => "loading",
            TileLoadState::Loaded => "loaded",
            TileLoadState::Error => "error",
            TileLoadState::Empty => "empty",
        };
        f.write_str(label)
    }
}

/// One-shot listener invoked when a tile handle settles.
pub type TileEventListener = Box<dyn FnOnce() + Send>;

/// Listener for surface events.
pub type SurfaceListener = Box<dyn Fn(SurfaceEvent) + Send + Sync>;

/// Detach handle for a host subscription.
///
/// Dropping the guard detaches the listener. Hosts must treat detaching an
/// already-fired one-shot listener as a no-op, so abandonment is always a
/// plain detach-and-forget.
pub struct ListenerGuard {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerGuard {
    /// Wraps a detach closure provided by the host.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A guard with nothing to detach.
    pub fn noop() -> Self {
        Self { detach: None }
    }

    /// Detaches immediately instead of waiting for drop.
    pub fn detach(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Stable identity of a layer, used for task ids, registries and exclusion.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LayerId(Arc<str>);

impl LayerId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Handle to one tile owned by the host's tile lifecycle bookkeeping.
pub trait TileHandle: Send + Sync {
    /// Current lifecycle state.
    fn load_state(&self) -> TileLoadState;

    /// Failure detail attached by the fetch layer, if any.
    fn error_detail(&self) -> Option<String>;

    /// Subscribes a one-shot listener that fires when the handle leaves the
    /// loading state. Returns the detach guard.
    fn on_settled(&self, listener: TileEventListener) -> ListenerGuard;

    /// Asks the host to begin loading this tile.
    ///
    /// The engine never calls this for a handle already loading or loaded.
    fn request_load(&self);
}

/// A tile layer as seen by the engine: identity plus tile grid math.
pub trait TileLayer: Send + Sync {
    /// Stable identity.
    fn id(&self) -> LayerId;

    /// Display name, used in error records.
    fn name(&self) -> &str;

    /// Tile range covering `extent` at integer zoom `zoom`.
    fn tile_range(&self, extent: &Extent, zoom: u8) -> Result<TileRange, HostError>;

    /// Resolves the handle for an explicit tile coordinate.
    fn tile(&self, coord: TileCoord) -> Result<Arc<dyn TileHandle>, HostError>;

    /// Endpoint host of the layer's source, used to derive error labels when
    /// the fetch layer attached no detail.
    fn endpoint_host(&self) -> Option<String> {
        None
    }
}

/// View state published by the host surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: Coordinate,
    /// Fractional zoom; the engine rounds it for tile ranges.
    pub zoom: f64,
    /// Currently visible extent in projected units.
    pub extent: Extent,
}

/// Events emitted by the host surface that drive the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A user-driven viewport move began.
    MoveStart,
    /// The viewport move settled.
    MoveEnd,
    /// A frame finished rendering.
    FrameRendered,
}

/// The host rendering surface, reduced to what the engine consumes.
pub trait MapSurface: Send + Sync {
    /// Current view state, or `None` while the viewport geometry is not yet
    /// resolvable (no defined view or size).
    fn view(&self) -> Option<ViewState>;

    /// Extent a viewport of the current pixel size would cover if centered
    /// at `center` with zoom `zoom`. Used to plan next-navigation targets.
    fn extent_at(&self, center: Coordinate, zoom: f64) -> Option<Extent>;

    /// Number of demand-driven tile loads the host currently has
    /// outstanding. `None` means the host cannot tell; the engine then
    /// treats it as never busy.
    fn pending_demand_loads(&self) -> Option<usize>;

    /// Subscribes to surface events. The guard detaches on drop.
    fn subscribe(&self, listener: SurfaceListener) -> ListenerGuard;
}
