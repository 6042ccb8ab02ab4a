//! tileahead - anticipatory tile prefetch for map rendering surfaces.
//!
//! A rendering surface already loads the tiles the user is looking at; this
//! crate decides, independently of that demand, which *additional* tiles to
//! fetch ahead of time, in what order, and how many at once, so that
//! panning, layer switching and jumps to known destinations appear
//! instantaneous.
//!
//! ```text
//! surface events ──> PrefetchManager ──> TickScheduler
//!                         │                   │ coalesced tick
//!                         v                   v
//!                      planner  ──queue──> fill slots ──> TileLoader
//!                                                             │
//!                      PrefetchStats <── completions ─────────┘
//! ```
//!
//! The engine consumes the host through three narrow capability traits
//! ([`MapSurface`], [`TileLayer`], [`TileHandle`]) and never touches tile
//! bytes, caching or projection math itself. Candidate tiles are grouped
//! into five [`PrefetchCategory`] values with configurable weights; loads
//! are dispatched strictly in ascending priority under a configurable
//! concurrency cap, and always yield to the host's own demand loading.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileahead::{PrefetchConfig, PrefetchManager, PrefetchTarget};
//!
//! let manager = PrefetchManager::new(surface, PrefetchConfig::default())?;
//! manager.set_active_layer(Some(satellite));
//! manager.register_background_layer(terrain, 1);
//! manager.push_next_target(PrefetchTarget::new(destination, 14.0));
//! ```

pub mod category;
pub mod config;
pub mod coord;
pub mod error;
pub mod host;
mod loader;
pub mod logging;
pub mod manager;
mod planner;
mod scheduler;
pub mod stats;
pub mod task;

pub use category::{CategoryWeights, PrefetchCategory};
pub use config::PrefetchConfig;
pub use coord::{Coordinate, Extent, TileCoord, TileRange};
pub use error::{ConfigError, HostError};
pub use host::{
    LayerId, ListenerGuard, MapSurface, SurfaceEvent, SurfaceListener, TileEventListener,
    TileHandle, TileLayer, TileLoadState, ViewState,
};
pub use manager::{PrefetchManager, StatsSubscription};
pub use stats::{CategoryCounters, PrefetchErrorRecord, StatsSnapshot};
pub use task::{BackgroundLayerEntry, PrefetchTarget, PrefetchTask, TaskId};

/// Version of the tileahead library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
