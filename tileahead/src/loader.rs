//! Dispatch of planned tasks and tracking of in-flight loads.
//!
//! The loader owns the in-flight map exclusively. It never cancels the
//! underlying network request on abandonment; it only detaches its listener
//! and forgets the task, so a late response finds no tracked task and is
//! silently discarded.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::category::PrefetchCategory;
use crate::coord::TileCoord;
use crate::host::{
    LayerId, ListenerGuard, TileEventListener, TileHandle, TileLayer, TileLoadState,
};
use crate::stats::{PrefetchErrorRecord, PrefetchStats};
use crate::task::{PrefetchTask, TaskId};

/// Fallback reason when the fetch layer attached no detail and the source
/// has no resolvable endpoint.
const GENERIC_FAILURE_REASON: &str = "tile load failed";

/// Reason recorded for loads that settled without imagery.
const EMPTY_TILE_REASON: &str = "empty tile";

/// Result of attempting to dispatch one task.
pub(crate) enum DispatchOutcome {
    /// The load was started; the caller must invoke `request_load` on the
    /// handle once outside the manager lock.
    Started(Arc<dyn TileHandle>),
    /// The tile was already loaded; no network activity.
    AlreadyLoaded,
    /// Another path already owns an outstanding load for this tile.
    AlreadyLoading,
    /// The candidate could not be resolved and was dropped silently.
    Invalid,
}

struct InFlightLoad {
    category: PrefetchCategory,
    layer_name: String,
    endpoint: Option<String>,
    coord: TileCoord,
    handle: Arc<dyn TileHandle>,
    /// Detaches the one-shot listener when the entry is dropped.
    _guard: ListenerGuard,
}

/// Issues bounded-concurrency loads and tracks outstanding work.
pub(crate) struct TileLoader {
    in_flight: HashMap<TaskId, InFlightLoad>,
}

impl TileLoader {
    pub fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Starts a task: resolves its handle, attaches the one-shot completion
    /// listener and registers the in-flight entry.
    ///
    /// A malformed candidate never propagates an error past this point.
    pub fn start_task(
        &mut self,
        task: &PrefetchTask,
        listener: TileEventListener,
        stats: &mut PrefetchStats,
    ) -> DispatchOutcome {
        if self.in_flight.contains_key(&task.id) {
            return DispatchOutcome::AlreadyLoading;
        }

        let handle = match task.layer.tile(task.coord) {
            Ok(handle) => handle,
            Err(error) => {
                trace!(task = %task.id, %error, "dispatch dropped unresolvable task");
                return DispatchOutcome::Invalid;
            }
        };

        match handle.load_state() {
            TileLoadState::Loaded => {
                trace!(task = %task.id, "tile already loaded");
                stats.already_loaded_hit();
                return DispatchOutcome::AlreadyLoaded;
            }
            TileLoadState::Loading => return DispatchOutcome::AlreadyLoading,
            TileLoadState::Idle | TileLoadState::Error | TileLoadState::Empty => {}
        }

        let guard = handle.on_settled(listener);
        self.in_flight.insert(
            task.id.clone(),
            InFlightLoad {
                category: task.category,
                layer_name: task.layer.name().to_string(),
                endpoint: task.layer.endpoint_host(),
                coord: task.coord,
                handle: Arc::clone(&handle),
                _guard: guard,
            },
        );
        stats.loading_started(task.category);

        trace!(
            task = %task.id,
            category = task.category.label(),
            priority = task.priority,
            "prefetch load started"
        );
        DispatchOutcome::Started(handle)
    }

    /// Settles a tracked load, updating counters and the error log.
    ///
    /// Returns `None` for untracked completions (abandoned or unknown
    /// tasks), which are inert by design.
    pub fn complete(&mut self, id: &TaskId, stats: &mut PrefetchStats) -> Option<TileLoadState> {
        let entry = self.in_flight.remove(id)?;
        let state = entry.handle.load_state();

        match state {
            TileLoadState::Loaded => stats.completed_loaded(entry.category),
            TileLoadState::Empty => {
                stats.completed_error(Self::error_record(&entry, EMPTY_TILE_REASON.to_string()))
            }
            _ => {
                let reason = entry
                    .handle
                    .error_detail()
                    .or_else(|| {
                        entry
                            .endpoint
                            .as_ref()
                            .map(|host| format!("request to {host} failed"))
                    })
                    .unwrap_or_else(|| GENERIC_FAILURE_REASON.to_string());
                stats.completed_error(Self::error_record(&entry, reason));
            }
        }

        debug!(task = %id, state = %state, "prefetch load settled");
        Some(state)
    }

    /// Detaches every in-flight listener and zeroes the loading counters,
    /// without cancelling the underlying requests.
    pub fn abandon_all(&mut self, stats: &mut PrefetchStats) {
        let abandoned = self.in_flight.len();
        for (_, entry) in self.in_flight.drain() {
            stats.loading_abandoned(entry.category);
        }
        if abandoned > 0 {
            debug!(abandoned, "abandoned all in-flight prefetch loads");
        }
    }

    /// Same as [`abandon_all`](Self::abandon_all), but preserves in-flight
    /// loads belonging to the given layer.
    pub fn abandon_non_active(&mut self, active: &LayerId, stats: &mut PrefetchStats) {
        let before = self.in_flight.len();
        self.in_flight.retain(|id, entry| {
            if id.layer == *active {
                true
            } else {
                stats.loading_abandoned(entry.category);
                false
            }
        });
        let abandoned = before - self.in_flight.len();
        if abandoned > 0 {
            debug!(abandoned, layer = %active, "abandoned non-active in-flight loads");
        }
    }

    fn error_record(entry: &InFlightLoad, reason: String) -> PrefetchErrorRecord {
        PrefetchErrorRecord {
            coord: entry.coord,
            category: entry.category,
            layer_name: entry.layer_name.clone(),
            reason,
            timestamp: Utc::now(),
        }
    }
}
