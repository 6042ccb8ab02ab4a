//! Prefetch bookkeeping: per-category counters, recent errors and snapshot
//! publication.
//!
//! The stats object is owned by the manager and mutated only through the
//! named operations here, inside the manager's lock. Consumers only ever see
//! immutable [`StatsSnapshot`] copies, delivered synchronously on request or
//! through persistent subscriptions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::category::{CategoryWeights, PrefetchCategory};
use crate::coord::TileCoord;
use crate::task::PrefetchTarget;

/// Number of recent errors retained for display.
pub const RECENT_ERROR_CAP: usize = 50;

/// Per-category task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounters {
    /// Tasks in the current plan, not yet dispatched.
    pub queued: u64,
    /// Tasks with an outstanding load.
    pub loading: u64,
    /// Loads completed with imagery.
    pub loaded: u64,
    /// Loads that failed or came back empty.
    pub errors: u64,
}

/// One retained load failure.
#[derive(Debug, Clone)]
pub struct PrefetchErrorRecord {
    pub coord: TileCoord,
    pub category: PrefetchCategory,
    pub layer_name: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Immutable copy of the engine's bookkeeping at one instant.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub enabled: bool,
    /// True while prefetch is suspended by user interaction.
    pub paused: bool,
    pub queued: u64,
    pub loading: u64,
    pub loaded: u64,
    pub errors: u64,
    /// Dispatches that found the tile already loaded (no network activity).
    pub already_loaded: u64,
    per_category: [CategoryCounters; 5],
    pub next_targets: Vec<PrefetchTarget>,
    pub recent_errors: Vec<PrefetchErrorRecord>,
    pub category_weights: [(PrefetchCategory, f64); 5],
}

impl StatsSnapshot {
    /// Counters for one category.
    pub fn category(&self, category: PrefetchCategory) -> CategoryCounters {
        self.per_category[category.index()]
    }
}

/// Persistent stats subscriber.
pub type StatsCallback = Arc<dyn Fn(StatsSnapshot) + Send + Sync>;

/// One-shot idle callback slot, shared with the safety-timeout timer so
/// whichever side fires first takes the callback.
pub(crate) type IdleSlot = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

pub(crate) struct IdleWaiter {
    pub slot: IdleSlot,
    pub timeout_token: CancellationToken,
}

/// Mutable bookkeeping behind the manager's lock.
pub(crate) struct PrefetchStats {
    counters: [CategoryCounters; 5],
    already_loaded: u64,
    recent_errors: VecDeque<PrefetchErrorRecord>,
    subscribers: Vec<(u64, StatsCallback)>,
    idle_waiters: Vec<IdleWaiter>,
    next_subscriber_id: u64,
}

impl PrefetchStats {
    pub fn new() -> Self {
        Self {
            counters: [CategoryCounters::default(); 5],
            already_loaded: 0,
            recent_errors: VecDeque::with_capacity(RECENT_ERROR_CAP),
            subscribers: Vec::new(),
            idle_waiters: Vec::new(),
            next_subscriber_id: 0,
        }
    }

    pub fn category(&self, category: PrefetchCategory) -> CategoryCounters {
        self.counters[category.index()]
    }

    // ---- queue accounting ----

    /// Zeroes every queued counter ahead of a re-plan.
    pub fn reset_queued(&mut self) {
        for counters in &mut self.counters {
            counters.queued = 0;
        }
    }

    pub fn inc_queued(&mut self, category: PrefetchCategory) {
        self.counters[category.index()].queued += 1;
    }

    pub fn set_queued(&mut self, category: PrefetchCategory, count: u64) {
        self.counters[category.index()].queued = count;
    }

    /// A task left the queue (dispatched or consumed without dispatch).
    pub fn dequeued(&mut self, category: PrefetchCategory) {
        let queued = &mut self.counters[category.index()].queued;
        *queued = queued.saturating_sub(1);
    }

    // ---- load lifecycle ----

    pub fn loading_started(&mut self, category: PrefetchCategory) {
        self.counters[category.index()].loading += 1;
    }

    pub fn loading_abandoned(&mut self, category: PrefetchCategory) {
        let loading = &mut self.counters[category.index()].loading;
        *loading = loading.saturating_sub(1);
    }

    pub fn completed_loaded(&mut self, category: PrefetchCategory) {
        let counters = &mut self.counters[category.index()];
        counters.loading = counters.loading.saturating_sub(1);
        counters.loaded += 1;
    }

    /// Records a failed or empty load. Empty results are deliberately
    /// counted in the same `errors` counter as genuine failures; the record
    /// keeps them distinguishable by reason.
    pub fn completed_error(&mut self, record: PrefetchErrorRecord) {
        let counters = &mut self.counters[record.category.index()];
        counters.loading = counters.loading.saturating_sub(1);
        counters.errors += 1;

        if self.recent_errors.len() == RECENT_ERROR_CAP {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(record);
    }

    pub fn already_loaded_hit(&mut self) {
        self.already_loaded += 1;
    }

    // ---- totals ----

    pub fn queued_total(&self) -> u64 {
        self.counters.iter().map(|c| c.queued).sum()
    }

    pub fn loading_total(&self) -> u64 {
        self.counters.iter().map(|c| c.loading).sum()
    }

    pub fn loaded_total(&self) -> u64 {
        self.counters.iter().map(|c| c.loaded).sum()
    }

    pub fn errors_total(&self) -> u64 {
        self.counters.iter().map(|c| c.errors).sum()
    }

    /// True when no work is queued or outstanding.
    pub fn is_idle(&self) -> bool {
        self.queued_total() + self.loading_total() == 0
    }

    // ---- subscriptions ----

    pub fn subscribe(&mut self, callback: StatsCallback) -> u64 {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: u64) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Clones the subscriber list so callbacks can run outside the lock.
    pub fn subscribers(&self) -> Vec<StatsCallback> {
        self.subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    pub fn add_idle_waiter(&mut self, waiter: IdleWaiter) {
        self.idle_waiters.push(waiter);
    }

    /// Takes every pending idle waiter; called when idle is reached.
    pub fn take_idle_waiters(&mut self) -> Vec<IdleWaiter> {
        std::mem::take(&mut self.idle_waiters)
    }

    /// Drops all subscribers and pending idle waiters, cancelling their
    /// safety timers.
    pub fn dispose(&mut self) {
        self.subscribers.clear();
        for waiter in self.idle_waiters.drain(..) {
            waiter.timeout_token.cancel();
        }
    }

    pub fn snapshot(
        &self,
        enabled: bool,
        paused: bool,
        next_targets: Vec<PrefetchTarget>,
        weights: &CategoryWeights,
    ) -> StatsSnapshot {
        StatsSnapshot {
            enabled,
            paused,
            queued: self.queued_total(),
            loading: self.loading_total(),
            loaded: self.loaded_total(),
            errors: self.errors_total(),
            already_loaded: self.already_loaded,
            per_category: self.counters,
            next_targets,
            recent_errors: self.recent_errors.iter().cloned().collect(),
            category_weights: weights.entries(),
        }
    }
}
