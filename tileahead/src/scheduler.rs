//! Tick coalescing for re-planning and slot filling.
//!
//! The scheduler owns a single pending timer at a time: requesting a tick
//! while one is pending is a no-op, so bursts of triggering events collapse
//! into one re-plan. The manager decides on fire whether the host is mid
//! burst and the tick must yield.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Coalesced tick state.
///
/// The actual timer task is spawned by the manager; the scheduler only owns
/// the pending marker and its cancellation token.
pub(crate) struct TickScheduler {
    enabled: bool,
    interval: Duration,
    pending: Option<CancellationToken>,
}

impl TickScheduler {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self {
            enabled,
            interval,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Requests a tick. Returns the token to guard the new timer task, or
    /// `None` when scheduling is disabled or a tick is already pending.
    pub fn request(&mut self) -> Option<CancellationToken> {
        if !self.enabled || self.pending.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        Some(token)
    }

    /// Clears the pending marker when the timer fires.
    pub fn fired(&mut self) {
        self.pending = None;
    }

    /// Cancels a pending tick without disabling future scheduling; used
    /// while interaction suspends background work.
    pub fn suspend(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// Gates scheduling entirely; disabling cancels any pending tick.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.suspend();
        }
    }
}
