//! Engine configuration.
//!
//! All values have defaults tuned for interactive map surfaces on ordinary
//! broadband connections.

use std::time::Duration;

use crate::error::ConfigError;
use crate::host::LayerId;

// ==================== Spatial Defaults ====================

/// Default spatial buffer factor.
///
/// The visible extent is expanded to 1.5x its size, so the offscreen ring is
/// a quarter viewport deep on each side.
pub const DEFAULT_BUFFER_FACTOR: f64 = 1.5;

// ==================== Concurrency Defaults ====================

/// Default maximum simultaneously outstanding prefetch loads.
///
/// Kept low so background work never saturates the connection the host's
/// own demand loading shares.
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 4;

// ==================== Timing Defaults ====================

/// Default delay between a viewport move settling and the return to full
/// prefetch planning.
pub const DEFAULT_INTERACTION_DEBOUNCE: Duration = Duration::from_millis(150);

/// Default coalescing interval of the scheduler's tick timer.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Default safety timeout after which an idle subscription fires even if
/// tiles never fully resolve.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Construction-time configuration for [`PrefetchManager`].
///
/// [`PrefetchManager`]: crate::manager::PrefetchManager
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Multiplier expanding the visible extent for active-layer spatial
    /// prefetch. Must be >= 1.0.
    pub buffer_factor: f64,
    /// Maximum simultaneously outstanding prefetch loads. Must be >= 1.
    pub max_concurrent_loads: usize,
    /// Debounce between move-end and the return to full planning.
    pub interaction_debounce: Duration,
    /// Coalescing interval for scheduler ticks.
    pub tick_interval: Duration,
    /// Safety timeout for idle subscriptions.
    pub idle_timeout: Duration,
    /// Whether the engine starts enabled.
    pub enabled: bool,
    /// Keep the active layer's spatial prefetch running while the user is
    /// interacting, instead of suspending everything.
    pub keep_active_during_interaction: bool,
    /// Layers suppressed from planning at construction time.
    pub excluded_layers: Vec<LayerId>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            buffer_factor: DEFAULT_BUFFER_FACTOR,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            interaction_debounce: DEFAULT_INTERACTION_DEBOUNCE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            enabled: true,
            keep_active_during_interaction: false,
            excluded_layers: Vec::new(),
        }
    }
}

impl PrefetchConfig {
    /// Sets the spatial buffer factor.
    pub fn with_buffer_factor(mut self, factor: f64) -> Self {
        self.buffer_factor = factor;
        self
    }

    /// Sets the concurrency cap.
    pub fn with_max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max;
        self
    }

    /// Sets the interaction debounce delay.
    pub fn with_interaction_debounce(mut self, debounce: Duration) -> Self {
        self.interaction_debounce = debounce;
        self
    }

    /// Sets the scheduler tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the initial enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the keep-active-during-interaction mode.
    pub fn with_keep_active_during_interaction(mut self, keep: bool) -> Self {
        self.keep_active_during_interaction = keep;
        self
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_factor.is_nan() || self.buffer_factor < 1.0 {
            return Err(ConfigError::InvalidBufferFactor(self.buffer_factor));
        }
        if self.max_concurrent_loads == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}
