//! Configuration for the sync engine.

use std::time::Duration;

/// Default quiescence window before a burst of dispatches is saved.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name of the remote object holding the state.
    pub object_name: String,
    /// Quiescence window: a save fires once dispatches have been quiet
    /// this long.
    pub debounce: Duration,
    /// Extra delay applied when re-arming after consecutive conflicts.
    pub conflict_backoff: BackoffConfig,
}

impl EngineConfig {
    /// Creates a configuration for the given object.
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            debounce: DEFAULT_DEBOUNCE,
            conflict_backoff: BackoffConfig::default(),
        }
    }

    /// Sets the quiescence window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the conflict backoff.
    pub fn with_conflict_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.conflict_backoff = backoff;
        self
    }

    /// Delay before the next save attempt after `conflicts` consecutive
    /// conflicts (at least one).
    pub fn rearm_delay_after_conflicts(&self, conflicts: u32) -> Duration {
        self.debounce + self.conflict_backoff.delay_for_attempt(conflicts.saturating_sub(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("spendy")
    }
}

/// Exponential backoff used under sustained contention.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay added after the second consecutive conflict.
    pub initial_delay: Duration,
    /// Upper bound for the added delay.
    pub max_delay: Duration,
    /// Multiplier applied per further conflict.
    pub multiplier: f64,
    /// Whether to add up to 25% random jitter.
    pub add_jitter: bool,
}

impl BackoffConfig {
    /// Creates a backoff starting at `initial_delay`.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A backoff that never adds delay.
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the added delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            let jitter = delay_secs * 0.25 * rand::random::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}
