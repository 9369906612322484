//! Timers and the debounced save trigger.
//!
//! The engine never sleeps itself. It asks a [`Scheduler`] to run a task
//! after a delay and keeps the returned [`TimerHandle`] so it can cancel it.
//! [`TokioScheduler`] is the production implementation; [`ManualScheduler`]
//! drives time by hand in tests.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A task run when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Cancelable handle to a scheduled task.
///
/// Cancelling a timer that already fired is a no-op.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Creates a handle running `cancel` when cancelled.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancels the timer.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancelable", &self.cancel.is_some())
            .finish()
    }
}

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run once, `delay` from now.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Scheduler backed by the tokio timer wheel.
///
/// Each timer is a spawned task sleeping for the delay; cancelling aborts it.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Creates a scheduler on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handle(tokio::runtime::Handle::current())
    }

    /// Creates a scheduler on the given runtime.
    #[must_use]
    pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a scheduler on the current runtime, if there is one.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current()
            .ok()
            .map(Self::with_handle)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let timer = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle::new(move || timer.abort())
    }
}

/// Deterministic scheduler with a virtual clock.
///
/// Time only moves when [`advance`](Self::advance) is called, which runs
/// every task falling due, in deadline order. Tasks may schedule further
/// timers; those run within the same `advance` if they fall due in time.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualClock>>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<(Duration, u64), TimerTask>,
}

impl ManualScheduler {
    /// Creates a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.lock().timers.len()
    }

    /// Moves the clock forward by `by`, firing due timers.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.inner.lock().now + by;
        let mut fired = 0;

        loop {
            let task = {
                let mut clock = self.inner.lock();
                let due = clock
                    .timers
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        clock.now = key.0;
                        clock.timers.remove(&key)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };

            match task {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let key = {
            let mut clock = self.inner.lock();
            let key = (clock.now + delay, clock.next_id);
            clock.next_id += 1;
            clock.timers.insert(key, task);
            key
        };

        let clock = Arc::clone(&self.inner);
        TimerHandle::new(move || {
            clock.lock().timers.remove(&key);
        })
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clock = self.inner.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("pending", &clock.timers.len())
            .finish()
    }
}

/// Coalesces bursts of dispatches into a single deferred trigger.
///
/// Every [`on_dispatch`](Self::on_dispatch) cancels the live timer and arms
/// a new one for the full window, so under continuous dispatch spaced closer
/// than the window nothing fires until activity stops. At most one timer is
/// live at a time.
///
/// Each arming gets a generation number, passed to the fire callback. A
/// callback whose generation is no longer current (the timer was re-armed or
/// cancelled while the task was already running) must be ignored; use
/// [`take_fired`](Self::take_fired) to check.
pub struct Debouncer {
    scheduler: Arc<dyn Scheduler>,
    window: Duration,
    pending: Option<TimerHandle>,
    generation: u64,
}

impl Debouncer {
    /// Creates a debouncer with the given quiescence window.
    pub fn new(scheduler: Arc<dyn Scheduler>, window: Duration) -> Self {
        Self {
            scheduler,
            window,
            pending: None,
            generation: 0,
        }
    }

    /// The quiescence window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Re-arms the timer for a full window.
    ///
    /// Returns the generation of the new timer.
    pub fn on_dispatch(&mut self, fire: impl FnOnce(u64) + Send + 'static) -> u64 {
        self.arm_after(self.window, fire)
    }

    /// Re-arms the timer for an arbitrary delay.
    pub fn arm_after(&mut self, delay: Duration, fire: impl FnOnce(u64) + Send + 'static) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let handle = self
            .scheduler
            .schedule(delay, Box::new(move || fire(generation)));
        self.pending = Some(handle);
        generation
    }

    /// Cancels the live timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }

    /// Returns true if a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Marks the timer of `generation` as fired.
    ///
    /// Returns false if that timer was superseded or cancelled, in which
    /// case the firing must be ignored.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && self.generation == generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("armed", &self.is_armed())
            .field("generation", &self.generation)
            .finish()
    }
}
