//! Sync engine state machine.

use crate::action_log::ActionLog;
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::reducer::Reducer;
use crate::scheduler::{Debouncer, Scheduler, TokioScheduler};
use crate::status::{EngineState, FailureKind, SyncStats, SyncStatus};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use spendy_crypto::Cipher;
use spendy_store::{RemoteStore, StoragePayload, Version};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store accepted the write.
    Saved {
        /// Version produced by the write.
        version: Version,
        /// Queued actions the write made durable.
        confirmed: usize,
    },
    /// The write lost a race; remote truth was reloaded and the queued
    /// actions replayed on top of it. Another save has been scheduled.
    ///
    /// A reload that cannot be read is reported as [`SaveOutcome::Failed`]
    /// instead, and nothing is scheduled.
    Reconciled {
        /// Version now held.
        version: Version,
        /// Actions replayed onto the reloaded state.
        replayed: usize,
    },
    /// The attempt failed and was recorded in the status.
    Failed {
        /// Failing operation.
        kind: FailureKind,
        /// Error message.
        message: String,
    },
    /// No queued actions; nothing to write.
    UpToDate,
    /// Another round trip was in flight.
    Skipped,
    /// The engine was disposed before or during the attempt.
    Disposed,
}

struct Inner<T, A> {
    lifecycle: EngineState,
    state: T,
    log: ActionLog<A>,
    version: Version,
    debouncer: Debouncer,
    disposed: bool,
    stats: SyncStats,
    consecutive_conflicts: u32,
}

/// Persists a reducer-driven state to a remote store.
///
/// Every dispatched action is applied immediately and kept in an
/// [`ActionLog`] until a save makes it durable. Saves are debounced and
/// conditional on the last version seen; when another writer wins the race,
/// the engine reloads remote truth and replays the queued actions on top of
/// it, then schedules another save.
///
/// The engine is a handle (`Arc<SyncEngine>`) with an explicit lifecycle:
/// [`start`](Self::start) performs the initial load and
/// [`dispose`](Self::dispose) cancels pending work. At most one store round
/// trip is in flight at any time.
///
/// ```rust,no_run
/// use spendy_crypto::{AesGcmCipher, EncryptionKey};
/// use spendy_store::MemoryStore;
/// use spendy_sync_engine::{EngineConfig, SyncEngine};
/// use std::sync::Arc;
///
/// # async fn demo() -> spendy_sync_engine::SyncResult<()> {
/// let counter = |total: &i64, delta: &i64| total + delta;
/// let engine = SyncEngine::new(
///     EngineConfig::new("counter"),
///     MemoryStore::new(),
///     Arc::new(AesGcmCipher::new(&EncryptionKey::generate())),
///     counter,
///     0i64,
/// );
///
/// engine.start().await?;
/// engine.dispatch(5)?;
/// assert_eq!(engine.state(), 5);
/// engine.flush().await;
/// engine.dispose();
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine<S, R, T, A> {
    config: EngineConfig,
    store: S,
    cipher: Arc<dyn Cipher>,
    reducer: R,
    initial_state: T,
    inner: Mutex<Inner<T, A>>,
    status: watch::Sender<SyncStatus>,
    this: Weak<Self>,
}

impl<S, R, T, A> SyncEngine<S, R, T, A>
where
    S: RemoteStore,
    R: Reducer<T, A> + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Creates an engine whose timers run on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(
        config: EngineConfig,
        store: S,
        cipher: Arc<dyn Cipher>,
        reducer: R,
        initial_state: T,
    ) -> Arc<Self> {
        Self::with_scheduler(
            config,
            store,
            cipher,
            reducer,
            initial_state,
            Arc::new(TokioScheduler::new()),
        )
    }

    /// Creates an engine using the given timer capability.
    pub fn with_scheduler(
        config: EngineConfig,
        store: S,
        cipher: Arc<dyn Cipher>,
        reducer: R,
        initial_state: T,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(SyncStatus::Idle);
        let debouncer = Debouncer::new(scheduler, config.debounce);

        Arc::new_cyclic(|this| Self {
            inner: Mutex::new(Inner {
                lifecycle: EngineState::Uninitialized,
                state: initial_state.clone(),
                log: ActionLog::new(),
                version: Version::none(),
                debouncer,
                disposed: false,
                stats: SyncStats::default(),
                consecutive_conflicts: 0,
            }),
            config,
            store,
            cipher,
            reducer,
            initial_state,
            status,
            this: this.clone(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> T {
        self.inner.lock().state.clone()
    }

    /// Runs `f` against the current state without cloning it.
    ///
    /// `f` runs under the engine lock; it must not call back into the engine.
    pub fn with_state<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.inner.lock().state)
    }

    /// Returns the version the next save will be conditional on.
    pub fn version(&self) -> Version {
        self.inner.lock().version.clone()
    }

    /// Returns the lifecycle state.
    pub fn engine_state(&self) -> EngineState {
        self.inner.lock().lifecycle
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Number of dispatched actions not yet confirmed durable.
    pub fn pending_actions(&self) -> usize {
        self.inner.lock().log.len()
    }

    /// Returns the statistics.
    pub fn stats(&self) -> SyncStats {
        self.inner.lock().stats.clone()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    /// Performs the initial load.
    ///
    /// Load failures are not errors: the engine falls back to the initial
    /// state and the none version, so the next save is an unconditional
    /// create. An undecryptable object is treated as absent. Both are
    /// reported through [`status`](Self::status).
    ///
    /// Actions dispatched while the load is in flight are kept and replayed
    /// onto the loaded state.
    pub async fn start(&self) -> SyncResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return Err(SyncError::Disposed);
            }
            if inner.lifecycle != EngineState::Uninitialized {
                return Err(SyncError::InvalidStateTransition {
                    from: inner.lifecycle.to_string(),
                    to: EngineState::Loading.to_string(),
                });
            }
            inner.lifecycle = EngineState::Loading;
            self.publish(SyncStatus::Loading);
        }

        debug!(object = %self.config.object_name, "loading");
        let loaded = self.store.load(&self.config.object_name).await;

        let mut inner = self.inner.lock();
        if inner.disposed {
            debug!(object = %self.config.object_name, "discarding load result after dispose");
            return Ok(());
        }

        let (base, status, readable) = match loaded {
            Ok(payload) => {
                let (base, failure) = self.open(payload.data);
                inner.version = payload.version.clone();
                match failure {
                    Some((kind, message)) => {
                        inner.stats.decrypt_failures += 1;
                        inner.stats.last_error = Some(message.clone());
                        (base, SyncStatus::Failed { kind, message }, false)
                    }
                    None => {
                        info!(
                            object = %self.config.object_name,
                            version = %payload.version,
                            "loaded"
                        );
                        (
                            base,
                            SyncStatus::Loaded {
                                version: payload.version,
                            },
                            true,
                        )
                    }
                }
            }
            Err(e) => {
                error!(object = %self.config.object_name, error = %e, "load failed");
                let message = e.to_string();
                inner.version = Version::none();
                inner.stats.load_failures += 1;
                inner.stats.last_error = Some(message.clone());
                (
                    self.initial_state.clone(),
                    SyncStatus::Failed {
                        kind: FailureKind::LoadFailed,
                        message,
                    },
                    true,
                )
            }
        };

        let state = inner.log.replay_onto(base, &self.reducer);
        inner.state = state;
        inner.lifecycle = EngineState::Idle;
        self.publish(status);

        if !inner.log.is_empty() {
            debug!(pending = inner.log.len(), "replayed actions dispatched during load");
            if !readable {
                // Saving now would overwrite an object we cannot read.
                return Ok(());
            }
            let fire = self.fire_callback();
            inner.debouncer.on_dispatch(fire);
            self.publish(SyncStatus::SavingSoon);
        }

        Ok(())
    }

    /// Applies `action` locally and schedules a save.
    ///
    /// The new state is visible as soon as this returns; it never waits on
    /// the network and is accepted while a save or reconciliation is in
    /// flight.
    pub fn dispatch(&self, action: A) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(SyncError::Disposed);
        }
        if inner.lifecycle == EngineState::Uninitialized {
            return Err(SyncError::NotStarted);
        }

        let next = self.reducer.reduce(&inner.state, &action);
        inner.state = next;
        inner.log.append(action);
        inner.stats.actions_dispatched += 1;

        let fire = self.fire_callback();
        inner.debouncer.on_dispatch(fire);

        if !inner.lifecycle.is_busy() {
            self.publish(SyncStatus::SavingSoon);
        }
        Ok(())
    }

    /// Cancels any pending timer and attempts a save right away.
    pub async fn flush(&self) -> SaveOutcome {
        self.inner.lock().debouncer.cancel();
        self.run_save().await
    }

    /// Cancels pending timers and detaches the engine.
    ///
    /// Results of round trips still in flight are discarded when they
    /// complete. Further dispatches fail with [`SyncError::Disposed`].
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.debouncer.cancel();
        info!(
            object = %self.config.object_name,
            pending = inner.log.len(),
            "sync engine disposed"
        );
    }

    fn fire_callback(&self) -> impl FnOnce(u64) + Send + 'static {
        let this = self.this.clone();
        move |generation| {
            let Some(engine) = this.upgrade() else {
                return;
            };
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        engine.on_timer(generation).await;
                    });
                }
                Err(_) => warn!("save timer fired outside a tokio runtime"),
            }
        }
    }

    async fn on_timer(&self, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.disposed || !inner.debouncer.take_fired(generation) {
                return;
            }
        }
        self.run_save().await;
    }

    async fn run_save(&self) -> SaveOutcome {
        let (payload, snapshot_len) = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return SaveOutcome::Disposed;
            }
            if !inner.lifecycle.can_start_save() {
                debug!(state = %inner.lifecycle, "save skipped");
                return SaveOutcome::Skipped;
            }
            if inner.log.is_empty() {
                return SaveOutcome::UpToDate;
            }

            let sealed = match self.seal(&inner.state) {
                Ok(sealed) => sealed,
                Err(e) => {
                    error!(object = %self.config.object_name, error = %e, "cannot seal state");
                    inner.stats.save_failures += 1;
                    return self.record_failure(&mut inner, FailureKind::SaveFailed, e.to_string());
                }
            };

            inner.lifecycle = EngineState::SaveInFlight;
            self.publish(SyncStatus::Saving);
            (
                StoragePayload::new(inner.version.clone(), sealed),
                inner.log.len(),
            )
        };

        debug!(
            object = %self.config.object_name,
            version = %payload.version,
            pending = snapshot_len,
            "saving"
        );
        let result = self.store.save(&self.config.object_name, payload).await;

        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                debug!(object = %self.config.object_name, "discarding save result after dispose");
                return SaveOutcome::Disposed;
            }

            match result {
                Ok(version) => {
                    let confirmed = inner.log.acknowledge(snapshot_len);
                    inner.version = version.clone();
                    inner.consecutive_conflicts = 0;
                    inner.lifecycle = EngineState::Idle;
                    inner.stats.saves_completed += 1;
                    inner.stats.last_save_time = Some(Instant::now());
                    inner.stats.last_error = None;
                    info!(
                        object = %self.config.object_name,
                        version = %version,
                        confirmed,
                        "saved"
                    );

                    if inner.log.is_empty() {
                        self.publish(SyncStatus::Saved {
                            version: version.clone(),
                        });
                    } else {
                        // Dispatched while the save was in flight.
                        let fire = self.fire_callback();
                        inner.debouncer.on_dispatch(fire);
                        self.publish(SyncStatus::SavingSoon);
                    }
                    return SaveOutcome::Saved { version, confirmed };
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        object = %self.config.object_name,
                        error = %e,
                        "save conflicted, reconciling"
                    );
                    inner.stats.conflicts += 1;
                    inner.consecutive_conflicts += 1;
                    inner.lifecycle = EngineState::Reconciling;
                    self.publish(SyncStatus::Reconciling);
                }
                Err(e) => {
                    error!(object = %self.config.object_name, error = %e, "save failed");
                    inner.stats.save_failures += 1;
                    inner.lifecycle = EngineState::Idle;
                    return self.record_failure(&mut inner, FailureKind::SaveFailed, e.to_string());
                }
            }
        }

        self.reconcile().await
    }

    async fn reconcile(&self) -> SaveOutcome {
        let loaded = self.store.load(&self.config.object_name).await;

        let mut inner = self.inner.lock();
        if inner.disposed {
            debug!(object = %self.config.object_name, "discarding reload after dispose");
            return SaveOutcome::Disposed;
        }

        let payload = match loaded {
            Ok(payload) => payload,
            Err(e) => {
                error!(object = %self.config.object_name, error = %e, "reload after conflict failed");
                inner.stats.load_failures += 1;
                inner.lifecycle = EngineState::Idle;
                return self.record_failure(&mut inner, FailureKind::ReconcileFailed, e.to_string());
            }
        };

        let (base, failure) = self.open(payload.data);
        let state = inner.log.replay_onto(base, &self.reducer);
        inner.state = state;
        inner.version = payload.version.clone();
        inner.lifecycle = EngineState::Idle;
        inner.stats.reconciliations += 1;

        if let Some((kind, message)) = failure {
            // Treated as absent like on start, but only an explicit dispatch
            // may overwrite it.
            warn!(
                object = %self.config.object_name,
                version = %payload.version,
                pending = inner.log.len(),
                "reloaded object is unreadable, holding queued actions"
            );
            inner.stats.decrypt_failures += 1;
            return self.record_failure(&mut inner, kind, message);
        }

        let replayed = inner.log.len();
        let delay = self
            .config
            .rearm_delay_after_conflicts(inner.consecutive_conflicts);
        let fire = self.fire_callback();
        inner.debouncer.arm_after(delay, fire);
        self.publish(SyncStatus::SavingSoon);

        info!(
            object = %self.config.object_name,
            version = %payload.version,
            replayed,
            retry_in = ?delay,
            "reconciled"
        );
        SaveOutcome::Reconciled {
            version: payload.version,
            replayed,
        }
    }

    fn record_failure(
        &self,
        inner: &mut Inner<T, A>,
        kind: FailureKind,
        message: String,
    ) -> SaveOutcome {
        inner.stats.last_error = Some(message.clone());
        self.publish(SyncStatus::Failed {
            kind,
            message: message.clone(),
        });
        SaveOutcome::Failed { kind, message }
    }

    fn publish(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    fn seal(&self, state: &T) -> SyncResult<Vec<u8>> {
        let json = serde_json::to_vec(state)?;
        Ok(self.cipher.encrypt(&json)?)
    }

    /// Decrypts and decodes a stored object.
    ///
    /// Absent, undecryptable and undecodable objects all yield the initial
    /// state; the latter two also return the failure.
    fn open(&self, data: Option<Vec<u8>>) -> (T, Option<(FailureKind, String)>) {
        let Some(sealed) = data else {
            return (self.initial_state.clone(), None);
        };

        let plain = match self.cipher.decrypt(&sealed) {
            Ok(plain) => plain,
            Err(e) => {
                warn!(
                    object = %self.config.object_name,
                    error = %e,
                    "stored object cannot be decrypted, treating it as absent"
                );
                return (
                    self.initial_state.clone(),
                    Some((FailureKind::DecryptFailed, e.to_string())),
                );
            }
        };

        match serde_json::from_slice(&plain) {
            Ok(state) => (state, None),
            Err(e) => {
                warn!(
                    object = %self.config.object_name,
                    error = %e,
                    "stored object is not a valid state, treating it as absent"
                );
                (
                    self.initial_state.clone(),
                    Some((FailureKind::DecodeFailed, e.to_string())),
                )
            }
        }
    }
}

/// Waits until `engine` has no pending actions and nothing in flight, or
/// until `timeout` elapses. Returns true if the engine settled.
pub async fn wait_until_settled<S, R, T, A>(
    engine: &SyncEngine<S, R, T, A>,
    timeout: Duration,
) -> bool
where
    S: RemoteStore,
    R: Reducer<T, A> + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    A: Send + 'static,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut status = engine.subscribe();
    loop {
        let settled = {
            let inner = engine.inner.lock();
            inner.log.is_empty() && !inner.lifecycle.is_busy()
        };
        if settled {
            return true;
        }
        if tokio::time::timeout_at(deadline, status.changed()).await.is_err() {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use spendy_crypto::{AesGcmCipher, EncryptionKey};
    use spendy_store::MemoryStore;

    fn append(state: &Vec<String>, action: &String) -> Vec<String> {
        let mut next = state.clone();
        next.push(action.clone());
        next
    }

    type TestEngine =
        SyncEngine<Arc<MemoryStore>, fn(&Vec<String>, &String) -> Vec<String>, Vec<String>, String>;

    fn engine_with(store: Arc<MemoryStore>, scheduler: ManualScheduler) -> Arc<TestEngine> {
        SyncEngine::with_scheduler(
            EngineConfig::new("spendy"),
            store,
            Arc::new(AesGcmCipher::new(&EncryptionKey::from_bytes(&[9u8; 32]).unwrap())),
            append as fn(&Vec<String>, &String) -> Vec<String>,
            Vec::new(),
            Arc::new(scheduler),
        )
    }

    #[tokio::test]
    async fn dispatch_before_start_is_rejected() {
        let engine = engine_with(Arc::new(MemoryStore::new()), ManualScheduler::new());
        assert!(matches!(
            engine.dispatch("a".into()),
            Err(SyncError::NotStarted)
        ));
        assert_eq!(engine.engine_state(), EngineState::Uninitialized);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let engine = engine_with(Arc::new(MemoryStore::new()), ManualScheduler::new());
        engine.start().await.unwrap();
        assert!(matches!(
            engine.start().await,
            Err(SyncError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn dispatch_applies_immediately_and_arms_timer() {
        let scheduler = ManualScheduler::new();
        let engine = engine_with(Arc::new(MemoryStore::new()), scheduler.clone());
        engine.start().await.unwrap();

        engine.dispatch("a".into()).unwrap();
        engine.dispatch("b".into()).unwrap();

        assert_eq!(engine.state(), vec!["a", "b"]);
        assert_eq!(engine.pending_actions(), 2);
        assert_eq!(engine.status(), SyncStatus::SavingSoon);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(engine.stats().actions_dispatched, 2);
    }

    #[tokio::test]
    async fn flush_saves_and_confirms() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ManualScheduler::new();
        let engine = engine_with(Arc::clone(&store), scheduler.clone());
        engine.start().await.unwrap();
        engine.dispatch("a".into()).unwrap();

        let outcome = engine.flush().await;
        assert!(matches!(outcome, SaveOutcome::Saved { confirmed: 1, .. }));
        assert_eq!(engine.pending_actions(), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(store.object("spendy").unwrap().version, engine.version());
        assert!(matches!(engine.status(), SyncStatus::Saved { .. }));

        assert_eq!(engine.flush().await, SaveOutcome::UpToDate);
    }

    #[tokio::test]
    async fn save_failure_keeps_log_and_does_not_rearm() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ManualScheduler::new();
        let engine = engine_with(Arc::clone(&store), scheduler.clone());
        engine.start().await.unwrap();
        engine.dispatch("a".into()).unwrap();

        store.fail_next_saves(1);
        let outcome = engine.flush().await;
        assert!(matches!(
            outcome,
            SaveOutcome::Failed {
                kind: FailureKind::SaveFailed,
                ..
            }
        ));
        assert_eq!(engine.pending_actions(), 1);
        assert_eq!(engine.engine_state(), EngineState::Idle);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(engine.stats().save_failures, 1);
        assert!(engine.status().is_failure());

        // The next dispatch re-arms and the retry carries both actions.
        engine.dispatch("b".into()).unwrap();
        assert!(matches!(
            engine.flush().await,
            SaveOutcome::Saved { confirmed: 2, .. }
        ));
    }

    #[tokio::test]
    async fn dispose_rejects_dispatch_and_cancels_timer() {
        let scheduler = ManualScheduler::new();
        let engine = engine_with(Arc::new(MemoryStore::new()), scheduler.clone());
        engine.start().await.unwrap();
        engine.dispatch("a".into()).unwrap();

        engine.dispose();
        assert!(engine.is_disposed());
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(
            engine.dispatch("b".into()),
            Err(SyncError::Disposed)
        ));
        assert_eq!(engine.flush().await, SaveOutcome::Disposed);
    }

    #[tokio::test]
    async fn unreadable_reload_reports_failure_without_rearming() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ManualScheduler::new();
        let engine = engine_with(Arc::clone(&store), scheduler.clone());
        engine.start().await.unwrap();

        let foreign = AesGcmCipher::new(&EncryptionKey::from_bytes(&[1u8; 32]).unwrap());
        let version = store.write_external("spendy", foreign.encrypt(b"[\"x\"]").unwrap());
        engine.dispatch("a".into()).unwrap();

        assert!(matches!(
            engine.flush().await,
            SaveOutcome::Failed {
                kind: FailureKind::DecryptFailed,
                ..
            }
        ));
        assert_eq!(engine.version(), version);
        assert_eq!(engine.state(), vec!["a"]);
        assert_eq!(engine.pending_actions(), 1);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(engine.stats().decrypt_failures, 1);
        assert!(engine.status().is_failure());
    }
}
