//! # Quill Runtime
//!
//! Runtime that coordinates reducer execution and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: owns the state, runs the reducer and spawns effects
//! - **`EffectHandle`**: returned by every `send`, lets callers wait for or
//!   cancel the effects that action started
//! - **`StateObserver`**: synchronous hook invoked inside the reducer step
//!   whenever the state actually changed
//!
//! ## Example
//!
//! ```ignore
//! use quill_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action and wait for the effects it started
//! let mut handle = store.send(Action::DoSomething).await?;
//! handle.wait().await;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use quill_core::{effect::Effect, reducer::Reducer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::AbortHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Waiting on an effect handle exceeded its deadline
        #[error("Timed out waiting for effects to complete")]
        Timeout,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Synchronous observer of state changes.
///
/// Observers run while the store holds its write lock, right after the
/// reducer returned, and only when the new state differs from the previous
/// one. They must be quick and must not call back into the store.
pub trait StateObserver<S>: Send + Sync {
    /// Called with the state produced by the latest reducer step.
    fn state_changed(&self, state: &S);
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send`]. Tracks the effects spawned directly by that
/// action, including the feedback action each effect produced.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // Effects from Action::Start have finished and their results were reduced
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl EffectHandle {
    /// Create a handle together with the tracking context used by the runtime
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
            tasks: Arc::clone(&tasks),
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
            tasks,
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Returns `true` once every tracked effect has finished or was cancelled
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    /// Abort every effect task started for this handle.
    ///
    /// An aborted effect never feeds its action back into the store. Effects
    /// that already completed are unaffected. Returns the number of tasks
    /// that were still running when the abort was requested.
    pub fn cancel(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut aborted = 0;
        for task in tasks.iter().filter(|task| !task.is_finished()) {
            task.abort();
            aborted += 1;
        }
        if aborted > 0 {
            metrics::counter!("store.effects.cancelled").increment(aborted as u64);
            tracing::debug!(aborted, "Cancelled running effects");
        }
        aborted
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracking context is gone, nothing left to wait for
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: tracking context shared by the effects of one `send`
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
    tasks: Arc<Mutex<Vec<AbortHandle>>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }

    fn register(&self, task: AbortHandle) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }
}

/// Internal: decrements the effect counter on drop, including when the
/// effect task is aborted before it was ever polled
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StateObserver, StoreError,
    };
    use tokio::sync::{broadcast, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; reducer steps are serialized)
    /// 2. Reducer (state transitions)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Change notification (watch channel and synchronous observers)
    ///
    /// Cloning a store yields another handle to the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Actions produced by effects, for observers that care about
        /// results rather than state (e.g. telling "not found" from "failed").
        action_broadcast: broadcast::Sender<A>,
        state_watch: Arc<watch::Sender<S>>,
        observers: Arc<Vec<Arc<dyn StateObserver<S>>>>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Clone + Send + 'static,
        S: Clone + PartialEq + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new store with a custom action broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));
            let (state_watch, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
                state_watch: Arc::new(state_watch),
                observers: Arc::new(Vec::new()),
            }
        }

        /// Register a synchronous state observer.
        ///
        /// Call before cloning the store; clones made earlier do not see
        /// observers added later.
        #[must_use]
        pub fn with_observer(mut self, observer: Arc<dyn StateObserver<S>>) -> Self {
            Arc::make_mut(&mut self.observers).push(observer);
            self
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Publishes the new state to watchers and observers if it changed
        /// 4. Spawns returned effects; their actions are fed back through `send`
        ///
        /// Returns after the reducer step, not after the effects finished.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                self.publish(&state);
                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            Ok(handle)
        }

        /// Subscribe to actions produced by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to state changes.
        ///
        /// The receiver always holds the latest state; it is updated inside
        /// the reducer step, before `send` returns.
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<S> {
            self.state_watch.subscribe()
        }

        /// Read current state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Number of effect tasks still running across all handles
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::SeqCst)
        }

        /// Stop accepting actions and wait for running effects.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] with the number of effects
        /// still running when `timeout` elapsed.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            self.shutdown.store(true, Ordering::Release);
            tracing::info!("Store shutdown initiated");

            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let pending = self.pending_effects();
                if pending == 0 {
                    tracing::info!("Store shutdown complete");
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    tracing::warn!(pending, "Store shutdown timed out");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        fn publish(&self, state: &S) {
            let changed = self.state_watch.send_if_modified(|current| {
                if current == state {
                    false
                } else {
                    current.clone_from(state);
                    true
                }
            });

            if changed {
                for observer in self.observers.iter() {
                    observer.state_changed(state);
                }
            }
        }

        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel")
                        .increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking);
                    }
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    tracking.increment();
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);

                    // Guards live outside the future so an abort before the
                    // first poll still releases the counters.
                    let guard = DecrementGuard(tracking.clone());
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
                    let store = self.clone();

                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            let _ = store.action_broadcast.send(action.clone());
                            if let Err(error) = store.send(action).await {
                                tracing::warn!(%error, "Dropped effect result");
                            }
                        }
                    });
                    tracking.register(task.abort_handle());
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
                state_watch: Arc::clone(&self.state_watch),
                observers: Arc::clone(&self.observers),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use quill_core::{smallvec, SmallVec};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct CounterState {
        count: i64,
    }

    #[derive(Debug, Clone)]
    enum CounterAction {
        Increment,
        Touch,
        IncrementLater(Duration),
        Both(Duration),
    }

    #[derive(Clone)]
    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut CounterState,
            action: CounterAction,
            _env: &(),
        ) -> SmallVec<[Effect<CounterAction>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::None]
                },
                CounterAction::Touch => smallvec![Effect::None],
                CounterAction::IncrementLater(delay) => {
                    smallvec![Effect::future(async move {
                        tokio::time::sleep(delay).await;
                        Some(CounterAction::Increment)
                    })]
                },
                CounterAction::Both(delay) => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(CounterAction::Increment) }),
                    Effect::future(async move {
                        tokio::time::sleep(delay).await;
                        Some(CounterAction::Increment)
                    }),
                ])],
            }
        }
    }

    fn store() -> Store<CounterState, CounterAction, (), CounterReducer> {
        Store::new(CounterState::default(), CounterReducer, ())
    }

    struct Recorder(Mutex<Vec<i64>>);

    impl StateObserver<CounterState> for Recorder {
        fn state_changed(&self, state: &CounterState) {
            self.0.lock().unwrap().push(state.count);
        }
    }

    #[tokio::test]
    async fn send_applies_reducer_before_returning() {
        let store = store();
        let _ = store.send(CounterAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn effect_feedback_is_reduced_once_handle_completes() {
        let store = store();
        let mut handle = store
            .send(CounterAction::IncrementLater(Duration::from_millis(5)))
            .await
            .unwrap();
        assert_eq!(store.state(|s| s.count).await, 0);

        handle.wait_with_timeout(Duration::from_secs(2)).await.unwrap();
        assert!(handle.is_complete());
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn parallel_effects_share_one_handle() {
        let store = store();
        let mut handle = store
            .send(CounterAction::Both(Duration::from_millis(5)))
            .await
            .unwrap();
        handle.wait_with_timeout(Duration::from_secs(2)).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 2);
    }

    #[tokio::test]
    async fn cancelled_effect_never_feeds_back() {
        let store = store();
        let mut handle = store
            .send(CounterAction::IncrementLater(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(handle.cancel(), 1);
        handle.wait_with_timeout(Duration::from_secs(2)).await.unwrap();

        assert_eq!(store.state(|s| s.count).await, 0);
        assert_eq!(store.pending_effects(), 0);
    }

    #[tokio::test]
    async fn completed_handle_does_not_block() {
        let mut handle = EffectHandle::completed();
        assert!(handle.is_complete());
        assert_eq!(handle.cancel(), 0);
        handle.wait_with_timeout(Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn observers_only_see_real_changes() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let store = store().with_observer(recorder.clone());

        let _ = store.send(CounterAction::Increment).await.unwrap();
        let _ = store.send(CounterAction::Touch).await.unwrap();
        let _ = store.send(CounterAction::Increment).await.unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn state_watch_is_updated_inside_send() {
        let store = store();
        let mut rx = store.subscribe_state();

        let _ = store.send(CounterAction::Increment).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().count, 1);

        let _ = store.send(CounterAction::Touch).await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn effect_actions_are_broadcast() {
        let store = store();
        let mut actions = store.subscribe_actions();

        let mut handle = store
            .send(CounterAction::IncrementLater(Duration::from_millis(1)))
            .await
            .unwrap();
        handle.wait().await;

        assert!(matches!(actions.recv().await.unwrap(), CounterAction::Increment));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = store();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send(CounterAction::Increment).await;
        assert_eq!(result.unwrap_err(), StoreError::ShutdownInProgress);
    }

    #[tokio::test]
    async fn shutdown_reports_stuck_effects() {
        let store = store();
        let handle = store
            .send(CounterAction::IncrementLater(Duration::from_secs(60)))
            .await
            .unwrap();

        let result = store.shutdown(Duration::from_millis(30)).await;
        assert_eq!(result, Err(StoreError::ShutdownTimeout(1)));

        handle.cancel();
    }
}
