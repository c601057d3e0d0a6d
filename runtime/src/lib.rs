//! # Pitstop Runtime
//!
//! Runtime implementation for the Pitstop client state layer.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling for one screen.
//!
//! ## Core Components
//!
//! - **Store**: Owns one screen's state and executes effects
//! - **`TaskSupervisor`**: Keyed single-flight registry behind `Effect::Cancellable`
//! - **Event Loop**: action → reducer → effects → action feedback loop
//!
//! ## Consumption rule
//!
//! Actions produced by an effect that runs under a cancellation key are
//! applied only after the store holds its state write lock *and* the
//! supervisor confirms the operation's generation is still current. Effects
//! are registered while the reducer pass that produced them still holds the
//! same lock, so a superseded operation can never overwrite state derived
//! from a newer one.
//!
//! ## Example
//!
//! ```ignore
//! use pitstop_runtime::Store;
//!
//! let store = Store::new(InventoryState::default(), InventoryReducer, environment);
//!
//! store.send(InventoryAction::Load).await?;
//! let visible = store.state(|s| s.visible().len()).await;
//! ```

use pitstop_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed single-flight supervision of background operations
pub mod supervisor;

/// Metric descriptions for observability
pub mod metrics;

pub use supervisor::{TaskSupervisor, TaskToken};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after teardown.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for Store instances
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the action broadcast channel
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to complete. Effects scheduled by feedback actions are not tracked.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Load).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new(scope: Option<TaskToken>) -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
            scope,
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
        }
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
///
/// Carries the completion counter and, for effects running under a
/// cancellation key, the token their results are checked against.
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    scope: Option<TaskToken>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }

    /// Fresh tracking for a nested group, inheriting or replacing the scope
    fn child(scope: Option<TaskToken>) -> (Self, watch::Receiver<()>) {
        let (tx, rx) = watch::channel(());
        let tracking = Self {
            counter: Arc::new(AtomicUsize::new(0)),
            notifier: tx,
            scope,
        };
        (tracking, rx)
    }

    /// Wait until every effect tracked here has completed
    async fn drained(&self, rx: &mut watch::Receiver<()>) {
        while self.counter.load(Ordering::SeqCst) > 0 {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.scope.as_ref().is_some_and(TaskToken::is_cancelled)
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
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

/// Where an action entered the store
enum Origin {
    /// Sent by the UI layer
    External,
    /// Produced by an effect, optionally under a cancellation key
    Effect(Option<TaskToken>),
}

/// Store module - The runtime for reducers
///
/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Origin, Reducer, RwLock, StoreConfig, StoreError,
        TaskSupervisor, TaskToken,
    };
    use pitstop_core::effect::EffectId;
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for one screen
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; every mutation happens under its write lock)
    /// 2. Reducer (screen logic)
    /// 3. Environment (injected collaborators)
    /// 4. Effect execution (with feedback loop)
    /// 5. A [`TaskSupervisor`] owning the single-flight keys of this screen
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        supervisor: TaskSupervisor,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        default_shutdown_timeout: Duration,
        /// Action broadcast channel for observing actions produced by effects.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                supervisor: TaskSupervisor::new(),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                default_shutdown_timeout: config.default_shutdown_timeout,
                action_broadcast,
            }
        }

        /// The single-flight registry owned by this store
        #[must_use]
        pub const fn supervisor(&self) -> &TaskSupervisor {
            &self.supervisor
        }

        /// Whether an operation is currently authoritative under `id`
        #[must_use]
        pub fn is_running(&self, id: impl Into<EffectId>) -> bool {
            self.supervisor.currently_running(id)
        }

        /// Tear the store down: reject further actions and cancel every
        /// keyed operation so no completion mutates state afterwards.
        pub fn teardown(&self) {
            if !self.shutdown.swap(true, Ordering::AcqRel) {
                tracing::info!("Store teardown");
            }
            self.supervisor.cancel_all();
        }

        /// Tear down and wait for in-flight effect tasks to drain
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            self.teardown();

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::debug!("All effects drained");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// [`shutdown`](Self::shutdown) with the configured default timeout
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running.
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.default_shutdown_timeout).await
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects (registering cancellation keys
        ///    before the lock is released)
        /// 4. Effects may produce more actions (feedback loop)
        ///
        /// Safe to call repeatedly and rapidly: keyed effects supersede
        /// their predecessors.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store was torn down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.send_internal(action, Origin::External).await
        }

        /// Send an action and wait for a matching result action
        ///
        /// Subscribes to the action broadcast before sending, then returns the
        /// first effect-produced action matching `predicate`.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions applied from effects
        ///
        /// Superseded results are never broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let loading = store.state(|s| s.tires.is_loading()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        #[tracing::instrument(skip_all, name = "store_send_internal")]
        async fn send_internal(&self, action: A, origin: Origin) -> Result<EffectHandle, StoreError> {
            let scope = match &origin {
                Origin::External => None,
                Origin::Effect(scope) => scope.clone(),
            };
            let (handle, tracking) = EffectHandle::new(None);

            let mut state = self.state.write().await;

            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            if let Some(token) = &scope {
                if !self.supervisor.is_current(token) {
                    tracing::trace!(
                        key = %token.id(),
                        generation = token.generation(),
                        "Dropping superseded result"
                    );
                    metrics::counter!("store.effects.superseded").increment(1);
                    return Ok(EffectHandle::completed());
                }
            }

            if matches!(origin, Origin::Effect(_)) {
                // Broadcast to observers
                let _ = self.action_broadcast.send(action.clone());
            }

            tracing::debug!("Processing action");
            metrics::counter!("store.commands.total").increment(1);

            let start = std::time::Instant::now();
            let effects = self.reducer.reduce(&mut *state, action, &self.environment);
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer completed, returned {} effects", effects.len());

            // Start effects before releasing the lock so cancellation keys are
            // registered atomically with the state change that requested them
            for effect in effects {
                self.execute_effect_internal(effect, tracking.clone());
            }
            drop(state);

            Ok(handle)
        }

        /// Feed an effect-produced action back into the store
        async fn feed_back(&self, action: A, scope: Option<TaskToken>) {
            if let Err(error) = self.send_internal(action, Origin::Effect(scope)).await {
                tracing::debug!(error = %error, "Effect result discarded");
            }
        }

        /// Spawn an effect task with completion and shutdown tracking
        fn spawn_tracked<F>(&self, tracking: &EffectTracking, task: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let guard = DecrementGuard(tracking.clone());

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                task.await;
            });
        }

        /// Execute an effect with tracking
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Delay`: Waits for duration, then sends action
        /// - `Parallel`: Executes effects concurrently
        /// - `Sequential`: Executes effects in order, waiting for each to complete
        /// - `Cancellable`: Registers a key with the supervisor and runs the inner
        ///   effect under its token
        /// - `Cancel`: Invalidates a key
        ///
        /// Work running under a token stops at its next await point once the
        /// token is cancelled; anything it still produces is dropped by the
        /// generation check in `send_internal`.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned, so pass by value is intentional
        #[allow(clippy::too_many_lines)]
        fn execute_effect_internal(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    let store = self.clone();
                    let scope = tracking.scope.clone();

                    self.spawn_tracked(&tracking, async move {
                        let output = match &scope {
                            Some(token) => tokio::select! {
                                biased;
                                () = token.cancelled() => None,
                                output = fut => output,
                            },
                            None => fut.await,
                        };

                        if let Some(action) = output {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            store.feed_back(action, scope).await;
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);

                    let store = self.clone();
                    let scope = tracking.scope.clone();

                    self.spawn_tracked(&tracking, async move {
                        let elapsed = match &scope {
                            Some(token) => tokio::select! {
                                biased;
                                () = token.cancelled() => false,
                                () = tokio::time::sleep(duration) => true,
                            },
                            None => {
                                tokio::time::sleep(duration).await;
                                true
                            },
                        };

                        if elapsed {
                            tracing::trace!("Effect::Delay completed, sending action");
                            store.feed_back(*action, scope).await;
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);

                    for effect in effects {
                        self.execute_effect_internal(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    let effect_count = effects.len();
                    tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                    metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);

                    let store = self.clone();
                    let scope = tracking.scope.clone();

                    self.spawn_tracked(&tracking, async move {
                        for (idx, effect) in effects.into_iter().enumerate() {
                            let (sub_tracking, mut sub_rx) = EffectTracking::child(scope.clone());
                            if sub_tracking.is_cancelled() {
                                tracing::trace!("Sequential effect cancelled before step {}", idx + 1);
                                break;
                            }

                            tracing::trace!("Executing sequential effect {} of {}", idx + 1, effect_count);
                            store.execute_effect_internal(effect, sub_tracking.clone());
                            sub_tracking.drained(&mut sub_rx).await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
                Effect::Cancellable { id, effect } => {
                    tracing::trace!(key = %id, "Executing Effect::Cancellable");
                    metrics::counter!("store.effects.executed", "type" => "cancellable").increment(1);

                    // Registered synchronously: the caller still holds the state lock
                    let token = self.supervisor.begin(id);
                    let store = self.clone();

                    self.spawn_tracked(&tracking, async move {
                        let (sub_tracking, mut sub_rx) = EffectTracking::child(Some(token.clone()));
                        store.execute_effect_internal(*effect, sub_tracking.clone());
                        sub_tracking.drained(&mut sub_rx).await;
                        store.supervisor.finish(&token);
                    });
                },
                Effect::Cancel(id) => {
                    tracing::trace!(key = %id, "Executing Effect::Cancel");
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    self.supervisor.cancel(id);
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
                supervisor: self.supervisor.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                default_shutdown_timeout: self.default_shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use pitstop_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
        applied: Vec<&'static str>,
    }

    #[derive(Debug, Clone)]
    enum TestAction {
        Increment,
        NoOp,
        ProduceEffect,
        ProduceDelayedAction,
        ProduceParallelEffects,
        ProduceSequentialEffects,
        ProducePanickingEffect,
        /// Keyed load completing after `delay_ms` with `label`
        Load { label: &'static str, delay_ms: u64 },
        Loaded(&'static str),
        Debounce,
        CancelLoad,
    }

    #[derive(Debug, Clone)]
    struct TestEnv;

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                TestAction::NoOp => smallvec![Effect::None],
                TestAction::ProduceEffect => {
                    smallvec![Effect::Future(Box::pin(async { Some(TestAction::Increment) }))]
                },
                TestAction::ProduceDelayedAction => smallvec![Effect::Delay {
                    duration: Duration::from_millis(10),
                    action: Box::new(TestAction::Increment),
                }],
                TestAction::ProduceParallelEffects => smallvec![Effect::Parallel(vec![
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                ])],
                TestAction::ProduceSequentialEffects => smallvec![Effect::Sequential(vec![
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                    Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                ])],
                TestAction::ProducePanickingEffect => {
                    #[allow(clippy::panic)] // Intentional panic for testing error handling
                    {
                        smallvec![Effect::Future(Box::pin(async {
                            panic!("Intentional panic in effect for testing");
                        }))]
                    }
                },
                TestAction::Load { label, delay_ms } => smallvec![Effect::cancellable(
                    "load",
                    Effect::Future(Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        Some(TestAction::Loaded(label))
                    })),
                )],
                TestAction::Loaded(label) => {
                    state.applied.push(label);
                    smallvec![Effect::None]
                },
                TestAction::Debounce => smallvec![Effect::debounce(
                    "debounce",
                    Duration::from_millis(50),
                    TestAction::Increment,
                )],
                TestAction::CancelLoad => smallvec![Effect::cancel("load")],
            }
        }
    }

    fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv)
    }

    #[tokio::test]
    async fn test_send_action() {
        let store = store();

        let _ = store.send(TestAction::Increment).await;
        let _ = store.send(TestAction::NoOp).await;

        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effect_future() {
        let store = store();

        let mut handle = store.send(TestAction::ProduceEffect).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effect_delay() {
        let store = store();

        let mut handle = store.send(TestAction::ProduceDelayedAction).await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 0);

        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effect_parallel_and_sequential() {
        let store = store();

        let mut parallel = store.send(TestAction::ProduceParallelEffects).await.unwrap();
        parallel.wait_with_timeout(Duration::from_secs(1)).await.unwrap();
        let mut sequential = store.send(TestAction::ProduceSequentialEffects).await.unwrap();
        sequential.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 5);
    }

    #[tokio::test]
    async fn test_panicking_effect_does_not_halt_store() {
        let store = store();

        let mut handle = store.send(TestAction::ProducePanickingEffect).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        let _ = store.send(TestAction::Increment).await;
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_superseded_result_is_dropped() {
        let store = store();

        // The first load finishes last; only the second may be applied
        let mut slow = store
            .send(TestAction::Load { label: "first", delay_ms: 80 })
            .await
            .unwrap();
        let mut fast = store
            .send(TestAction::Load { label: "second", delay_ms: 10 })
            .await
            .unwrap();

        fast.wait_with_timeout(Duration::from_secs(1)).await.unwrap();
        slow.wait_with_timeout(Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.state(|s| s.applied.clone()).await, vec!["second"]);
        assert!(!store.is_running("load"));
    }

    #[tokio::test]
    async fn test_debounce_fires_once_after_quiet_period() {
        let store = store();

        for _ in 0..5 {
            let _ = store.send(TestAction::Debounce).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.state(|s| s.value).await, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_cancel_effect_suppresses_result() {
        let store = store();

        let _ = store.send(TestAction::Load { label: "cancelled", delay_ms: 30 }).await;
        assert!(store.is_running("load"));
        let _ = store.send(TestAction::CancelLoad).await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.state(|s| s.applied.is_empty()).await);
        assert!(!store.is_running("load"));
    }

    #[tokio::test]
    async fn test_teardown_stops_mutations() {
        let store = store();

        let _ = store.send(TestAction::Load { label: "late", delay_ms: 20 }).await;
        let _ = store.send(TestAction::ProduceDelayedAction).await;
        store.teardown();

        assert!(matches!(
            store.send(TestAction::Increment).await,
            Err(StoreError::ShutdownInProgress)
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let (value, applied) = store.state(|s| (s.value, s.applied.clone())).await;
        assert_eq!(value, 0);
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_cancelled_work() {
        let store = store();

        let _ = store.send(TestAction::Load { label: "never", delay_ms: 10_000 }).await;
        store.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_and_wait_for_observes_fed_back_action() {
        let store = store();

        let action = store
            .send_and_wait_for(
                TestAction::Load { label: "observed", delay_ms: 5 },
                |a| matches!(a, TestAction::Loaded(_)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert!(matches!(action, TestAction::Loaded("observed")));
    }
}
