//! Keyed single-flight registry of background operations.
//!
//! A [`TaskSupervisor`] belongs to one owner (one screen store). For every
//! key it remembers a generation counter; scheduling under a key cancels the
//! previous operation and bumps the generation, and a completion is honored
//! only while its captured generation is still the current one.
//!
//! Cancellation is cooperative: a [`TaskToken`] can be polled with
//! [`TaskToken::is_cancelled`] or awaited with [`TaskToken::cancelled`], and
//! the runtime stops waiting on cancelled work at its next await point.
//! In-flight transport is not aborted mid-request; only the consumption of
//! its result is suppressed.
//!
//! # Example
//!
//! ```rust
//! use pitstop_runtime::supervisor::TaskSupervisor;
//!
//! # async fn example() {
//! let supervisor = TaskSupervisor::new();
//!
//! let handle = supervisor.schedule(
//!     "load-news",
//!     |_token| async { vec!["headline"] },
//!     |news| println!("loaded {} items", news.len()),
//! );
//! let _ = handle.await;
//! assert!(!supervisor.currently_running("load-news"));
//! # }
//! ```

use pitstop_core::effect::EffectId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct TaskSlot {
    generation: u64,
    running: bool,
    cancel: watch::Sender<bool>,
}

impl TaskSlot {
    fn invalidate(&mut self) {
        self.cancel.send_replace(true);
        self.generation += 1;
        self.running = false;
    }
}

/// Capability handed to one scheduled operation.
///
/// Identifies the operation by key and generation; it cannot be used to
/// mutate the registry.
#[derive(Debug, Clone)]
pub struct TaskToken {
    id: EffectId,
    generation: u64,
    cancelled: watch::Receiver<bool>,
}

impl TaskToken {
    /// Key the operation was scheduled under
    #[must_use]
    pub const fn id(&self) -> &EffectId {
        &self.id
    }

    /// Generation captured when the operation was scheduled
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the operation has been superseded or cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the operation is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Registry dropped: its owner is gone
                return;
            }
        }
    }
}

/// Per-owner registry guaranteeing at most one authoritative operation per key
#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    tasks: Arc<Mutex<HashMap<EffectId, TaskSlot>>>,
}

impl TaskSupervisor {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EffectId, TaskSlot>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new operation under `id`, cancelling the previous one.
    ///
    /// Returns the token the new operation runs with.
    pub fn begin(&self, id: impl Into<EffectId>) -> TaskToken {
        let id = id.into();
        let (cancel, cancelled) = watch::channel(false);
        let mut tasks = self.lock();

        let generation = match tasks.get_mut(&id) {
            Some(slot) => {
                if slot.running {
                    tracing::debug!(key = %id, generation = slot.generation, "Superseding running operation");
                    metrics::counter!("supervisor.tasks.cancelled").increment(1);
                }
                slot.cancel.send_replace(true);
                slot.generation + 1
            },
            None => 1,
        };

        tasks.insert(
            id.clone(),
            TaskSlot {
                generation,
                running: true,
                cancel,
            },
        );
        metrics::counter!("supervisor.tasks.scheduled").increment(1);
        tracing::trace!(key = %id, generation, "Operation scheduled");

        TaskToken {
            id,
            generation,
            cancelled,
        }
    }

    /// Whether `token` still identifies the authoritative operation for its key
    #[must_use]
    pub fn is_current(&self, token: &TaskToken) -> bool {
        self.lock()
            .get(&token.id)
            .is_some_and(|slot| slot.generation == token.generation && !*slot.cancel.borrow())
    }

    /// Mark the operation as no longer running, if it is still current
    pub fn finish(&self, token: &TaskToken) {
        if let Some(slot) = self.lock().get_mut(&token.id) {
            if slot.generation == token.generation {
                slot.running = false;
            }
        }
    }

    /// Whether an authoritative operation is running under `id`
    #[must_use]
    pub fn currently_running(&self, id: impl Into<EffectId>) -> bool {
        self.lock().get(&id.into()).is_some_and(|slot| slot.running)
    }

    /// Current generation for `id`, if anything was ever scheduled under it
    #[must_use]
    pub fn generation(&self, id: impl Into<EffectId>) -> Option<u64> {
        self.lock().get(&id.into()).map(|slot| slot.generation)
    }

    /// Cancel the operation under `id` without starting a new one
    pub fn cancel(&self, id: impl Into<EffectId>) {
        let id = id.into();
        if let Some(slot) = self.lock().get_mut(&id) {
            if slot.running {
                metrics::counter!("supervisor.tasks.cancelled").increment(1);
            }
            slot.invalidate();
            tracing::debug!(key = %id, generation = slot.generation, "Operation cancelled");
        }
    }

    /// Cancel every tracked operation; used on owner teardown
    pub fn cancel_all(&self) {
        let mut tasks = self.lock();
        let running = tasks.values().filter(|slot| slot.running).count();
        for slot in tasks.values_mut() {
            slot.invalidate();
        }
        tracing::debug!(tracked = tasks.len(), running, "Cancelled all operations");
    }

    /// Spawn `operation` under `id` and hand its output to `on_complete`.
    ///
    /// Any earlier operation under `id` is cancelled. `on_complete` runs only
    /// if this operation is still authoritative when it finishes; a cancelled
    /// operation is dropped at its next await point.
    ///
    /// `on_complete` runs with the registry locked: a concurrent `begin` or
    /// `cancel` waits for it to return. It may spawn work that schedules again,
    /// but must not call this supervisor synchronously.
    pub fn schedule<F, Fut, T, C>(
        &self,
        id: impl Into<EffectId>,
        operation: F,
        on_complete: C,
    ) -> JoinHandle<()>
    where
        F: FnOnce(TaskToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let token = self.begin(id);
        let work = operation(token.clone());
        let supervisor = self.clone();

        tokio::spawn(async move {
            let output = tokio::select! {
                biased;
                () = token.cancelled() => None,
                output = work => Some(output),
            };

            supervisor.deliver(&token, output, on_complete);
        })
    }

    // The registry stays locked while `on_complete` runs, so no `begin` or
    // `cancel` can slip in between the generation check and the callback.
    // `on_complete` must not call back into the supervisor on this thread.
    fn deliver<T, C>(&self, token: &TaskToken, output: Option<T>, on_complete: C)
    where
        C: FnOnce(T),
    {
        let mut tasks = self.lock();
        let current = match tasks.get_mut(&token.id) {
            Some(slot) if slot.generation == token.generation => {
                slot.running = false;
                !*slot.cancel.borrow()
            },
            _ => false,
        };

        match output {
            Some(output) if current => on_complete(output),
            _ => {
                tracing::trace!(key = %token.id, generation = token.generation, "Dropping superseded result");
                metrics::counter!("store.effects.superseded").increment(1);
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn begin_bumps_generation_and_cancels_previous() {
        let supervisor = TaskSupervisor::new();

        let first = supervisor.begin("load");
        assert_eq!(first.generation(), 1);
        assert!(supervisor.is_current(&first));

        let second = supervisor.begin("load");
        assert_eq!(second.generation(), 2);
        assert!(first.is_cancelled());
        assert!(!supervisor.is_current(&first));
        assert!(supervisor.is_current(&second));
    }

    #[test]
    fn keys_are_independent() {
        let supervisor = TaskSupervisor::new();

        let tires = supervisor.begin("load-tires");
        let news = supervisor.begin("load-news");

        assert!(supervisor.is_current(&tires));
        assert!(supervisor.is_current(&news));
        assert!(supervisor.currently_running("load-tires"));
    }

    #[test]
    fn finish_only_applies_to_current_generation() {
        let supervisor = TaskSupervisor::new();

        let stale = supervisor.begin("load");
        let fresh = supervisor.begin("load");

        supervisor.finish(&stale);
        assert!(supervisor.currently_running("load"));

        supervisor.finish(&fresh);
        assert!(!supervisor.currently_running("load"));
    }

    #[test]
    fn cancel_all_invalidates_every_key() {
        let supervisor = TaskSupervisor::new();
        let a = supervisor.begin("a");
        let b = supervisor.begin("b");

        supervisor.cancel_all();

        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(!supervisor.is_current(&a));
        assert!(!supervisor.is_current(&b));
        assert!(!supervisor.currently_running("a"));
        assert_eq!(supervisor.generation("a"), Some(2));
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_cancel() {
        let supervisor = TaskSupervisor::new();
        let token = supervisor.begin("slow");

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });

        supervisor.cancel("slow");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn superseded_schedule_never_completes() {
        let supervisor = TaskSupervisor::new();
        let completions = Arc::new(Mutex::new(Vec::new()));

        let slow = supervisor.schedule(
            "load",
            |_| async {
                tokio::time::sleep(Duration::from_millis(80)).await;
                "slow"
            },
            {
                let completions = Arc::clone(&completions);
                move |value| completions.lock().unwrap().push(value)
            },
        );
        let fast = supervisor.schedule(
            "load",
            |_| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "fast"
            },
            {
                let completions = Arc::clone(&completions);
                move |value| completions.lock().unwrap().push(value)
            },
        );

        let _ = tokio::join!(slow, fast);

        assert_eq!(*completions.lock().unwrap(), vec!["fast"]);
        assert!(!supervisor.currently_running("load"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completion_is_atomic_with_rescheduling() {
        let supervisor = TaskSupervisor::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let rival = Arc::new(Mutex::new(None));

        let handle = supervisor.schedule(
            "load",
            |_| async { "first" },
            {
                let supervisor = supervisor.clone();
                let events = Arc::clone(&events);
                let rival = Arc::clone(&rival);
                move |value| {
                    events.lock().unwrap().push(value);
                    let thread = std::thread::spawn({
                        let events = Arc::clone(&events);
                        move || {
                            let token = supervisor.begin("load");
                            events.lock().unwrap().push("rescheduled");
                            token
                        }
                    });
                    *rival.lock().unwrap() = Some(thread);
                    std::thread::sleep(Duration::from_millis(30));
                    events.lock().unwrap().push("delivered");
                }
            },
        );
        handle.await.unwrap();

        let thread = rival.lock().unwrap().take().unwrap();
        let token = thread.join().unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["first", "delivered", "rescheduled"]);
        assert!(supervisor.is_current(&token));
        assert_eq!(token.generation(), 2);
    }

    #[tokio::test]
    async fn operation_can_poll_its_token() {
        let supervisor = TaskSupervisor::new();
        let steps = Arc::new(AtomicUsize::new(0));

        let handle = supervisor.schedule(
            "poll",
            {
                let steps = Arc::clone(&steps);
                move |token| async move {
                    while !token.is_cancelled() {
                        steps.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                }
            },
            |()| {},
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.cancel_all();
        handle.await.unwrap();

        let after_cancel = steps.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(steps.load(Ordering::SeqCst), after_cancel);
        assert!(after_cancel > 0);
    }
}
