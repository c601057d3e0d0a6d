//! # Pitstop Core
//!
//! Core traits and types for the Pitstop client state layer.
//!
//! Every screen of the client is modelled as a unidirectional loop:
//! UI events become actions, a reducer mutates the screen state and returns
//! effect descriptions, and the runtime executes those effects and feeds
//! their results back in as new actions.
//!
//! ## Core Concepts
//!
//! - **State**: Screen state (server truth plus derived presentation data)
//! - **Action**: All possible inputs to a reducer (UI events and remote results)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, including keyed cancellable work
//! - **Environment**: Injected collaborators (transport, clock, session)
//!
//! ## Example
//!
//! ```ignore
//! use pitstop_core::*;
//!
//! impl Reducer for NewsReducer {
//!     type State = NewsState;
//!     type Action = NewsAction;
//!     type Environment = NewsEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut NewsState,
//!         action: NewsAction,
//!         env: &NewsEnvironment,
//!     ) -> SmallVec<[Effect<NewsAction>; 4]> {
//!         match action {
//!             NewsAction::Load => {
//!                 state.news.begin_load();
//!                 let client = env.client.clone();
//!                 smallvec![Effect::cancellable(
//!                     "load-news",
//!                     async_effect! { Some(NewsAction::Loaded(client.list_news().await)) },
//!                 )]
//!             }
//!             NewsAction::Loaded(result) => {
//!                 state.news.complete(result);
//!                 smallvec![Effect::None]
//!             }
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Error classification for remote calls
pub mod classify;

/// Server-backed collection state shared by every screen
pub mod collection;

/// Calendar-day grouping and start-time ordering
pub mod grouping;

/// Transport contract consumed by the client
pub mod transport;

/// Declarative macros for effect construction
pub mod effect_macros;

/// Reducer module - The core trait for screen logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all screen logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for screen logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The screen state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Returns
        ///
        /// The effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable and cancellable.
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Key under which a cancellable operation is registered.
    ///
    /// At most one operation per key is authoritative at a time for a
    /// given store.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EffectId(String);

    impl EffectId {
        /// Create an id from any string-like key
        #[must_use]
        pub fn new(key: impl Into<String>) -> Self {
            Self(key.into())
        }

        /// The key as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for EffectId {
        fn from(key: &str) -> Self {
            Self::new(key)
        }
    }

    impl From<String> for EffectId {
        fn from(key: String) -> Self {
            Self(key)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run `effect` as the single authoritative operation for `id`.
        ///
        /// Scheduling cancels whatever was previously registered under `id`;
        /// actions produced by the superseded operation are dropped.
        Cancellable {
            /// Single-flight key
            id: EffectId,
            /// The work to run under the key
            effect: Box<Effect<Action>>,
        },

        /// Cancel the operation registered under the key, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Register `effect` as the single-flight operation for `id`
        #[must_use]
        pub fn cancellable(id: impl Into<EffectId>, effect: Effect<Action>) -> Effect<Action> {
            Effect::Cancellable {
                id: id.into(),
                effect: Box::new(effect),
            }
        }

        /// Trailing-edge debounce: dispatch `action` once `duration` has
        /// elapsed without another debounce under the same `id`.
        #[must_use]
        pub fn debounce(
            id: impl Into<EffectId>,
            duration: Duration,
            action: Action,
        ) -> Effect<Action> {
            Self::cancellable(
                id,
                Effect::Delay {
                    duration,
                    action: Box::new(action),
                },
            )
        }

        /// Cancel the operation registered under `id`
        #[must_use]
        pub fn cancel(id: impl Into<EffectId>) -> Effect<Action> {
            Effect::Cancel(id.into())
        }

        /// The cancellation key, if this is a `Cancellable` or `Cancel` effect
        #[must_use]
        pub const fn id(&self) -> Option<&EffectId> {
            match self {
                Effect::Cancellable { id, .. } | Effect::Cancel(id) => Some(id),
                _ => None,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external collaborators are abstracted behind traits and injected
/// via the Environment parameter. The transport contract lives in
/// [`crate::transport`].
pub mod environment {
    use chrono::{DateTime, Local, NaiveDate, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// The current calendar day in the local time zone
        fn today(&self) -> NaiveDate {
            self.now().with_timezone(&Local).date_naive()
        }
    }

    /// System clock for production use
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Read-only view of the signed-in identity.
    ///
    /// Credential storage itself lives outside the client state layer; screens
    /// only need the token for requests and the admin flag to decide which
    /// operations they may schedule.
    pub trait Session: Send + Sync {
        /// Bearer token to attach to requests, if signed in
        fn bearer_token(&self) -> Option<String>;

        /// Whether the signed-in user has the admin role
        fn is_admin(&self) -> bool;
    }
}
