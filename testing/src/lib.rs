//! # Pitstop Testing
//!
//! Testing utilities and helpers for the Pitstop client state layer.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - A scripted [`MockTransport`](mocks::MockTransport)
//! - JSON fixtures shaped like backend payloads
//! - Assertion helpers for reducers and stores
//!
//! ## Example
//!
//! ```ignore
//! use pitstop_testing::{MockTransport, fixtures, test_clock};
//! use pitstop_core::transport::Endpoint;
//!
//! #[tokio::test]
//! async fn loads_tires() {
//!     let transport = MockTransport::new();
//!     transport.reply(Endpoint::ListTires, fixtures::list(&[fixtures::tire(1, "Michelin", "Pilot Sport 4", 8500.0, 4)]));
//!
//!     let store = inventory_store(transport.clone(), test_clock());
//!     store.send(InventoryAction::Load).await?.wait().await;
//!
//!     assert_eq!(store.state(|s| s.tires.items().len()).await, 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use pitstop_core::environment::{Clock, Session};


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Session, Utc};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use pitstop_core::transport::{ApiRequest, Endpoint, Transport, TransportFailure};
    use serde_json::Value;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use pitstop_testing::mocks::FixedClock;
    /// use pitstop_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }

        // Tests must not depend on the machine's time zone
        fn today(&self) -> chrono::NaiveDate {
            self.time.date_naive()
        }
    }

    /// Create a default fixed clock for tests (2026-01-10 12:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-10T12:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Session with a fixed token and role
    #[derive(Debug, Clone, Default)]
    pub struct MockSession {
        token: Option<String>,
        admin: bool,
    }

    impl MockSession {
        /// A signed-in customer
        #[must_use]
        pub fn customer() -> Self {
            Self {
                token: Some("customer-token".to_string()),
                admin: false,
            }
        }

        /// A signed-in administrator
        #[must_use]
        pub fn admin() -> Self {
            Self {
                token: Some("admin-token".to_string()),
                admin: true,
            }
        }

        /// Nobody signed in
        #[must_use]
        pub fn anonymous() -> Self {
            Self::default()
        }
    }

    impl Session for MockSession {
        fn bearer_token(&self) -> Option<String> {
            self.token.clone()
        }

        fn is_admin(&self) -> bool {
            self.admin
        }
    }

    #[derive(Debug, Clone)]
    struct Scripted {
        delay: Duration,
        result: Result<Value, TransportFailure>,
    }

    #[derive(Debug, Default)]
    struct Script {
        queued: HashMap<Endpoint, VecDeque<Scripted>>,
        fallback: HashMap<Endpoint, Scripted>,
        requests: Vec<ApiRequest>,
    }

    /// Scripted transport.
    ///
    /// Replies are queued per endpoint and consumed in order; once an
    /// endpoint's queue is empty its fallback reply (if any) is used, and
    /// otherwise the call fails with status 404. Every request is recorded
    /// when `call` is invoked, before any scripted delay.
    ///
    /// Cloning shares the script, so a test can keep a handle after moving
    /// the transport into an environment.
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        script: Arc<Mutex<Script>>,
    }

    impl MockTransport {
        /// Create a transport with nothing scripted
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn script(&self) -> std::sync::MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn enqueue(&self, endpoint: Endpoint, delay: Duration, result: Result<Value, TransportFailure>) {
            self.script()
                .queued
                .entry(endpoint)
                .or_default()
                .push_back(Scripted { delay, result });
        }

        /// Queue a successful reply
        pub fn reply(&self, endpoint: Endpoint, body: Value) {
            self.enqueue(endpoint, Duration::ZERO, Ok(body));
        }

        /// Queue a successful reply that resolves after `delay`
        pub fn reply_after(&self, endpoint: Endpoint, delay: Duration, body: Value) {
            self.enqueue(endpoint, delay, Ok(body));
        }

        /// Queue a failure
        pub fn fail(&self, endpoint: Endpoint, failure: TransportFailure) {
            self.enqueue(endpoint, Duration::ZERO, Err(failure));
        }

        /// Queue a failure that resolves after `delay`
        pub fn fail_after(&self, endpoint: Endpoint, delay: Duration, failure: TransportFailure) {
            self.enqueue(endpoint, delay, Err(failure));
        }

        /// Queue a non-success status with an optional `{"error": ..}` payload
        pub fn reject(&self, endpoint: Endpoint, status_code: u16, error: Option<&str>) {
            let body = error.map(|message| serde_json::json!({ "error": message }).to_string());
            self.fail(endpoint, TransportFailure::Status { status_code, body });
        }

        /// Reply used whenever the endpoint's queue is empty
        pub fn always(&self, endpoint: Endpoint, body: Value) {
            self.script().fallback.insert(
                endpoint,
                Scripted {
                    delay: Duration::ZERO,
                    result: Ok(body),
                },
            );
        }

        /// Number of calls made to `endpoint`
        #[must_use]
        pub fn calls(&self, endpoint: Endpoint) -> usize {
            self.script()
                .requests
                .iter()
                .filter(|request| request.endpoint == endpoint)
                .count()
        }

        /// Every recorded request, in call order
        #[must_use]
        pub fn requests(&self) -> Vec<ApiRequest> {
            self.script().requests.clone()
        }

        /// The most recent request to `endpoint`
        #[must_use]
        pub fn last_request(&self, endpoint: Endpoint) -> Option<ApiRequest> {
            self.script()
                .requests
                .iter()
                .rev()
                .find(|request| request.endpoint == endpoint)
                .cloned()
        }
    }

    impl Transport for MockTransport {
        fn call(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value, TransportFailure>> {
            let endpoint = request.endpoint;
            let scripted = {
                let mut script = self.script();
                script.requests.push(request);
                script
                    .queued
                    .get_mut(&endpoint)
                    .and_then(VecDeque::pop_front)
                    .or_else(|| script.fallback.get(&endpoint).cloned())
            };

            tracing::trace!(%endpoint, scripted = scripted.is_some(), "Mock transport call");

            async move {
                match scripted {
                    Some(Scripted { delay, result }) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        result
                    },
                    None => Err(TransportFailure::Status {
                        status_code: 404,
                        body: None,
                    }),
                }
            }
            .boxed()
        }
    }
}

/// JSON payloads shaped like the backend's responses
pub mod fixtures {
    use serde_json::{Value, json};

    /// A tire record
    #[must_use]
    pub fn tire(id: i64, brand: &str, model: &str, price: f64, stock: i64) -> Value {
        json!({
            "id": id,
            "brand": brand,
            "model": model,
            "size": "225/45 R17",
            "season": "SUMMER",
            "price": price,
            "stockQuantity": stock,
        })
    }

    /// An appointment record; `start` uses the server's local format
    #[must_use]
    pub fn appointment(id: i64, start: Option<&str>, client: &str) -> Value {
        json!({
            "id": id,
            "startTime": start,
            "clientName": client,
            "clientPhone": "+7 (900) 123-45-67",
            "serviceName": "Tire change",
            "comment": null,
            "status": "CONFIRMED",
        })
    }

    /// An admin order record
    #[must_use]
    pub fn order(id: i64, summary: &str, total: f64) -> Value {
        json!({
            "id": id,
            "clientName": "Anna",
            "clientPhone": "+79001234567",
            "itemsSummary": summary,
            "totalPrice": total,
            "status": "NEW",
            "createdAt": "2026-01-10T09:30:00",
        })
    }

    /// A news record
    #[must_use]
    pub fn news(id: i64, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "content": "Winter tires are in stock.",
            "imageUrl": null,
            "createdAt": "2026-01-09T10:00:00.123",
        })
    }

    /// A bookable slot at `hour:minute`
    #[must_use]
    pub fn slot(hour: u32, minute: u32, available: bool) -> Value {
        json!({
            "time": { "hour": hour, "minute": minute },
            "isAvailable": available,
        })
    }

    /// Wrap records into a JSON array
    #[must_use]
    pub fn list(items: &[Value]) -> Value {
        Value::Array(items.to_vec())
    }
}

/// Test helpers and utilities
pub mod helpers {
    use pitstop_core::reducer::Reducer;
    use pitstop_runtime::Store;
    use std::time::Duration;

    /// Install a test-writer tracing subscriber, once per process
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Poll the store until `predicate` holds or `timeout` expires.
    ///
    /// Returns whether the predicate was satisfied.
    pub async fn eventually<S, A, E, R, F>(
        store: &Store<S, A, E, R>,
        timeout: Duration,
        predicate: F,
    ) -> bool
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: Fn(&S) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if store.state(&predicate).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Property-based testing utilities
pub mod properties {
    use proptest::prelude::*;

    /// Prices in cents-free units, including duplicates at the bounds
    pub fn price() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.0), Just(100_000.0), (0u32..20_000).prop_map(f64::from)]
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, MockSession, MockTransport, test_clock};
