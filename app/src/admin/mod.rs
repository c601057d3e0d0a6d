//! Administrator screens.
//!
//! Both screens only schedule remote work for a session with the admin
//! role; for anyone else a load is logged and dropped.

pub mod appointments;
pub mod orders;

use crate::client::ShopClient;
use pitstop_core::environment::{Clock, Session, SystemClock};
use std::sync::Arc;

/// Dependencies of the administrator screens
#[derive(Clone)]
pub struct AdminEnvironment {
    /// Backend client
    pub client: ShopClient,
    /// Signed-in identity
    pub session: Arc<dyn Session>,
    /// Source of "today"
    pub clock: Arc<dyn Clock>,
}

impl AdminEnvironment {
    /// Creates a new `AdminEnvironment` on the system clock
    #[must_use]
    pub fn new(client: ShopClient, session: Arc<dyn Session>) -> Self {
        Self {
            client,
            session,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether admin-only work may be scheduled; logs a refusal
    pub(crate) fn authorize(&self, operation: &'static str) -> bool {
        let allowed = self.session.is_admin();
        if !allowed {
            tracing::warn!(operation, "Refusing admin operation for non-admin session");
        }
        allowed
    }
}

impl std::fmt::Debug for AdminEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminEnvironment")
            .field("client", &self.client)
            .field("is_admin", &self.session.is_admin())
            .finish_non_exhaustive()
    }
}
