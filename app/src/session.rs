//! Signed-in identity handed to screens and the transport.

use crate::config::SessionConfig;
use pitstop_core::environment::Session;

/// Role name the backend uses for administrators
pub const ADMIN_ROLE: &str = "ADMIN";

/// Session with a token and role fixed at construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSession {
    token: Option<String>,
    role: Option<String>,
}

impl StaticSession {
    /// A signed-in session
    #[must_use]
    pub fn new(token: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            role: Some(role.into()),
        }
    }

    /// No one signed in
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Session described by configuration
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            token: config.token.clone(),
            role: config.role.clone(),
        }
    }

    /// Role name, if any
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }
}

impl Session for StaticSession {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}
