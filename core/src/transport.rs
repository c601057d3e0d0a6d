//! Transport contract consumed by the client.
//!
//! The generated REST client and its wire schema live outside this crate.
//! The state layer only needs `call(endpoint, params)` returning either a
//! JSON body or a raw failure.

use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque, shareable failure cause
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Backend operations used by the client screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /api/tires`
    ListTires,
    /// `POST /api/orders`
    CreateOrder,
    /// `GET /api/admin/orders`
    AdminOrders,
    /// `GET /api/admin/appointments?date=`
    AdminAppointments,
    /// `GET /api/news`
    ListNews,
    /// `POST /api/news`
    CreateNews,
    /// `GET /api/slots?date=&serviceId=`
    ListSlots,
    /// `POST /api/appointments`
    CreateBooking,
}

impl Endpoint {
    /// HTTP method and path relative to the API base URL
    #[must_use]
    pub const fn route(self) -> (&'static str, &'static str) {
        match self {
            Self::ListTires => ("GET", "/api/tires"),
            Self::CreateOrder => ("POST", "/api/orders"),
            Self::AdminOrders => ("GET", "/api/admin/orders"),
            Self::AdminAppointments => ("GET", "/api/admin/appointments"),
            Self::ListNews => ("GET", "/api/news"),
            Self::CreateNews => ("POST", "/api/news"),
            Self::ListSlots => ("GET", "/api/slots"),
            Self::CreateBooking => ("POST", "/api/appointments"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (method, path) = self.route();
        write!(f, "{method} {path}")
    }
}

/// A single request to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Target operation
    pub endpoint: Endpoint,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// JSON body for write operations
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A request without query or body
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            query: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `body` cannot be represented as JSON.
    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Value of a query parameter
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw failure surfaced by a transport, before classification
#[derive(Error, Debug, Clone)]
pub enum TransportFailure {
    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// The server answered with a non-success status
    #[error("server responded with status {status_code}")]
    Status {
        /// HTTP status code
        status_code: u16,
        /// Raw response payload, if any
        body: Option<String>,
    },

    /// The response body could not be parsed
    #[error("response could not be decoded: {0}")]
    Decode(#[source] Cause),

    /// Connection, TLS, timeout or any other transport-level failure
    #[error("transport failure: {0}")]
    Io(#[source] Cause),
}

/// The transport collaborator.
///
/// Returned futures are `'static` so they can be moved into effects; they
/// may resolve to [`TransportFailure::Cancelled`] if the request is aborted.
pub trait Transport: Send + Sync {
    /// Execute a request and return the JSON response body
    fn call(&self, request: ApiRequest)
    -> BoxFuture<'static, Result<serde_json::Value, TransportFailure>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_keeps_query_order() {
        let request = ApiRequest::new(Endpoint::ListSlots)
            .with_query("date", "2026-01-10")
            .with_query("serviceId", 7);

        assert_eq!(request.query_value("date"), Some("2026-01-10"));
        assert_eq!(request.query_value("serviceId"), Some("7"));
        assert_eq!(request.query[0].0, "date");
    }

    #[test]
    fn endpoint_display_includes_method() {
        assert_eq!(Endpoint::CreateOrder.to_string(), "POST /api/orders");
    }
}
