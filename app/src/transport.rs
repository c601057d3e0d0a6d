//! HTTP transport backed by reqwest.

use crate::config::ApiConfig;
use futures::FutureExt;
use futures::future::BoxFuture;
use pitstop_core::environment::Session;
use pitstop_core::transport::{ApiRequest, Endpoint, Transport, TransportFailure};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// [`Transport`] talking JSON over HTTP to the shop backend.
///
/// The bearer token is read from the session on every call, so a token
/// refreshed elsewhere is picked up without rebuilding the transport.
/// Timeouts are enforced by the underlying client and surface as
/// [`TransportFailure::Io`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn Session>,
}

impl HttpTransport {
    /// Build a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the HTTP client cannot be initialised
    /// (for example when the TLS backend fails to load).
    pub fn new(config: &ApiConfig, session: Arc<dyn Session>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        let (_, path) = endpoint.route();
        format!("{}{path}", self.base_url)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn http_method(method: &str) -> Method {
    match method {
        "POST" => Method::POST,
        _ => Method::GET,
    }
}

fn request_failure(error: reqwest::Error) -> TransportFailure {
    if error.is_decode() {
        TransportFailure::Decode(Arc::new(error))
    } else {
        TransportFailure::Io(Arc::new(error))
    }
}

impl Transport for HttpTransport {
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value, TransportFailure>> {
        let endpoint = request.endpoint;
        let (method, _) = endpoint.route();

        let mut builder = self
            .client
            .request(http_method(method), self.endpoint_url(endpoint))
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = self.session.bearer_token() {
            builder = builder.bearer_auth(token);
        }

        let span = tracing::debug_span!("http_call", %endpoint);

        async move {
            let response = builder.send().await.map_err(request_failure)?;
            let status = response.status();
            let bytes = response.bytes().await.map_err(request_failure)?;

            if !status.is_success() {
                let body = String::from_utf8_lossy(&bytes).trim().to_string();
                tracing::debug!(status = status.as_u16(), "Request rejected");
                return Err(TransportFailure::Status {
                    status_code: status.as_u16(),
                    body: (!body.is_empty()).then_some(body),
                });
            }

            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes).map_err(|error| TransportFailure::Decode(Arc::new(error)))
        }
        .instrument(span)
        .boxed()
    }
}
