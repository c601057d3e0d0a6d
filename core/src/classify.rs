//! Classification of remote-call failures.
//!
//! Every failure coming back from the transport is mapped exactly once, at
//! the boundary where the call returns, into an [`ErrorKind`]. From then on
//! only the `ErrorKind` travels through actions and state.

use crate::transport::{Cause, TransportFailure};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Generic text shown for transport-class failures
pub const NETWORK_FAILURE_MESSAGE: &str = "network error: the server could not be reached";

/// Classified failure of a remote call.
///
/// `Cancelled` is expected and never shown to the user. The other kinds are
/// written into the owning screen's error message; see
/// [`ErrorKind::user_message`].
#[derive(Error, Debug, Clone)]
pub enum ErrorKind {
    /// The operation was cancelled by the user or the system
    #[error("operation cancelled")]
    Cancelled,

    /// The server answered with a non-success status
    #[error("server rejected the request with status {status_code}")]
    ServerRejected {
        /// HTTP status code
        status_code: u16,
        /// Message extracted from a structured error payload, if any
        message: Option<String>,
    },

    /// The request never produced a usable response (includes timeouts)
    #[error("transport failure: {cause}")]
    Transport {
        /// Underlying failure
        #[source]
        cause: Cause,
    },

    /// The response arrived but could not be parsed
    #[error("malformed response: {cause}")]
    Decoding {
        /// Underlying parse failure
        #[source]
        cause: Cause,
    },
}

impl ErrorKind {
    /// Whether this failure is a cancellation that must be swallowed
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Status code of a server rejection
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::ServerRejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Text to show the user, `None` for cancellations.
    ///
    /// Decoding failures are displayed like transport failures.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Cancelled => None,
            Self::ServerRejected {
                status_code,
                message,
            } => Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("server error {status_code}")),
            ),
            Self::Transport { .. } | Self::Decoding { .. } => {
                Some(NETWORK_FAILURE_MESSAGE.to_string())
            },
        }
    }
}

/// Marker error a transport can use to report that a request was abandoned
/// because its caller cancelled it.
#[derive(Error, Debug, Clone, Copy, Default)]
#[error("request cancelled")]
pub struct CancelledError;

// Both keys may be present (`{"error": "Bad Request", "message": ..}`)
#[derive(Deserialize)]
struct ServerErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Map a raw transport failure into an [`ErrorKind`].
///
/// Rules, first match wins:
/// 1. cancellation signal → `Cancelled`
/// 2. status code present → `ServerRejected` (message from `{"message": ..}`
///    or `{"error": ..}` payloads)
/// 3. payload parsing failure → `Decoding`
/// 4. anything else → `Transport`
#[must_use]
pub fn classify(failure: TransportFailure) -> ErrorKind {
    match failure {
        TransportFailure::Cancelled => ErrorKind::Cancelled,
        TransportFailure::Io(cause) if is_cancellation(&cause) => ErrorKind::Cancelled,
        TransportFailure::Status { status_code, body } => ErrorKind::ServerRejected {
            status_code,
            message: body.as_deref().and_then(server_message),
        },
        TransportFailure::Decode(cause) => ErrorKind::Decoding { cause },
        TransportFailure::Io(cause) if is_parse_failure(&cause) => ErrorKind::Decoding { cause },
        TransportFailure::Io(cause) => ErrorKind::Transport { cause },
    }
}

/// Classify a local decode failure of an otherwise successful response
#[must_use]
pub fn classify_decode(error: serde_json::Error) -> ErrorKind {
    classify(TransportFailure::Decode(Arc::new(error)))
}

fn is_cancellation(cause: &Cause) -> bool {
    cause.downcast_ref::<CancelledError>().is_some()
}

fn is_parse_failure(cause: &Cause) -> bool {
    cause.downcast_ref::<serde_json::Error>().is_some()
}

fn server_message(body: &str) -> Option<String> {
    let parsed: ServerErrorBody = serde_json::from_str(body).ok()?;
    [parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find(|message| !message.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_failure(message: &str) -> TransportFailure {
        TransportFailure::Io(Arc::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            message.to_string(),
        )))
    }

    #[test]
    fn cancellation_wins() {
        assert!(classify(TransportFailure::Cancelled).is_cancelled());
        assert!(classify(TransportFailure::Io(Arc::new(CancelledError))).is_cancelled());
    }

    #[test]
    fn status_with_structured_message() {
        let kind = classify(TransportFailure::Status {
            status_code: 409,
            body: Some(r#"{"error":"slot already booked"}"#.to_string()),
        });

        assert_eq!(kind.status_code(), Some(409));
        assert_eq!(kind.user_message().as_deref(), Some("slot already booked"));
    }

    #[test]
    fn status_with_message_field() {
        let kind = classify(TransportFailure::Status {
            status_code: 422,
            body: Some(r#"{"message":"price must be positive"}"#.to_string()),
        });

        assert_eq!(kind.user_message().as_deref(), Some("price must be positive"));
    }

    #[test]
    fn message_field_wins_over_error_field() {
        let kind = classify(TransportFailure::Status {
            status_code: 400,
            body: Some(r#"{"timestamp":"2026-01-10T09:00:00","status":400,"error":"Bad Request","message":"out of stock"}"#.to_string()),
        });

        assert_eq!(kind.user_message().as_deref(), Some("out of stock"));

        let kind = classify(TransportFailure::Status {
            status_code: 400,
            body: Some(r#"{"error":"Bad Request","message":""}"#.to_string()),
        });
        assert_eq!(kind.user_message().as_deref(), Some("Bad Request"));
    }

    #[test]
    fn status_with_unstructured_payload_uses_generic_text() {
        for body in [None, Some("<html>oops</html>"), Some(r#"{"error":"  "}"#)] {
            let kind = classify(TransportFailure::Status {
                status_code: 500,
                body: body.map(str::to_string),
            });

            assert!(matches!(kind, ErrorKind::ServerRejected { message: None, .. }));
            assert_eq!(kind.user_message().as_deref(), Some("server error 500"));
        }
    }

    #[test]
    fn decode_failures_are_kept_distinct_but_displayed_as_network() {
        let parse_error = serde_json::from_str::<u32>("nope").unwrap_err();
        let kind = classify_decode(parse_error);

        assert!(matches!(kind, ErrorKind::Decoding { .. }));
        assert_eq!(kind.user_message().as_deref(), Some(NETWORK_FAILURE_MESSAGE));

        let wrapped = serde_json::from_str::<u32>("nope").unwrap_err();
        let kind = classify(TransportFailure::Io(Arc::new(wrapped)));
        assert!(matches!(kind, ErrorKind::Decoding { .. }));
    }

    #[test]
    fn everything_else_is_transport() {
        let kind = classify(io_failure("timed out"));

        assert!(matches!(kind, ErrorKind::Transport { .. }));
        assert!(kind.to_string().contains("timed out"));
        assert_eq!(kind.user_message().as_deref(), Some(NETWORK_FAILURE_MESSAGE));
    }
}
