//! Error types and result types for CouchDB client operations.
//!
//! Every fallible operation in this crate returns [`CouchResult<T>`]. Client-side validation
//! failures are produced before any request is sent; everything else is derived from the
//! server's HTTP status and JSON error body, or from the transport itself.

use http::StatusCode;
use serde_json::{Error as SerdeJsonError, Value};
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a CouchDB server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouchError {
    /// A client-side check failed (invalid database name, revision mismatch in the body,
    /// unknown parameter in strict mode). Never sent to the server.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The resource to be created already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// The write was rejected because the presented revision is stale or missing.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The server rejected the credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The credentials are valid but lack permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The request never produced an HTTP response (connection refused, TLS failure, ...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// Any other non-2xx status.
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The folded `error - reason` message, or the status text.
        message: String,
    },
    /// A 2xx response that lacks something the protocol requires (e.g. an ETag).
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Client options are incomplete or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A specialized `Result` type for CouchDB client operations.
pub type CouchResult<T> = Result<T, CouchError>;

impl CouchError {
    /// Builds the error for a non-2xx response.
    ///
    /// The message is `"<error> - <reason>"` when the body is a CouchDB error object,
    /// otherwise the canonical reason phrase of the status.
    ///
    /// A 412 is left as [`CouchError::UnexpectedStatus`] here, since CouchDB uses it for more
    /// than one precondition. Create operations map it to [`CouchError::AlreadyExists`]
    /// themselves.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = Self::status_message(status, body);

        match status {
            401 => CouchError::Unauthorized(message),
            403 => CouchError::Forbidden(message),
            404 => CouchError::NotFound(message),
            409 => CouchError::Conflict(message),
            _ => CouchError::UnexpectedStatus { status, message },
        }
    }

    /// The folded error message of a response, or its reason phrase.
    pub(crate) fn status_message(status: u16, body: &[u8]) -> String {
        Self::fold_message(body).unwrap_or_else(|| status_text(status).to_string())
    }

    fn fold_message(body: &[u8]) -> Option<String> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let error = value.get("error").and_then(Value::as_str);
        let reason = value.get("reason").and_then(Value::as_str);

        match (error, reason) {
            (Some(error), Some(reason)) => Some(format!("{error} - {reason}")),
            (Some(error), None) => Some(error.to_string()),
            (None, Some(reason)) => Some(reason.to_string()),
            (None, None) => None,
        }
    }

    /// Returns `true` for errors that were detected before anything was sent.
    pub fn is_client_side(&self) -> bool {
        matches!(self, CouchError::Validation(_) | CouchError::Configuration(_))
    }
}

impl From<SerdeJsonError> for CouchError {
    fn from(err: SerdeJsonError) -> Self {
        CouchError::Serialization(err.to_string())
    }
}

fn status_text(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unexpected Status")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_error_and_reason() {
        let body = br#"{"error":"conflict","reason":"Document update conflict."}"#;
        let err = CouchError::from_status(409, body);

        assert_eq!(err, CouchError::Conflict("conflict - Document update conflict.".into()));
        assert_eq!(err.to_string(), "Conflict: conflict - Document update conflict.");
    }

    #[test]
    fn maps_statuses_to_variants() {
        assert!(matches!(CouchError::from_status(401, b""), CouchError::Unauthorized(_)));
        assert!(matches!(CouchError::from_status(403, b""), CouchError::Forbidden(_)));
        assert!(matches!(CouchError::from_status(404, b""), CouchError::NotFound(_)));
        assert_eq!(
            CouchError::from_status(412, b""),
            CouchError::UnexpectedStatus {
                status: 412,
                message: "Precondition Failed".into()
            }
        );
        assert_eq!(
            CouchError::from_status(500, b"not json"),
            CouchError::UnexpectedStatus {
                status: 500,
                message: "Internal Server Error".into()
            }
        );
    }

    #[test]
    fn falls_back_to_status_text_without_error_fields() {
        let err = CouchError::from_status(404, br#"{"ok":false}"#);
        assert_eq!(err, CouchError::NotFound("Not Found".into()));
    }

    #[test]
    fn precondition_failures_keep_the_server_reason() {
        let body = br#"{"error":"missing_stub","reason":"Invalid attachment stub in doc for note.txt"}"#;

        assert_eq!(
            CouchError::from_status(412, body),
            CouchError::UnexpectedStatus {
                status: 412,
                message: "missing_stub - Invalid attachment stub in doc for note.txt".into()
            }
        );
    }

    #[test]
    fn unknown_codes_fall_back_to_generic_text() {
        assert_eq!(
            CouchError::from_status(599, b""),
            CouchError::UnexpectedStatus {
                status: 599,
                message: "Unexpected Status".into()
            }
        );
        assert_eq!(
            CouchError::from_status(503, b""),
            CouchError::UnexpectedStatus {
                status: 503,
                message: "Service Unavailable".into()
            }
        );
    }

    #[test]
    fn client_side_errors() {
        assert!(CouchError::Validation("bad".into()).is_client_side());
        assert!(!CouchError::Conflict("stale".into()).is_client_side());
    }
}
