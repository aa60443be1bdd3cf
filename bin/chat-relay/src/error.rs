//! Unified relay error type.
//!
//! The relay handler returns `Result<Response, RelayError>`; the error side
//! implements [`axum::response::IntoResponse`] and renders an [`ErrorBody`]
//! with the matching status code. Only faults raised before the first body
//! byte can surface here; mid-stream faults end the body instead.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, error};

use crate::schemas::chat::ErrorBody;
use crate::upstream::UpstreamError;

/// Operational hint attached to every generic server error.
pub const CREDENTIAL_HINT: &str = "Check OPENAI_API_KEY is set correctly";

/// All errors that can end a relay request before streaming starts.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Anything other than `POST` or `OPTIONS`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// `messages` absent, not a list, or empty.
    #[error("Missing messages")]
    MissingMessages,

    /// The service answered but handed back nothing to read from.
    #[error("Failed to create stream")]
    StreamUnavailable,

    /// The completion service could not be reached or refused the call.
    #[error(transparent)]
    Upstream(UpstreamError),

    /// The request body is not JSON.
    #[error("invalid JSON body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// The request body could not be buffered: over the size limit, or the
    /// connection failed while reading it.
    #[error("unreadable request body: {0}")]
    UnreadableBody(#[from] BytesRejection),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::MissingMessages => StatusCode::BAD_REQUEST,
            RelayError::UnreadableBody(rejection) => rejection.status(),
            RelayError::StreamUnavailable
            | RelayError::Upstream(_)
            | RelayError::InvalidBody(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body sent to the caller.
    pub fn body(&self) -> ErrorBody {
        match self {
            RelayError::MethodNotAllowed
            | RelayError::MissingMessages
            | RelayError::StreamUnavailable => ErrorBody::new(self.to_string()),
            RelayError::UnreadableBody(rejection) => match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => ErrorBody::new("Request body too large"),
                _ => ErrorBody::new(rejection.body_text()),
            },
            RelayError::Upstream(_) | RelayError::InvalidBody(_) => ErrorBody {
                error: "Server error".to_owned(),
                details: Some(self.to_string()),
                hint: Some(CREDENTIAL_HINT.to_owned()),
            },
        }
    }
}

impl From<UpstreamError> for RelayError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::NoStream { content_type } => {
                error!(content_type = %content_type, "upstream response carried no stream");
                RelayError::StreamUnavailable
            }
            other => RelayError::Upstream(other),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "relay request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "relay request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn client_errors_have_bare_bodies() {
        assert_eq!(RelayError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(RelayError::MethodNotAllowed.body(), ErrorBody::new("Method not allowed"));
        assert_eq!(RelayError::MissingMessages.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::MissingMessages.body(), ErrorBody::new("Missing messages"));
    }

    #[test]
    fn missing_stream_maps_to_failed_to_create() {
        let err: RelayError = UpstreamError::NoStream { content_type: "application/json".into() }.into();
        assert!(matches!(err, RelayError::StreamUnavailable));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), ErrorBody::new("Failed to create stream"));
    }

    #[test]
    fn upstream_rejection_carries_details_and_hint() {
        let err: RelayError = UpstreamError::Status { status: 401, body: "bad key".into() }.into();
        let body = err.body();
        assert_eq!(body.error, "Server error");
        assert_eq!(body.details.as_deref(), Some("upstream returned 401: bad key"));
        assert_eq!(body.hint.as_deref(), Some(CREDENTIAL_HINT));
    }

    #[test]
    fn invalid_json_is_a_server_error() {
        let err: RelayError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().details.unwrap().starts_with("invalid JSON body"));
    }
}
