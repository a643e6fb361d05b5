//! Backend response envelope and request-failure classification
//!
//! The backend wraps payloads as `{"success": bool, "message": str, "data": T}`.
//! Decoding goes through one explicit schema and fails loudly on mismatch;
//! nothing here guesses at alternative shapes.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when the backend rejects a call without explaining why
pub const DEFAULT_REJECTION_MESSAGE: &str = "operation failed";

/// Errors raised while unwrapping a response envelope
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Backend answered with `success: false`
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Envelope did not carry a `data` payload
    #[error("response envelope has no data")]
    MissingData,

    /// Body did not match the envelope schema
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Standard response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Absent on endpoints that only signal failure explicitly
    pub success: Option<bool>,
    /// Human-readable outcome, mainly set on failures
    pub message: Option<String>,
    /// Payload of a successful call
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning `success: false` into an error
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        if self.success == Some(false) {
            let message = self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
            return Err(EnvelopeError::Rejected(message));
        }
        self.data.ok_or(EnvelopeError::MissingData)
    }
}

/// Decode a JSON body into its envelope and unwrap the payload
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, EnvelopeError> {
    let envelope: ApiEnvelope<T> = serde_json::from_slice(body)?;
    envelope.into_result()
}

/// Transport profile a request was issued under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestProfile {
    /// Ordinary reads and writes
    #[default]
    Standard,
    /// Long-running crawl triggers
    Crawl,
}

impl RequestProfile {
    /// Client-side timeout for requests under this profile
    pub fn timeout(self) -> Duration {
        match self {
            RequestProfile::Standard => Duration::from_secs(30),
            RequestProfile::Crawl => Duration::from_secs(120),
        }
    }
}

/// Why a request failed before a usable envelope came back.
///
/// Status variants keep whatever message the server put in the body; only
/// some user-facing texts show it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// 400, with the server's explanation if it gave one
    #[error("bad request: {}", .0.as_deref().unwrap_or("invalid request parameters"))]
    BadRequest(Option<String>),
    /// 401
    #[error("unauthorized")]
    Unauthorized(Option<String>),
    /// 403
    #[error("forbidden")]
    Forbidden(Option<String>),
    /// 404
    #[error("not found")]
    NotFound(Option<String>),
    /// 500; its body is never shown to the user
    #[error("internal server error")]
    ServerError,
    /// 502
    #[error("bad gateway")]
    BadGateway(Option<String>),
    /// 503
    #[error("service unavailable")]
    Unavailable(Option<String>),
    /// Any other error status
    #[error("unexpected status {code}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Server-provided message, if any
        message: Option<String>,
    },
    /// Sent, but no response arrived within the profile's timeout
    #[error("request timed out")]
    Timeout,
    /// Sent, but no response arrived at all
    #[error("connection failed")]
    Connection,
    /// The request could not be issued in the first place
    #[error("request not sent: {}", .0.as_deref().unwrap_or("unknown error"))]
    Other(Option<String>),
}

impl RequestFailure {
    /// Classify an HTTP error status, keeping the server's message where it is shown
    pub fn from_status(code: u16, message: Option<String>) -> Self {
        match code {
            400 => RequestFailure::BadRequest(message),
            401 => RequestFailure::Unauthorized(message),
            403 => RequestFailure::Forbidden(message),
            404 => RequestFailure::NotFound(message),
            500 => RequestFailure::ServerError,
            502 => RequestFailure::BadGateway(message),
            503 => RequestFailure::Unavailable(message),
            code => RequestFailure::Status { code, message },
        }
    }

    /// Server-provided message carried by a status failure
    pub fn server_message(&self) -> Option<&str> {
        match self {
            RequestFailure::BadRequest(message)
            | RequestFailure::Unauthorized(message)
            | RequestFailure::Forbidden(message)
            | RequestFailure::NotFound(message)
            | RequestFailure::BadGateway(message)
            | RequestFailure::Unavailable(message)
            | RequestFailure::Status { message, .. } => message.as_deref(),
            RequestFailure::ServerError
            | RequestFailure::Timeout
            | RequestFailure::Connection
            | RequestFailure::Other(_) => None,
        }
    }

    /// HTTP status behind this failure, if there was a response at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestFailure::BadRequest(_) => Some(400),
            RequestFailure::Unauthorized(_) => Some(401),
            RequestFailure::Forbidden(_) => Some(403),
            RequestFailure::NotFound(_) => Some(404),
            RequestFailure::ServerError => Some(500),
            RequestFailure::BadGateway(_) => Some(502),
            RequestFailure::Unavailable(_) => Some(503),
            RequestFailure::Status { code, .. } => Some(*code),
            RequestFailure::Timeout | RequestFailure::Connection | RequestFailure::Other(_) => None,
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestFailure::Timeout
                | RequestFailure::Connection
                | RequestFailure::ServerError
                | RequestFailure::BadGateway(_)
                | RequestFailure::Unavailable(_)
        )
    }

    /// Text to show the user for this failure
    pub fn user_message(&self, profile: RequestProfile) -> String {
        match profile {
            RequestProfile::Crawl => self.crawl_message(),
            RequestProfile::Standard => self.standard_message(),
        }
    }

    fn standard_message(&self) -> String {
        match self {
            RequestFailure::BadRequest(message) => message
                .clone()
                .unwrap_or_else(|| "Invalid request parameters".to_string()),
            RequestFailure::Unauthorized(_) => "Not authorized, please sign in again".to_string(),
            RequestFailure::Forbidden(_) => "You do not have permission to access this".to_string(),
            RequestFailure::NotFound(_) => "The requested resource does not exist".to_string(),
            RequestFailure::ServerError => "Internal server error".to_string(),
            RequestFailure::BadGateway(_) => "Gateway error".to_string(),
            RequestFailure::Unavailable(_) => "Service unavailable".to_string(),
            RequestFailure::Status { code, message } => message
                .clone()
                .unwrap_or_else(|| format!("Network error: {code}")),
            RequestFailure::Timeout => "Request timed out, check the network connection".to_string(),
            RequestFailure::Connection => {
                "Network connection failed, check that the backend is running".to_string()
            }
            RequestFailure::Other(message) => message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
    }

    fn crawl_message(&self) -> String {
        match self {
            RequestFailure::Timeout => {
                "Crawl is taking a while, check the results later in data management".to_string()
            }
            RequestFailure::Connection | RequestFailure::Other(_) => {
                "Could not reach the crawl service".to_string()
            }
            RequestFailure::ServerError => {
                "Crawl service is temporarily unavailable, try again later".to_string()
            }
            other => match (other.server_message(), other.status()) {
                (Some(message), _) => message.to_string(),
                (None, Some(code)) => format!("Crawl failed: {code}"),
                (None, None) => "Crawl failed".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Tag {
        name: String,
        heat: u32,
    }

    #[test]
    fn test_decode_success_payload() {
        let body = json!({"success": true, "data": [{"name": "music", "heat": 7}]}).to_string();
        let tags: Vec<Tag> = decode_envelope(body.as_bytes()).unwrap();

        assert_eq!(tags, vec![Tag { name: "music".into(), heat: 7 }]);
    }

    #[test]
    fn test_success_flag_is_optional() {
        let body = json!({"data": 3}).to_string();
        assert_eq!(decode_envelope::<u32>(body.as_bytes()).unwrap(), 3);
    }

    #[test]
    fn test_rejection_uses_server_message() {
        let body = json!({"success": false, "message": "crawl already running"}).to_string();
        let err = decode_envelope::<u32>(body.as_bytes()).unwrap_err();

        assert!(matches!(err, EnvelopeError::Rejected(ref m) if m == "crawl already running"));
    }

    #[test]
    fn test_rejection_without_message_uses_default() {
        let envelope: ApiEnvelope<u32> = ApiEnvelope {
            success: Some(false),
            message: Some("  ".into()),
            data: Some(1),
        };

        assert!(matches!(
            envelope.into_result(),
            Err(EnvelopeError::Rejected(ref m)) if m == DEFAULT_REJECTION_MESSAGE
        ));
    }

    #[test]
    fn test_missing_data_fails_loudly() {
        let body = json!({"success": true, "message": "ok"}).to_string();
        assert!(matches!(
            decode_envelope::<u32>(body.as_bytes()),
            Err(EnvelopeError::MissingData)
        ));
    }

    #[test]
    fn test_shape_mismatch_is_a_decode_error() {
        let body = json!({"success": true, "data": {"list": [1, 2]}}).to_string();
        assert!(matches!(
            decode_envelope::<Vec<u32>>(body.as_bytes()),
            Err(EnvelopeError::Decode(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(RequestFailure::from_status(401, None), RequestFailure::Unauthorized(None));
        assert_eq!(
            RequestFailure::from_status(503, Some("maintenance".into())),
            RequestFailure::Unavailable(Some("maintenance".into()))
        );
        assert_eq!(RequestFailure::from_status(500, Some("trace".into())), RequestFailure::ServerError);
        assert_eq!(
            RequestFailure::from_status(418, Some("teapot".into())),
            RequestFailure::Status { code: 418, message: Some("teapot".into()) }
        );
        assert_eq!(RequestFailure::from_status(404, None).status(), Some(404));
        assert_eq!(RequestFailure::Timeout.status(), None);
        assert_eq!(RequestFailure::Other(None).status(), None);
    }

    #[test]
    fn test_retryable_failures() {
        assert!(RequestFailure::Timeout.is_retryable());
        assert!(RequestFailure::from_status(502, None).is_retryable());
        assert!(!RequestFailure::from_status(400, None).is_retryable());
        assert!(!RequestFailure::Unauthorized(None).is_retryable());
        assert!(!RequestFailure::Other(None).is_retryable());
    }

    #[test]
    fn test_user_messages_depend_on_profile() {
        let server = RequestFailure::ServerError;
        assert_eq!(server.user_message(RequestProfile::Standard), "Internal server error");
        assert!(server.user_message(RequestProfile::Crawl).contains("temporarily unavailable"));

        let teapot = RequestFailure::from_status(418, None);
        assert_eq!(teapot.user_message(RequestProfile::Standard), "Network error: 418");
        assert_eq!(teapot.user_message(RequestProfile::Crawl), "Crawl failed: 418");

        let bad = RequestFailure::from_status(400, Some("limit too large".into()));
        assert_eq!(bad.user_message(RequestProfile::Standard), "limit too large");
    }

    #[test]
    fn test_crawl_messages_prefer_server_text() {
        let missing = RequestFailure::from_status(404, Some("tag not found".into()));
        assert_eq!(missing.user_message(RequestProfile::Crawl), "tag not found");
        assert_eq!(
            missing.user_message(RequestProfile::Standard),
            "The requested resource does not exist"
        );

        let down = RequestFailure::from_status(503, Some("maintenance".into()));
        assert_eq!(down.user_message(RequestProfile::Crawl), "maintenance");
        assert_eq!(down.user_message(RequestProfile::Standard), "Service unavailable");

        let silent = RequestFailure::from_status(503, None);
        assert_eq!(silent.user_message(RequestProfile::Crawl), "Crawl failed: 503");

        // 500 never surfaces the body
        let server = RequestFailure::from_status(500, Some("stack trace".into()));
        assert!(server.user_message(RequestProfile::Crawl).contains("temporarily unavailable"));
    }

    #[test]
    fn test_unsent_request_messages() {
        let described = RequestFailure::Other(Some("invalid URL".into()));
        assert_eq!(described.user_message(RequestProfile::Standard), "invalid URL");
        assert_eq!(described.to_string(), "request not sent: invalid URL");

        let bare = RequestFailure::Other(None);
        assert_eq!(bare.user_message(RequestProfile::Standard), "Unknown error");
        assert_eq!(bare.user_message(RequestProfile::Crawl), "Could not reach the crawl service");
        assert_eq!(bare.to_string(), "request not sent: unknown error");
    }

    #[test]
    fn test_profile_timeouts() {
        assert_eq!(RequestProfile::Standard.timeout(), Duration::from_secs(30));
        assert_eq!(RequestProfile::Crawl.timeout(), Duration::from_secs(120));
    }
}
