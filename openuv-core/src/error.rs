use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::session::TransportError;

/// Body marker the API uses once the daily request quota is spent.
pub const RATE_LIMIT_MARKER: &str = "Daily API quota exceeded";

/// Body marker the API uses for unknown access tokens.
pub const INVALID_API_KEY_MARKER: &str = "API Key not found";

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fieldless discriminant of [`Error`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidApiKey,
    RateLimitExceeded,
    ApiUnavailable,
    RequestFailed,
    Timeout,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The access token was rejected. Fix the key, retrying will not help.
    #[error("{message}")]
    InvalidApiKey { endpoint: String, message: String },

    /// The daily quota is spent.
    #[error("{message}")]
    RateLimitExceeded { endpoint: String, message: String },

    /// The status pre-check reported the service as down.
    #[error("{message}")]
    ApiUnavailable { endpoint: String, message: String },

    #[error("{message}")]
    RequestFailed {
        endpoint: String,
        message: String,
        status: Option<StatusCode>,
        /// Another attempt could succeed (transport hiccup, 5xx, 429).
        transient: bool,
        #[source]
        source: Option<BoxError>,
    },

    #[error("{message}")]
    Timeout {
        endpoint: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidApiKey { .. } => ErrorKind::InvalidApiKey,
            Error::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Error::ApiUnavailable { .. } => ErrorKind::ApiUnavailable,
            Error::RequestFailed { .. } => ErrorKind::RequestFailed,
            Error::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Endpoint the failed request was aimed at.
    pub fn endpoint(&self) -> &str {
        match self {
            Error::InvalidApiKey { endpoint, .. }
            | Error::RateLimitExceeded { endpoint, .. }
            | Error::ApiUnavailable { endpoint, .. }
            | Error::RequestFailed { endpoint, .. }
            | Error::Timeout { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RequestFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, transport errors, 5xx and 429 responses are transient.
    /// Everything else (bad key, spent quota, service down, other 4xx, requests
    /// that could not even be built) is not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::RequestFailed { transient, .. } => *transient,
            Error::InvalidApiKey { .. }
            | Error::RateLimitExceeded { .. }
            | Error::ApiUnavailable { .. } => false,
        }
    }

    pub(crate) fn api_unavailable(endpoint: &str) -> Self {
        Error::ApiUnavailable {
            endpoint: endpoint.to_string(),
            message: "The OpenUV API is unavailable".to_string(),
        }
    }

    pub(crate) fn request_failed(endpoint: &str, detail: impl std::fmt::Display) -> Self {
        Error::RequestFailed {
            endpoint: endpoint.to_string(),
            message: failure_message(endpoint, detail),
            status: None,
            transient: false,
            source: None,
        }
    }
}

fn failure_message(endpoint: &str, detail: impl std::fmt::Display) -> String {
    format!("Error requesting data from {endpoint}: {detail}")
}

/// Pull the human-readable error out of a response body.
///
/// The API answers failures with `{"error": "..."}`; anything else is used verbatim.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => truncate_body(body),
        },
        _ => truncate_body(body),
    }
}

/// Classify a completed HTTP exchange. `None` means the response is a success.
///
/// Body markers take precedence over the status code, so a 403 carrying the
/// quota marker is reported as [`Error::RateLimitExceeded`].
pub fn classify_response(endpoint: &str, status: StatusCode, body: &str) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    let detail = error_detail(body);
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        detail
    };

    let endpoint_owned = endpoint.to_string();
    let message = failure_message(endpoint, &detail);

    let mentions = |marker: &str| detail.contains(marker) || body.contains(marker);

    if mentions(RATE_LIMIT_MARKER) {
        return Some(Error::RateLimitExceeded {
            endpoint: endpoint_owned,
            message,
        });
    }

    if mentions(INVALID_API_KEY_MARKER)
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        return Some(Error::InvalidApiKey {
            endpoint: endpoint_owned,
            message,
        });
    }

    Some(Error::RequestFailed {
        endpoint: endpoint_owned,
        message,
        status: Some(status),
        transient: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        source: None,
    })
}

/// Classify a failure that happened before any response was read.
pub fn classify_transport(endpoint: &str, err: TransportError) -> Error {
    match err {
        TransportError::Timeout(source) => Error::Timeout {
            endpoint: endpoint.to_string(),
            message: failure_message(endpoint, "request timed out"),
            source,
        },
        TransportError::Other(source) => Error::RequestFailed {
            endpoint: endpoint.to_string(),
            message: failure_message(endpoint, &source),
            status: None,
            transient: true,
            source: Some(source),
        },
        TransportError::Invalid(source) => Error::RequestFailed {
            endpoint: endpoint.to_string(),
            message: failure_message(endpoint, &source),
            status: None,
            transient: false,
            source: Some(source),
        },
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
