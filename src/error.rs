//! Error types shared by the store, the HTTP client and the dashboard API.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Anything that can go wrong while talking to the fleet API.
///
/// The type is `Clone` so a single refresh failure can be handed to every
/// request that was parked behind it.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response was received (connection, DNS, timeout).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// The access token could not be renewed; the session is over.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Rejected before anything was sent.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
}

impl ApiError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ApiError::Transport {
            message: err.to_string(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Refresh(RefreshError::Endpoint { status, .. }) => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// The server's human readable reason (`detail` or `message` in a JSON body).
    pub fn detail(&self) -> Option<String> {
        let body = match self {
            ApiError::Http { body, .. } => body,
            ApiError::Refresh(RefreshError::Endpoint { body, .. }) => body,
            _ => return None,
        };
        let json: Value = serde_json::from_str(body).ok()?;
        ["detail", "message"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    }
}

/// Why the refresh protocol gave up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token")]
    MissingRefreshToken,

    #[error("no access in refresh response")]
    MissingAccess,

    #[error("refresh response carried an access token that cannot be sent as a header")]
    InvalidAccess,

    #[error("refresh endpoint returned {status}: {body}")]
    Endpoint { status: StatusCode, body: String },

    #[error("refresh request failed: {message}")]
    Transport { message: String },

    #[error("could not persist refreshed token: {message}")]
    Persist { message: String },

    #[error("session ended while the refresh was in flight")]
    SessionEnded,
}

/// Token persistence failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("token store I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("token store contents are not valid JSON: {message}")]
    Serde { message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_detail_then_message() {
        let err = ApiError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: r#"{"detail": "No active account found"}"#.to_string(),
        };
        assert_eq!(err.detail().as_deref(), Some("No active account found"));

        let err = ApiError::Http {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"message": "username taken"}"#.to_string(),
        };
        assert_eq!(err.detail().as_deref(), Some("username taken"));
    }

    #[test]
    fn detail_is_none_for_plain_bodies() {
        let err = ApiError::Http {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.detail(), None);
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn refresh_errors_keep_endpoint_status() {
        let err = ApiError::from(RefreshError::Endpoint {
            status: StatusCode::UNAUTHORIZED,
            body: "{}".to_string(),
        });
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(!err.is_unauthorized());
    }
}
