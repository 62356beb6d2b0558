use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for tollgate
#[derive(Debug, thiserror::Error)]
pub enum TollgateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Platform error during '{operation}': {message}")]
    Platform {
        operation: String,
        message: String,
        status: Option<u16>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_id: String,
}

impl TollgateError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn platform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Platform {
            operation: operation.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Errors the process cannot recover from.
    ///
    /// A failed snapshot write leaves memory and disk out of step, and a
    /// rejected bot token means no platform call can succeed. Both require a
    /// restart that reloads the last good snapshot.
    ///
    /// A `Platform` error is never fatal, whatever its status. Clients that
    /// authenticate with the bot token report a rejected token as
    /// `Unauthorized`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Unauthorized(_))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Platform { .. } => StatusCode::BAD_GATEWAY,
            Self::Storage(_)
            | Self::Config(_)
            | Self::Internal(_)
            | Self::Io(_)
            | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the relay.
    ///
    /// Client errors keep their text; server-side details stay in the logs.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::BadRequest(_) | Self::Unauthorized(_) => self.to_string(),
            Self::Platform { .. } => "Upstream platform error".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for TollgateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });
        (status, body).into_response()
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, TollgateError>;

impl From<serde_json::Error> for TollgateError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            TollgateError::BadRequest(format!("JSON error: {}", err))
        } else {
            TollgateError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for TollgateError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if status == Some(401) {
            return TollgateError::Unauthorized("Platform rejected the bot token".to_string());
        }

        let operation = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else {
            "request"
        };

        TollgateError::Platform {
            operation: operation.to_string(),
            message: err.to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TollgateError::platform("add_role", "missing permissions");
        assert_eq!(
            err.to_string(),
            "Platform error during 'add_role': missing permissions"
        );

        let err = TollgateError::storage("disk full");
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(TollgateError::storage("write failed").is_fatal());
        assert!(TollgateError::unauthorized("bad token").is_fatal());
        assert!(
            !TollgateError::Platform {
                operation: "fetch_attachment".to_string(),
                message: "HTTP 401".to_string(),
                status: Some(401),
            }
            .is_fatal()
        );

        assert!(!TollgateError::platform("remove_role", "unknown role").is_fatal());
        assert!(!TollgateError::bad_request("no attachment").is_fatal());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            TollgateError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TollgateError::platform("send_dm", "blocked").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            TollgateError::storage("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_safe_message_hides_internal_details() {
        let err = TollgateError::storage("/var/lib/tollgate/members.json: permission denied");
        assert_eq!(err.safe_message(), "Internal server error");

        let err = TollgateError::bad_request("unknown command");
        assert_eq!(err.safe_message(), "Bad request: unknown command");
    }

    #[test]
    fn test_json_error_is_bad_request() {
        let err: TollgateError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, TollgateError::BadRequest(_)));
    }
}
