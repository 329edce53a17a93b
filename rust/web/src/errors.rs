//! Client-facing error bodies and HTTP status mapping.
//!
//! Rule violations are reported verbatim. Storage and catalog failures are
//! logged with their cause and answered with a generic message.
use crate::hub::HubError;
use crate::service::ServiceError;
use gemstone_engine::errors::{ErrorKind, GameError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// Standard error response format for all API endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "not_your_turn")
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (structured data)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    /// Convert to HTTP response with specified status code
    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Error classification for logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Client errors (4xx), expected during normal play
    Client,
    /// Server errors (5xx), need investigation
    Server,
    /// Game state may be inconsistent
    Critical,
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait IntoErrorResponse: fmt::Display {
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error code
    fn error_code(&self) -> &'static str;

    /// Message shown to the client
    fn error_message(&self) -> String;

    fn error_details(&self) -> Option<serde_json::Value> {
        None
    }

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        if let Some(details) = self.error_details() {
            ErrorResponse::with_details(self.error_code(), self.error_message(), details)
        } else {
            ErrorResponse::new(self.error_code(), self.error_message())
        }
    }

    /// Convert to HTTP response, logging the full cause
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let error_response = self.to_error_response();

        match self.severity() {
            ErrorSeverity::Client => {
                tracing::info!(
                    status = status.as_u16(),
                    error = %error_response.error,
                    "client error: {}",
                    error_response.message
                );
            }
            ErrorSeverity::Server => {
                tracing::error!(
                    status = status.as_u16(),
                    error = %error_response.error,
                    cause = %self,
                    "server error"
                );
            }
            ErrorSeverity::Critical => {
                tracing::error!(
                    status = status.as_u16(),
                    error = %error_response.error,
                    cause = %self,
                    critical = true,
                    "critical error"
                );
            }
        }

        error_response.into_response(status)
    }
}

impl IntoErrorResponse for GameError {
    fn status_code(&self) -> StatusCode {
        match self {
            GameError::NotYourTurn { .. }
            | GameError::WrongStatus { .. }
            | GameError::GameFull { .. }
            | GameError::AlreadyJoined { .. }
            | GameError::Conflict(_) => StatusCode::CONFLICT,
            GameError::NotGameCreator { .. } => StatusCode::FORBIDDEN,
            GameError::InvalidPlayerCount { .. } => StatusCode::BAD_REQUEST,
            _ => match self.kind() {
                ErrorKind::Precondition => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_code(&self) -> &'static str {
        self.code()
    }

    fn error_message(&self) -> String {
        match self {
            GameError::Conflict(_) => "The game changed concurrently, please retry".to_string(),
            _ if self.kind() == ErrorKind::Integrity => {
                "Internal error while processing the game".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            GameError::InsufficientBankSupply {
                gem,
                available,
                needed,
            } => Some(json!({ "gem": gem, "available": available, "needed": needed })),
            GameError::GemLimitExceeded {
                held,
                taking,
                limit,
            } => Some(json!({ "held": held, "taking": taking, "limit": limit })),
            GameError::CannotAfford {
                card,
                gold_needed,
                gold_held,
            } => Some(json!({
                "card_id": card,
                "gold_needed": gold_needed,
                "gold_held": gold_held,
            })),
            GameError::WrongStatus {
                status, expected, ..
            } => Some(json!({ "status": status, "expected": expected })),
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            GameError::Conflict(_) => ErrorSeverity::Client,
            GameError::AlreadyInitialized(_) => ErrorSeverity::Critical,
            _ if self.kind() == ErrorKind::Integrity => ErrorSeverity::Server,
            _ => ErrorSeverity::Client,
        }
    }
}

impl IntoErrorResponse for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Game(err) => err.status_code(),
            ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Join { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Hub(HubError::Stopped) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Game(err) => err.error_code(),
            ServiceError::Timeout { .. } => "storage_timeout",
            ServiceError::Join { .. } => "internal_error",
            ServiceError::Hub(_) => "hub_unavailable",
        }
    }

    fn error_message(&self) -> String {
        match self {
            ServiceError::Game(err) => err.error_message(),
            ServiceError::Timeout { .. } => {
                "The game store did not answer in time; the action may still be applied"
                    .to_string()
            }
            ServiceError::Join { .. } => "Internal error while processing the game".to_string(),
            ServiceError::Hub(_) => "Live updates are unavailable".to_string(),
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::Game(err) => err.error_details(),
            _ => None,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::Game(err) => err.severity(),
            _ => ErrorSeverity::Server,
        }
    }
}
