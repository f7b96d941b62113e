//! Unified gateway error model and mapping helpers.
//! Every failure on a request path resolves to an HTTP status plus a transient
//! user-facing notification; nothing here is fatal to the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Unauthenticated { code: String, message: String },
    Unauthorized { code: String, message: String },
    NotFound { code: String, message: String },
    Network { code: String, message: String },
    Timeout { code: String, message: String },
    Upstream { code: String, message: String, status: u16 },
    Internal { code: String, message: String },
}

/// Toast-style notification surfaced to the portal user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: &'static str,
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Network { code, .. }
            | AppError::Timeout { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Network { message, .. }
            | AppError::Timeout { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn network<S: Into<String>>(code: S, msg: S) -> Self { AppError::Network { code: code.into(), message: msg.into() } }
    pub fn timeout<S: Into<String>>(code: S, msg: S) -> Self { AppError::Timeout { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(status: u16, msg: S) -> Self { AppError::Upstream { code: "upstream_error".into(), message: msg.into(), status } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Unauthenticated { .. } => 401,
            AppError::Unauthorized { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Network { .. } => 502,
            AppError::Timeout { .. } => 504,
            AppError::Upstream { status, .. } => *status,
            AppError::Internal { .. } => 500,
        }
    }

    /// Network failures, timeouts and 5xx upstream answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network { .. } | AppError::Timeout { .. } => true,
            AppError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The request never reached the backend, so replaying it cannot apply a mutation twice.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, AppError::Network { code, .. } if code == "connect_error")
    }

    pub fn notification(&self) -> Notification {
        let title = match self {
            AppError::Unauthenticated { .. } => "Session expired",
            AppError::Unauthorized { .. } => "Access denied",
            AppError::Network { .. } | AppError::Timeout { .. } => "Connection problem",
            _ => "Error",
        };
        Notification { title: title.to_string(), description: self.message().to_string(), variant: "destructive" }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(app) = err.downcast_ref::<AppError>() { return app.clone(); }
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::timeout("request_timeout", "Request timeout - please check your connection and try again");
        }
        if err.is_decode() {
            return AppError::Internal { code: "decode_error".into(), message: err.to_string() };
        }
        if err.is_connect() {
            return AppError::Network { code: "connect_error".into(), message: err.to_string() };
        }
        AppError::Network { code: "network_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
            "notification": self.notification(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::unauthenticated("no_session", "login").http_status(), 401);
        assert_eq!(AppError::unauthorized("forbidden", "no").http_status(), 403);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::network("network_error", "refused").http_status(), 502);
        assert_eq!(AppError::timeout("request_timeout", "slow").http_status(), 504);
        assert_eq!(AppError::upstream(422, "bad body").http_status(), 422);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn retry_classification() {
        assert!(AppError::network("n", "x").is_retryable());
        assert!(AppError::timeout("t", "x").is_retryable());
        assert!(AppError::upstream(503, "down").is_retryable());
        assert!(!AppError::upstream(404, "gone").is_retryable());
        assert!(!AppError::user("u", "x").is_retryable());
        assert!(AppError::network("connect_error", "refused").is_connect_failure());
        assert!(!AppError::network("network_error", "reset").is_connect_failure());
        assert!(!AppError::upstream(503, "down").is_connect_failure());
    }

    #[test]
    fn notification_carries_message() {
        let n = AppError::timeout("request_timeout", "too slow").notification();
        assert_eq!(n.title, "Connection problem");
        assert_eq!(n.description, "too slow");
        assert_eq!(n.variant, "destructive");
        assert_eq!(AppError::upstream(400, "Invalid email").notification().title, "Error");
    }

    #[test]
    fn anyhow_roundtrip_keeps_app_error() {
        let e: anyhow::Error = AppError::not_found("nf", "drive").into();
        let back: AppError = e.into();
        assert_eq!(back.http_status(), 404);
    }
}
