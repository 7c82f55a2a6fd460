//! Domain error taxonomy.
//!
//! Mirrors §7 of the design: input, transport, protocol, parse, write,
//! and cancellation errors all collapse to a single enum so the task
//! manager can decide the terminal status without inspecting strings.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Malformed URL or a host with no registered parser.
    UnsupportedSite(String),
    /// DNS/TCP/TLS/proxy failure reaching the remote host.
    Transport(String),
    /// Non-2xx HTTP status from the remote host.
    Protocol(u16),
    /// Expected markup/JSON element missing from a response.
    Parse(String),
    /// Filesystem failure creating or writing a destination file.
    Write(String),
    /// The task or batch was cancelled; carries no message (cleared per §7).
    Cancelled,
    /// `successCount < total` after a batch completed.
    PartialSuccess { succeeded: usize, total: usize },
    /// Task/record lookup failed.
    NotFound(String),
    /// Malformed request at the façade boundary.
    InvalidRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedSite(host) => write!(f, "unsupported site type: {host}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(code) => write!(f, "http status error: {code}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Write(msg) => write!(f, "write error: {msg}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::PartialSuccess { succeeded, total } => {
                write!(f, "succeeded {succeeded} of {total}, failed {}", total - succeeded)
            }
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// True when the error should surface as a `cancelled` terminal status
    /// rather than `failed`, regardless of what produced it.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Transport(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Protocol(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::UnsupportedSite(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_SITE"),
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Transport(_) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
            Self::Protocol(_) => (StatusCode::BAD_GATEWAY, "PROTOCOL_ERROR"),
            Self::Parse(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PARSE_ERROR"),
            Self::Write(_) => (StatusCode::INTERNAL_SERVER_ERROR, "WRITE_ERROR"),
            Self::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
            Self::PartialSuccess { .. } => (StatusCode::OK, "PARTIAL_SUCCESS"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = ErrorBody { error: self.to_string(), code };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
