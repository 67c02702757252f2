//! Error types for logview
//!
//! Every layer gets its own `thiserror` enum; `ViewError` is the one that
//! reaches a caller and knows how to become an HTTP response.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Errors raised by the expiring cache.
///
/// `NotFound` and `Expired` are recoverable: callers treat them as "go fetch".
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key was present but its TTL has elapsed; the entry has been removed
    #[error("Key expired: {0}")]
    Expired(String),

    /// Stored payload could not be decoded into the requested type
    #[error("Could not decode value for {key}: {reason}")]
    Decode { key: String, reason: String },

    /// Value could not be serialized
    #[error("Could not encode value for {key}: {reason}")]
    Encode { key: String, reason: String },

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// TTL must be strictly positive
    #[error("Invalid TTL for {0}: must be greater than zero")]
    InvalidTtl(String),

    /// Encoded payload is over the per-entry budget
    #[error("Value for {key} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        key: String,
        size: usize,
        limit: usize,
    },
}

// == Token Error Enum ==
/// Errors raised by the token codec.
///
/// `Invalid` deliberately carries no detail about why a token was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("could not seal token")]
    Seal,
}

// == Upstream Error Enum ==
/// Errors reported by the upstream records API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The upstream has no more results for this query or cursor.
    #[error("no more results")]
    NoMoreResults,

    /// The upstream answered with an error status.
    #[error("upstream returned {status}: {message}")]
    Status {
        status: u16,
        code: Option<u32>,
        message: String,
    },

    /// The request never got a response.
    #[error("upstream transport error: {0}")]
    Transport(String),
}

/// Coarse classification of an upstream failure, used to pick a user-facing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamClass {
    BadRequest,
    NotFound,
    RateLimited,
    ServerError,
    Transport,
}

impl UpstreamError {
    /// Classifies this error by upstream status.
    pub fn classification(&self) -> UpstreamClass {
        match self {
            UpstreamError::NoMoreResults => UpstreamClass::NotFound,
            UpstreamError::Status { status, .. } => match status {
                404 => UpstreamClass::NotFound,
                429 => UpstreamClass::RateLimited,
                400..=499 => UpstreamClass::BadRequest,
                _ => UpstreamClass::ServerError,
            },
            UpstreamError::Transport(_) => UpstreamClass::Transport,
        }
    }
}

// == View Error Enum ==
/// Errors surfaced to the end of a request.
#[derive(Error, Debug)]
pub enum ViewError {
    /// Inbound opaque token could not be opened, or opened to something that
    /// is not a continuation cursor for the requested resource.
    #[error("Invalid token")]
    InvalidToken,

    /// The user's group may not view this resource.
    #[error("Access denied")]
    PermissionDenied,

    /// No known user is attached to the request.
    #[error("Unknown user")]
    Unauthenticated,

    /// Malformed request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream failure, classification preserved
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The upstream did not answer within the request deadline
    #[error("Upstream did not respond within {0:?}")]
    Timeout(Duration),

    /// Internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for ViewError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ViewError::InvalidToken,
            TokenError::Seal => ViewError::Internal(err.to_string()),
        }
    }
}

impl ViewError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ViewError::InvalidToken => StatusCode::BAD_REQUEST,
            ViewError::PermissionDenied => StatusCode::FORBIDDEN,
            ViewError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ViewError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ViewError::Upstream(err) => match err.classification() {
                UpstreamClass::BadRequest => StatusCode::BAD_REQUEST,
                UpstreamClass::NotFound => StatusCode::NOT_FOUND,
                UpstreamClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                UpstreamClass::ServerError | UpstreamClass::Transport => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ViewError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ViewError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result type for view and pager operations.
pub type Result<T> = std::result::Result<T, ViewError>;
