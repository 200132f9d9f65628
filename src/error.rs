// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the authenticated API client.
//!
//! Expected session failures (`Unauthorized`, `RefreshFailed`) are separate
//! variants from transport and HTTP failures so callers branch on them
//! explicitly; see [`ApiError::is_terminal`].

/// Transport-level failure: the exchange produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_decode() {
            NetworkError::MalformedBody(err.to_string())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// Why a token refresh did not produce a new access token.
///
/// `Clone` because every caller attached to one in-flight refresh receives
/// the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("refresh rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("refresh request failed: {0}")]
    Network(NetworkError),

    /// The session was logged out or replaced by a new login while the
    /// refresh was in flight.
    #[error("session ended during refresh")]
    SessionEnded,
}

/// Error returned by every client operation.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 401 that survived the single refresh-and-retry.
    #[error("Authentication required")]
    Unauthorized,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// True for failures that must end the session (the caller is expected
    /// to route them through `SessionController::logout`).
    ///
    /// `RefreshFailed(SessionEnded)` is not terminal: the session it refers
    /// to is already gone, and the store may hold a newer one.
    pub fn is_terminal(&self) -> bool {
        match self {
            ApiError::Unauthorized => true,
            ApiError::RefreshFailed(RefreshError::SessionEnded) => false,
            ApiError::RefreshFailed(_) => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }

    /// True if this error is a timeout on the primary request or refresh.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ApiError::Network(NetworkError::Timeout)
                | ApiError::RefreshFailed(RefreshError::Network(NetworkError::Timeout))
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.into())
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
