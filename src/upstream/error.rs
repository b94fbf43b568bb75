//! Upstream error classification.
//!
//! Every failure is placed in one of three classes:
//! - rate limit (429): retried, and weighted separately by the breaker
//! - transient (5xx, transport): retried, counted as a generic breaker failure
//! - terminal (other 4xx, undecodable payloads): surfaced immediately and
//!   left out of breaker accounting

use reqwest::StatusCode;
use thiserror::Error;

use crate::resilience::{FailureKind, Retryable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    Transient,
    Terminal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("upstream server error (status {status})")]
    Server { status: u16 },

    #[error("upstream rejected request (status {status})")]
    Client { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream timed out")]
    Timeout,

    #[error("invalid upstream payload: {0}")]
    Decode(String),

    #[error("circuit breaker open")]
    CircuitOpen,

    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Map a non-success HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => UpstreamError::RateLimited,
            s @ 500..=599 => UpstreamError::Server { status: s },
            s => UpstreamError::Client { status: s },
        }
    }

    /// Map a reqwest failure. The URL is stripped so query credentials never
    /// end up in logs.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        if err.is_decode() {
            return UpstreamError::Decode(err.to_string());
        }
        if err.is_timeout() {
            return UpstreamError::Timeout;
        }
        let detail = if err.is_connect() {
            "connect"
        } else if err.is_body() {
            "body"
        } else {
            "request"
        };
        UpstreamError::Transport(format!("{detail}: {err}"))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            UpstreamError::RateLimited => ErrorClass::RateLimit,
            UpstreamError::Server { .. }
            | UpstreamError::Transport(_)
            | UpstreamError::Timeout => ErrorClass::Transient,
            UpstreamError::Client { .. }
            | UpstreamError::Decode(_)
            | UpstreamError::CircuitOpen
            | UpstreamError::InvalidUrl(_) => ErrorClass::Terminal,
        }
    }

    /// How the breaker should weigh this error, if at all.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.class() {
            ErrorClass::RateLimit => Some(FailureKind::RateLimited),
            ErrorClass::Transient => Some(FailureKind::Generic),
            ErrorClass::Terminal => None,
        }
    }

    /// Short label for monitors and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            UpstreamError::RateLimited => "rate_limited",
            UpstreamError::Server { .. } => "server_error",
            UpstreamError::Client { .. } => "client_error",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Timeout => "timeout",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::CircuitOpen => "circuit_open",
            UpstreamError::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        !matches!(self.class(), ErrorClass::Terminal)
    }
}
