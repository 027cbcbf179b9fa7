//! Shared constants for structured API errors and upstream error semantics.

use std::fmt;

pub const ERROR_TYPE_API: &str = "api_error";
pub const ERROR_TYPE_TIMEOUT: &str = "timeout_error";
pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";
pub const ERROR_TYPE_AUTHENTICATION: &str = "authentication_error";
pub const ERROR_TYPE_INSUFFICIENT_CREDITS: &str = "insufficient_credits";
pub const ERROR_TYPE_MODERATION: &str = "moderation_error";
pub const ERROR_TYPE_NOT_FOUND: &str = "not_found_error";
pub const ERROR_TYPE_TOO_LARGE: &str = "request_too_large";
pub const ERROR_TYPE_RATE_LIMIT: &str = "rate_limit_error";
pub const ERROR_TYPE_UPSTREAM: &str = "upstream_error";
pub const ERROR_TYPE_OVERLOADED: &str = "overloaded_error";
pub const ERROR_TYPE_UNKNOWN: &str = "unknown_error";
pub const ERROR_TYPE_SERVICE_UNAVAILABLE: &str = "service_unavailable_error";

pub const ERROR_CODE_INVALID_SIZE: &str = "invalid_size";
pub const ERROR_CODE_IMAGE_GENERATION_DISABLED: &str = "image_generation_disabled";

/// Classification of a non-2xx upstream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    InvalidRequest,
    Authentication,
    InsufficientCredits,
    Moderation,
    NotFound,
    Timeout,
    TooLarge,
    RateLimit,
    Upstream,
    Overloaded,
    Unknown,
}

impl UpstreamErrorKind {
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            402 => Self::InsufficientCredits,
            403 => Self::Moderation,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::TooLarge,
            429 => Self::RateLimit,
            500 | 502 => Self::Upstream,
            529 => Self::Overloaded,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => ERROR_TYPE_INVALID_REQUEST,
            Self::Authentication => ERROR_TYPE_AUTHENTICATION,
            Self::InsufficientCredits => ERROR_TYPE_INSUFFICIENT_CREDITS,
            Self::Moderation => ERROR_TYPE_MODERATION,
            Self::NotFound => ERROR_TYPE_NOT_FOUND,
            Self::Timeout => ERROR_TYPE_TIMEOUT,
            Self::TooLarge => ERROR_TYPE_TOO_LARGE,
            Self::RateLimit => ERROR_TYPE_RATE_LIMIT,
            Self::Upstream => ERROR_TYPE_UPSTREAM,
            Self::Overloaded => ERROR_TYPE_OVERLOADED,
            Self::Unknown => ERROR_TYPE_UNKNOWN,
        }
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
