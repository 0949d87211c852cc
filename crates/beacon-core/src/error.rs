//! Unified application error types for Beacon.
//!
//! Every crate maps its own failures into [`AppError`] so handlers and the
//! binary deal with one type. Each error carries a machine-readable code:
//! an explicit one attached at the mapping site, or the kind's own name.

use std::fmt;
use thiserror::Error;

/// Broad failure category; decides the HTTP status at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The requested resource does not exist.
    NotFound,
    /// Missing, invalid, or expired credentials.
    Authentication,
    /// Authenticated but not allowed.
    Authorization,
    /// Malformed or out-of-range input.
    Validation,
    /// The operation collides with current state.
    Conflict,
    /// Unexpected failure.
    Internal,
    /// Invalid or unloadable configuration.
    Configuration,
    /// Encoding or decoding failed.
    Serialization,
    /// Temporarily refusing work, for example while shutting down.
    ServiceUnavailable,
}

impl ErrorKind {
    /// Stable upper-case name, used as the fallback error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary error shared by all Beacon crates.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// Category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Explicit code such as `BAD_HEARTBEAT`; `None` falls back to the kind.
    pub code: Option<&'static str>,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// An error of `kind` with no code or cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// An error of `kind` wrapping `source`.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::new(kind, message)
        }
    }

    /// Attaches `code`, replacing any previous one.
    pub fn with_code(self, code: &'static str) -> Self {
        Self {
            code: Some(code),
            ..self
        }
    }

    /// Client-visible code.
    pub fn code(&self) -> &'static str {
        self.code.unwrap_or_else(|| self.kind.as_str())
    }

    /// `NotFound`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// `Authentication` with code `UNAUTHORIZED`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message).with_code("UNAUTHORIZED")
    }

    /// `Authorization` with code `FORBIDDEN`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message).with_code("FORBIDDEN")
    }

    /// `Validation`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// `Conflict`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// `Internal`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// `Configuration`.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// `ServiceUnavailable`.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }
}

/// Clones drop the source, which is not `Clone`.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            code: self.code,
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::Serialization, format!("JSON error: {err}"), err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_falls_back_to_kind() {
        let err = AppError::validation("bad input");
        assert_eq!(err.code(), "VALIDATION");

        let err = AppError::validation("bad input").with_code("BAD_HEARTBEAT");
        assert_eq!(err.code(), "BAD_HEARTBEAT");
    }

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::unauthorized("missing token");
        assert_eq!(err.to_string(), "AUTHENTICATION: missing token");
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_clone_keeps_code_and_drops_source() {
        let err = AppError::from(std::io::Error::other("boom")).with_code("DISK");
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.kind, ErrorKind::Internal);
        assert_eq!(cloned.code(), "DISK");
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let json = serde_json::to_string(&ErrorKind::ServiceUnavailable).unwrap();
        assert_eq!(json, "\"SERVICE_UNAVAILABLE\"");
    }
}
