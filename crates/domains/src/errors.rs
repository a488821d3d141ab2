//! # DomainError
//!
//! Centralized error handling for the boardsmith ecosystem.
//! Maps domain-specific failures to actionable error types, and carries the
//! caller-facing payload (`PublicationError`) that never leaks internals.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::models::{BanNotice, Verdict};

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Board, Thread, Post)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Validation failure (e.g., post too long, missing upload)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The moderation gate refused the submission
    #[error("rejected ({verdict}): {reason}")]
    Rejected {
        verdict: Verdict,
        reason: String,
        ban: Option<BanNotice>,
    },

    /// Security/Auth failure (e.g., wrong post password, insufficient rank)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource already exists or is in the wrong state (e.g., duplicate board dir, locked thread)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Re-attaching an upload that already has an ID
    #[error("upload already processed")]
    AlreadyAttached,

    /// Database failure; the transaction was rolled back
    #[error("storage error: {0}")]
    Storage(String),

    /// Rendering or writing a generated page failed
    #[error("failed building {artifact}: {reason}")]
    Build { artifact: String, reason: String },

    /// Infrastructure failure (e.g., filesystem, thumbnailing)
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for boardsmith logic.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Error categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Moderation,
    Persistence,
    Build,
    AlreadyProcessed,
    NotFound,
    Unauthorized,
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        DomainError::NotFound(resource, id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::ValidationError(msg.into())
    }

    pub fn build(artifact: impl Into<String>, reason: impl fmt::Display) -> Self {
        DomainError::Build {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound(..) => ErrorKind::NotFound,
            DomainError::ValidationError(_) => ErrorKind::Validation,
            DomainError::Rejected { .. } => ErrorKind::Moderation,
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            DomainError::Conflict(_) => ErrorKind::Validation,
            DomainError::AlreadyAttached => ErrorKind::AlreadyProcessed,
            DomainError::Storage(_) | DomainError::Internal(_) => ErrorKind::Persistence,
            DomainError::Build { .. } => ErrorKind::Build,
        }
    }

    /// Message safe to show a visitor. Storage and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Storage(_) | DomainError::Internal(_) => {
                "Unable to save your post, please try again later".to_string()
            }
            DomainError::Build { .. } => "Your changes were saved but the pages could not be regenerated".to_string(),
            DomainError::Rejected { reason, .. } => reason.clone(),
            DomainError::ValidationError(msg) | DomainError::Conflict(msg) => msg.clone(),
            DomainError::Unauthorized(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Ordered field-name → value payload attached to caller-facing errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorContext(BTreeMap<&'static str, Value>);

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.0.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: &'static str, value: impl Into<Value>) {
        self.0.insert(field, value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the publication pipeline reports back to its caller.
#[derive(Debug, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct PublicationError {
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban: Option<BanNotice>,
    #[serde(skip_serializing_if = "ErrorContext::is_empty")]
    pub context: ErrorContext,
    #[serde(skip)]
    #[source]
    pub source: Option<DomainError>,
}

impl PublicationError {
    pub fn new(source: DomainError, context: ErrorContext) -> Self {
        let ban = match &source {
            DomainError::Rejected { ban, .. } => ban.clone(),
            _ => None,
        };
        Self {
            kind: source.kind(),
            message: source.public_message(),
            ban,
            context,
            source: Some(source),
        }
    }

    pub fn with_context(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.context.insert(field, value);
        self
    }

    /// JSON body for clients that asked for JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "error": self.message }))
    }
}

impl From<DomainError> for PublicationError {
    fn from(err: DomainError) -> Self {
        PublicationError::new(err, ErrorContext::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_do_not_leak_details() {
        let err = DomainError::Storage("UNIQUE constraint failed: uploads.post_id".into());
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(!err.public_message().contains("UNIQUE"));
    }

    #[test]
    fn publication_error_serializes_context() {
        let err = PublicationError::new(
            DomainError::validation("Message is too long"),
            ErrorContext::new().with("messageLength", 9000).with("boardid", 3),
        );
        let json = err.to_json();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["error"], "Message is too long");
        assert_eq!(json["context"]["boardid"], 3);
        assert!(json.get("ban").is_none());
    }

    #[test]
    fn rejection_carries_ban_notice() {
        let notice = BanNotice {
            ban_id: 7,
            board_id: None,
            reason: "spam".into(),
            expires_at: None,
            can_appeal: false,
        };
        let err = PublicationError::from(DomainError::Rejected {
            verdict: Verdict::RejectBanned,
            reason: "You are banned from posting".into(),
            ban: Some(notice.clone()),
        });
        assert_eq!(err.kind, ErrorKind::Moderation);
        assert_eq!(err.ban, Some(notice));
    }
}
