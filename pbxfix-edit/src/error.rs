//! Error types for pbxfix-edit.
//!
//! This module defines error types that distinguish between:
//! - Structural failures (exit code 2): the document cannot be edited safely as asked
//! - Runtime errors (exit code 1): I/O errors, configuration errors, invalid arguments

use thiserror::Error;

/// Structural problems found while loading or editing a project document.
///
/// Every variant aborts the whole batch; nothing is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Section delimiters are missing or unbalanced, or a record cannot be tokenised.
    #[error("malformed document: {message}")]
    MalformedDocument { message: String },

    /// A section the edit needs does not exist.
    #[error("section not found: {name}")]
    SectionNotFound { name: String },

    /// An insertion anchor occurs zero times or more than once.
    #[error("anchor {anchor:?} matched {matches} times; expected exactly one")]
    AnchorNotFound { anchor: String, matches: usize },

    /// An identifier is defined more than once, or a fresh one collides with one in use.
    #[error("duplicate identifier: {id}")]
    DuplicateIdentifier { id: String },

    /// A group, target or build phase the edit needs is missing or ambiguous.
    #[error("record not found: {what} ({matches} matches)")]
    RecordNotFound { what: String, matches: usize },
}

impl DocumentError {
    pub fn malformed(message: impl Into<String>) -> Self {
        DocumentError::MalformedDocument {
            message: message.into(),
        }
    }

    pub fn record_not_found(what: impl Into<String>, matches: usize) -> Self {
        DocumentError::RecordNotFound {
            what: what.into(),
            matches,
        }
    }
}

/// The top-level error type for pbxfix operations.
#[derive(Debug, Error)]
pub enum EditError {
    /// The project document could not be edited (exit code 2).
    #[error("structural failure: {0}")]
    Document(#[from] DocumentError),

    /// The project file changed between read and write (exit code 2).
    #[error("precondition mismatch: {message}")]
    PreconditionMismatch { message: String },

    /// A runtime/tool error occurred (exit code 1).
    #[error("runtime error: {0:#}")]
    Runtime(#[from] anyhow::Error),
}

impl EditError {
    /// Returns true if the failure is about the document rather than the environment.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EditError::Document(_) | EditError::PreconditionMismatch { .. }
        )
    }

    /// Returns the recommended exit code for this error.
    pub fn exit_code(&self) -> u8 {
        if self.is_structural() { 2 } else { 1 }
    }
}

/// Result type alias using EditError.
pub type EditResult<T> = Result<T, EditError>;
