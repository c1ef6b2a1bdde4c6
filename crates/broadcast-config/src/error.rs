//! Error types for configuration compilation.

use thiserror::Error;

/// Errors that can occur while compiling a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A present field violates its type or range invariant.
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// The endpoint lacks a required URL or stream key.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

impl CompileError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending field path, if this is a field error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            Self::MissingCredential(_) => None,
        }
    }
}
