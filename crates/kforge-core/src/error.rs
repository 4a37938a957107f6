//! Core error types

use thiserror::Error;

/// Broad category of a [`CoreError`]
///
/// Configuration, parse and resolution errors abort a build before any
/// cluster mutation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid component graph or conflicting document identities
    Configuration,
    /// Malformed raw manifest text
    Parse,
    /// Apply ordering cannot be computed
    Resolution,
    /// Invalid access to a single document
    Document,
    /// Failure raised by a component itself
    Component,
    /// Filesystem access
    Io,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: String },

    #[error("stage '{name}' is already registered")]
    DuplicateStage { name: String },

    #[error("component '{component}' depends on '{dependency}', which is not registered")]
    MissingDependency {
        component: String,
        dependency: String,
    },

    #[error("dependency cycle between components: {}", members.join(", "))]
    DependencyCycle { members: Vec<String> },

    #[error("duplicate document {key} (emitted by {source_name})")]
    DuplicateDocument { key: String, source_name: String },

    #[error("failed to parse manifest document {index} ({fragment}): {message}")]
    Parse {
        index: usize,
        fragment: String,
        message: String,
    },

    #[error("cannot order documents for apply, circular references between: {}", members.join(", "))]
    Resolution { members: Vec<String> },

    #[error("invalid property path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("field '{field}' is part of the document identity and cannot be changed")]
    ImmutableField { field: String },

    #[error("invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("component '{name}' failed: {message}")]
    Component { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::DuplicateComponent { .. }
            | CoreError::DuplicateStage { .. }
            | CoreError::MissingDependency { .. }
            | CoreError::DependencyCycle { .. }
            | CoreError::DuplicateDocument { .. } => ErrorKind::Configuration,
            CoreError::Parse { .. } => ErrorKind::Parse,
            CoreError::Resolution { .. } => ErrorKind::Resolution,
            CoreError::InvalidPath { .. }
            | CoreError::ImmutableField { .. }
            | CoreError::InvalidDocument { .. } => ErrorKind::Document,
            CoreError::Component { .. } => ErrorKind::Component,
            CoreError::Io(_) => ErrorKind::Io,
        }
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Create a component failure
    pub fn component(name: impl Into<String>, message: impl ToString) -> Self {
        CoreError::Component {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_document(message: impl Into<String>) -> Self {
        CoreError::InvalidDocument {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = CoreError::MissingDependency {
            component: "b".to_string(),
            dependency: "a".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.is_configuration());

        let err = CoreError::Parse {
            index: 0,
            fragment: "kind: [".to_string(),
            message: "unexpected end".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_cycle_message_names_members() {
        let err = CoreError::DependencyCycle {
            members: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "dependency cycle between components: a, b");
    }
}
