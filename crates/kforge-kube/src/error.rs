//! Error types for kforge-kube

use thiserror::Error;

/// Result type for kforge-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while planning or applying against a cluster
///
/// Failures of individual documents during apply are not errors; they are
/// recorded as outcomes in the [`crate::ApplyReport`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The build failed before anything was sent to the cluster
    #[error(transparent)]
    Build(#[from] kforge_core::CoreError),

    /// The user declined the planned changes
    #[error("apply declined, no changes were made")]
    Declined,

    /// Apply was cancelled by the caller
    #[error("apply cancelled")]
    Cancelled,

    /// One or more documents failed or were skipped during apply
    #[error("apply failed: {failed} of {total} documents did not apply")]
    ApplyFailed { failed: usize, total: usize },

    /// The cluster does not serve this apiVersion/kind
    #[error("unknown resource type {api_version}/{kind}\nHint: is the CustomResourceDefinition installed?")]
    UnknownResource { api_version: String, kind: String },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Confirmation prompt could not be shown
    #[error("confirmation failed: {0}")]
    Confirmation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }

    /// Declined or cancelled, as opposed to failed
    pub fn is_cancellation(&self) -> bool {
        matches!(self, KubeError::Declined | KubeError::Cancelled)
    }

    /// The wrapped build error, if this is one
    pub fn as_build_error(&self) -> Option<&kforge_core::CoreError> {
        match self {
            KubeError::Build(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_category() {
        assert!(KubeError::Declined.is_cancellation());
        assert!(KubeError::Cancelled.is_cancellation());
        assert!(!KubeError::ApplyFailed { failed: 1, total: 2 }.is_cancellation());
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err = KubeError::from(kforge_core::CoreError::DuplicateComponent {
            name: "app".to_string(),
        });
        assert_eq!(err.to_string(), "component 'app' is already registered");
        assert!(err.as_build_error().is_some_and(|e| e.is_configuration()));
    }
}
