//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of diagnostics, each with its
//! own exit code.

use kforge_core::{CoreError, ErrorKind};
use kforge_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Project file or component graph is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kforge::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Manifest text could not be parsed
    #[error("Parse error: {message}")]
    #[diagnostic(code(kforge::cli::parse))]
    Parse { message: String },

    /// Documents cannot be ordered
    #[error("Resolution error: {message}")]
    #[diagnostic(
        code(kforge::cli::resolution),
        help("remove one of the references (e.g. a kforge.io/depends-on annotation) to break the cycle")
    )]
    Resolution { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kforge::cli::io))]
    Io { message: String },

    /// Cluster unreachable or rejected requests
    #[error("Cluster error: {message}")]
    #[diagnostic(code(kforge::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Declined at the prompt or interrupted
    #[error("{message}")]
    #[diagnostic(code(kforge::cli::cancelled))]
    Cancelled { message: String },

    /// Anything else, e.g. a component's own failure
    #[error("{message}")]
    #[diagnostic(code(kforge::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Parse { .. } => exit_codes::PARSE_ERROR,
            CliError::Resolution { .. } => exit_codes::RESOLUTION_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Cancelled { .. } => exit_codes::CANCELLED,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => CliError::Config {
                message,
                help: None,
            },
            ErrorKind::Parse => CliError::Parse { message },
            ErrorKind::Resolution => CliError::Resolution { message },
            ErrorKind::Io => CliError::Io { message },
            ErrorKind::Document | ErrorKind::Component => CliError::Other { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Build(e) => e.into(),
            KubeError::Declined | KubeError::Cancelled => CliError::Cancelled {
                message: err.to_string(),
            },
            KubeError::UnknownResource { .. } => CliError::Cluster {
                message: err.to_string(),
                help: None,
            },
            KubeError::Api(_) => CliError::Cluster {
                message: err.to_string(),
                help: Some("check KUBECONFIG or the current kubectl context".to_string()),
            },
            other => CliError::Cluster {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
