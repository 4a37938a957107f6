//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - project file, component graph or duplicate documents
pub const CONFIG_ERROR: i32 = 2;

/// Parse error - malformed manifest text
pub const PARSE_ERROR: i32 = 3;

/// Resolution error - documents cannot be ordered for apply
pub const RESOLUTION_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Cluster error - unreachable cluster or documents that failed to apply
pub const CLUSTER_ERROR: i32 = 6;

/// Cancelled or declined by the user (128 + SIGINT)
pub const CANCELLED: i32 = 130;
