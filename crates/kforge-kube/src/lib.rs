//! kforge Kube - apply builds to a Kubernetes cluster
//!
//! This crate provides:
//! - **Cluster Client**: the `ClusterClient` seam, a `kube`-backed
//!   implementation and an in-memory `MockCluster`
//! - **Plan**: per-document create/update/unchanged/delete decisions with diffs
//! - **Apply Engine**: confirmation, dependency-ordered concurrent execution,
//!   cancellation and pruning
//! - **Progress Reporting**: plan and outcome output on stderr

pub mod client;
pub mod cluster;
pub mod confirm;
pub mod engine;
pub mod error;
pub mod mock;
pub mod plan;
pub mod progress;
pub mod report;

pub use client::KubeCluster;
pub use cluster::{ClusterClient, DEFAULT_NAMESPACE, ResourceRef};
pub use confirm::{AutoApprove, ConfirmFn, Confirmation, TerminalConfirmation};
pub use engine::{ApplyEngine, ApplyOptions, DEFAULT_CONCURRENCY};
pub use error::{KubeError, Result};
pub use mock::{MockCluster, OperationCounts};
pub use plan::{Action, DiffContent, LAST_APPLIED_ANNOTATION, Plan, PlannedChange, with_last_applied};
pub use progress::ProgressReporter;
pub use report::{ApplyReport, Outcome, ReportEntry};

pub use tokio_util::sync::CancellationToken;
