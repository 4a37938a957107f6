//! Per-document apply outcomes

use std::fmt;

use crate::cluster::ResourceRef;
use crate::error::{KubeError, Result};
use crate::plan::Action;

/// What happened to one document during apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Created,
    Updated,
    Deleted,
    /// The cluster rejected the operation
    Failed(String),
    /// Not attempted because a dependency did not apply
    SkippedDueToDependencyFailure { dependency: String },
    /// Not attempted because apply was cancelled
    Cancelled,
}

impl Outcome {
    /// The outcome of a successful operation for `action`
    pub fn succeeded(action: Action) -> Self {
        match action {
            Action::Unchanged => Outcome::Unchanged,
            Action::Create => Outcome::Created,
            Action::Update => Outcome::Updated,
            Action::Delete => Outcome::Deleted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Unchanged | Outcome::Created | Outcome::Updated | Outcome::Deleted
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unchanged => write!(f, "unchanged"),
            Outcome::Created => write!(f, "created"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Deleted => write!(f, "deleted"),
            Outcome::Failed(message) => write!(f, "failed: {}", message),
            Outcome::SkippedDueToDependencyFailure { dependency } => {
                write!(f, "skipped (dependency {} did not apply)", dependency)
            }
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one planned change
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub resource: ResourceRef,
    pub action: Action,
    pub outcome: Outcome,
}

/// Result of an apply run
///
/// Entries follow the plan: creates and updates in apply order, then
/// deletes in deletion order.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub entries: Vec<ReportEntry>,
    /// Apply was cancelled before every operation was launched
    pub cancelled: bool,
}

impl ApplyReport {
    /// Every document ended unchanged, created, updated or deleted
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.entries.iter().all(|e| e.outcome.is_success())
    }

    /// Entries that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success())
    }

    /// Outcome for a resource, if it was part of the plan
    pub fn outcome(&self, resource: &ResourceRef) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|e| &e.resource == resource)
            .map(|e| &e.outcome)
    }

    /// Count entries matching a predicate on their outcome
    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }

    /// Turn an unsuccessful report into an error
    pub fn into_result(self) -> Result<Self> {
        if self.cancelled {
            return Err(KubeError::Cancelled);
        }
        let failed = self.failures().count();
        if failed > 0 {
            return Err(KubeError::ApplyFailed {
                failed,
                total: self.entries.len(),
            });
        }
        Ok(self)
    }

    /// Generate a human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let counts = [
            ("created", self.count(|o| *o == Outcome::Created)),
            ("updated", self.count(|o| *o == Outcome::Updated)),
            ("deleted", self.count(|o| *o == Outcome::Deleted)),
            ("unchanged", self.count(|o| *o == Outcome::Unchanged)),
            ("failed", self.count(|o| matches!(o, Outcome::Failed(_)))),
            (
                "skipped",
                self.count(|o| matches!(o, Outcome::SkippedDueToDependencyFailure { .. })),
            ),
            ("cancelled", self.count(|o| *o == Outcome::Cancelled)),
        ];
        for (label, count) in counts {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}
