//! Change planning: what apply would do to each document
//!
//! A desired document is compared with its live counterpart projected onto
//! the fields the desired document sets, plus the fields of the version
//! kforge last applied. Fields only the server populates (status, defaults,
//! managed fields) therefore never count as changes, while fields dropped
//! from the build do.

use std::fmt;

use kforge_core::canonical::canonicalize_value;
use kforge_core::{Annotatable, Document, DocumentGraph};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use similar::{ChangeTag, TextDiff};

use crate::cluster::ResourceRef;
use crate::error::Result;

/// Annotation holding the JSON of the document as kforge last applied it
pub const LAST_APPLIED_ANNOTATION: &str = "kforge.io/last-applied";

/// What apply will do with one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Live object already matches
    Unchanged,
    /// Object does not exist yet
    Create,
    /// Live object differs
    Update,
    /// Live object is absent from the generated set (pruning)
    Delete,
}

impl Action {
    /// Whether the action changes the cluster
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::Unchanged)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Unchanged => write!(f, "unchanged"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// One planned operation
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub resource: ResourceRef,
    pub action: Action,
    /// Desired state (absent for deletes)
    pub desired: Option<Document>,
    /// Live state, when the object exists
    pub live: Option<Document>,
    /// Line diff of the live object against the desired one, for updates
    pub diff: Option<DiffContent>,
    /// Why the live state could not be read; the document is reported as
    /// failed instead of being applied
    pub error: Option<String>,
}

impl PlannedChange {
    /// A document whose live state could not be read
    pub fn unreadable(desired: &Document, error: impl Into<String>) -> Self {
        Self {
            resource: ResourceRef::from_document(desired),
            action: Action::Unchanged,
            desired: Some(desired.clone()),
            live: None,
            diff: None,
            error: Some(error.into()),
        }
    }
}

/// Planned changes for a build
///
/// `changes[i]` corresponds to document `i` of the build output; pruned
/// objects follow in `deletes`, in deletion order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
    pub deletes: Vec<PlannedChange>,
    /// For each entry of `deletes`, the indices of entries deleted before it
    pub delete_dependencies: Vec<Vec<usize>>,
}

impl Plan {
    /// All planned changes, creates/updates first, then deletes
    pub fn iter(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().chain(self.deletes.iter())
    }

    /// Check whether applying would change anything
    pub fn has_mutations(&self) -> bool {
        self.iter().any(|c| c.action.is_mutation())
    }

    /// Count changes of one kind of action
    pub fn count(&self, action: Action) -> usize {
        self.iter()
            .filter(|c| c.action == action && c.error.is_none())
            .count()
    }

    /// Documents whose live state could not be read
    pub fn unreadable(&self) -> usize {
        self.iter().filter(|c| c.error.is_some()).count()
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(4);
        for (action, label) in [
            (Action::Create, "to create"),
            (Action::Update, "to update"),
            (Action::Delete, "to delete"),
            (Action::Unchanged, "unchanged"),
        ] {
            let count = self.count(action);
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        if self.unreadable() > 0 {
            parts.push(format!("{} unreadable", self.unreadable()));
        }
        if parts.is_empty() {
            "No resources".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Decide the action for a desired document given its live state
pub fn plan_change(
    desired: &Document,
    live: Option<Document>,
    context_lines: usize,
) -> Result<PlannedChange> {
    let resource = ResourceRef::from_document(desired);
    let Some(live) = live else {
        return Ok(PlannedChange {
            resource,
            action: Action::Create,
            desired: Some(desired.clone()),
            live: None,
            diff: None,
            error: None,
        });
    };

    let fields = match last_applied(&live) {
        Some(previous) => with_fields_of(desired.as_value(), &previous),
        None => desired.as_value().clone(),
    };
    let projected = canonicalize_value(project(live.as_value(), &fields));
    let wanted = canonicalize_value(desired.as_value().clone());

    let (action, diff) = if projected == wanted {
        (Action::Unchanged, None)
    } else {
        let diff = DiffContent::between(&to_yaml(&projected)?, &to_yaml(&wanted)?, context_lines);
        (Action::Update, Some(diff))
    };

    Ok(PlannedChange {
        resource,
        action,
        desired: Some(desired.clone()),
        live: Some(live),
        diff,
        error: None,
    })
}

/// Plan deletes for live objects, dependents first
///
/// Returns the changes in deletion order with, for each, the indices of the
/// changes that must be deleted before it.
pub fn plan_deletes(live: Vec<Document>) -> Result<(Vec<PlannedChange>, Vec<Vec<usize>>)> {
    let graph = DocumentGraph::new(&live);
    let mut order = graph.order()?;
    order.reverse();

    let mut position = vec![0; order.len()];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }

    // A document must be deleted after everything that depends on it
    let mut before: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
    for (old, _) in live.iter().enumerate() {
        for dep in graph.dependencies(old) {
            before[position[dep]].push(position[old]);
        }
    }
    for deps in &mut before {
        deps.sort_unstable();
    }

    let mut slots: Vec<Option<Document>> = live.into_iter().map(Some).collect();
    let changes = order
        .iter()
        .filter_map(|&old| slots[old].take())
        .map(|doc| PlannedChange {
            resource: ResourceRef::from_document(&doc),
            action: Action::Delete,
            desired: None,
            live: Some(doc),
            diff: None,
            error: None,
        })
        .collect();

    Ok((changes, before))
}

/// Restrict `live` to the fields present in `desired`
///
/// Sequences are compared element-wise; a length difference keeps the live
/// sequence whole so the mismatch is visible.
pub fn project(live: &JsonValue, desired: &JsonValue) -> JsonValue {
    match (live, desired) {
        (JsonValue::Object(live), JsonValue::Object(desired)) => {
            let mut projected = Map::new();
            for (key, wanted) in desired {
                if let Some(value) = live.get(key) {
                    projected.insert(key.clone(), project(value, wanted));
                }
            }
            JsonValue::Object(projected)
        }
        (JsonValue::Array(live), JsonValue::Array(desired)) if live.len() == desired.len() => {
            JsonValue::Array(
                live.iter()
                    .zip(desired)
                    .map(|(l, d)| project(l, d))
                    .collect(),
            )
        }
        (live, _) => live.clone(),
    }
}

/// Copy of `desired` carrying the [`LAST_APPLIED_ANNOTATION`]
pub fn with_last_applied(desired: &Document) -> Result<Document> {
    let mut stamped = desired.clone();
    stamped.remove_annotation(LAST_APPLIED_ANNOTATION);
    let applied = serde_json::to_string(stamped.as_value())?;
    stamped.set_annotation(LAST_APPLIED_ANNOTATION, applied);
    Ok(stamped)
}

/// The document as last applied, if the live object records it
fn last_applied(live: &Document) -> Option<JsonValue> {
    let raw = live.annotation(LAST_APPLIED_ANNOTATION)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(resource = %live.key(), error = %e, "ignoring unreadable {}", LAST_APPLIED_ANNOTATION);
            None
        }
    }
}

/// `desired` extended with the mapping keys only `previous` has
fn with_fields_of(desired: &JsonValue, previous: &JsonValue) -> JsonValue {
    match (desired, previous) {
        (JsonValue::Object(desired), JsonValue::Object(previous)) => {
            let mut merged = desired.clone();
            for (key, old) in previous {
                let value = match desired.get(key) {
                    Some(new) => with_fields_of(new, old),
                    None => old.clone(),
                };
                merged.insert(key.clone(), value);
            }
            JsonValue::Object(merged)
        }
        (desired, _) => desired.clone(),
    }
}

fn to_yaml(value: &JsonValue) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Detailed diff content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffContent {
    /// Lines of the diff
    pub lines: Vec<DiffLine>,
}

impl DiffContent {
    /// Line diff of two texts, keeping `context` unchanged lines around
    /// each change
    pub fn between(old: &str, new: &str, context: usize) -> Self {
        let diff = TextDiff::from_lines(old, new);
        let mut lines = Vec::new();

        for group in diff.grouped_ops(context) {
            for op in group {
                for change in diff.iter_changes(&op) {
                    let line_type = match change.tag() {
                        ChangeTag::Delete => LineType::Removed,
                        ChangeTag::Insert => LineType::Added,
                        ChangeTag::Equal => LineType::Context,
                    };

                    lines.push(DiffLine {
                        line_type,
                        content: change.value().trim_end().to_string(),
                        old_line_no: change.old_index(),
                        new_line_no: change.new_index(),
                    });
                }
            }
        }

        Self { lines }
    }

    /// Check if any line changed
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.line_type != LineType::Context)
    }

    /// Generate a unified diff string
    pub fn to_unified_diff(&self) -> String {
        let mut output = String::new();

        for line in &self.lines {
            let prefix = match line.line_type {
                LineType::Added => "+",
                LineType::Removed => "-",
                LineType::Context => " ",
            };
            output.push_str(prefix);
            output.push_str(&line.content);
            output.push('\n');
        }

        output
    }
}

/// A single line in a diff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffLine {
    /// Type of line
    pub line_type: LineType,

    /// Content of the line
    pub content: String,

    /// Line number in old version
    pub old_line_no: Option<usize>,

    /// Line number in new version
    pub new_line_no: Option<usize>,
}

/// Type of diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    /// Line was added
    Added,

    /// Line was removed
    Removed,

    /// Unchanged context line
    Context,
}
