//! Apply engine: reconcile a build with a live cluster
//!
//! Flow: build, plan (read-only), confirm, execute. Operations run
//! concurrently up to a bound but never ahead of their dependencies; a
//! document whose dependency did not apply is skipped. Pruned objects are
//! deleted afterwards, dependents first.
//!
//! A document whose live state cannot be read fails on its own. Instances
//! of a CRD from the same build are planned as creates while the cluster
//! does not know their type yet.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, FuturesUnordered, StreamExt, TryStreamExt};
use kforge_core::collector::{defined_crds, is_namespaced};
use kforge_core::{BuildOptions, BuildOutput, Builder, CrdRef, Document, DocumentKey};
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterClient, DEFAULT_NAMESPACE, ResourceRef};
use crate::confirm::{Confirmation, TerminalConfirmation};
use crate::error::{KubeError, Result};
use crate::plan::{Action, Plan, PlannedChange, plan_change, plan_deletes, with_last_applied};
use crate::progress::ProgressReporter;
use crate::report::{ApplyReport, Outcome, ReportEntry};

/// Default number of cluster operations in flight
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options for planning and applying
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Do not ask before mutating the cluster
    pub skip_confirmation: bool,
    /// Namespace for namespaced documents that do not set one
    pub namespace: Option<String>,
    /// Delete live objects matching this label selector that are not in
    /// the build
    pub prune_selector: Option<String>,
    /// Maximum number of operations in flight
    pub concurrency: usize,
    /// Unchanged lines shown around each change in update diffs
    pub diff_context: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            skip_confirmation: false,
            namespace: None,
            prune_selector: None,
            concurrency: DEFAULT_CONCURRENCY,
            diff_context: 3,
        }
    }
}

impl ApplyOptions {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            namespace: self.namespace.clone(),
        }
    }
}

/// Reconciles builds with a cluster
pub struct ApplyEngine {
    cluster: Arc<dyn ClusterClient>,
    confirmation: Box<dyn Confirmation>,
    progress: Option<ProgressReporter>,
}

impl ApplyEngine {
    /// Create an engine that confirms on the terminal
    pub fn new(cluster: impl ClusterClient + 'static) -> Self {
        Self::with_client(Arc::new(cluster))
    }

    /// Create from a shared client
    pub fn with_client(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            confirmation: Box::new(TerminalConfirmation),
            progress: None,
        }
    }

    /// Replace the confirmation strategy
    pub fn with_confirmation(mut self, confirmation: impl Confirmation + 'static) -> Self {
        self.confirmation = Box::new(confirmation);
        self
    }

    /// Report the plan and outcomes on stderr
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Build and plan without mutating anything
    pub async fn plan(&self, builder: &Builder, options: &ApplyOptions) -> Result<Plan> {
        let output = builder.build_with(&options.build_options())?;
        self.plan_output(&output, options).await
    }

    /// Plan a finished build
    pub async fn plan_output(&self, output: &BuildOutput, options: &ApplyOptions) -> Result<Plan> {
        let cluster = self.cluster.as_ref();
        let context = options.diff_context;
        let crds = defined_crds(output.iter());

        let changes: Vec<PlannedChange> = stream::iter(output.iter())
            .map(|doc| {
                let resource = live_ref(doc, &crds);
                async move {
                    match cluster.get(&resource).await {
                        Ok(live) => plan_change(doc, live, context),
                        Err(KubeError::UnknownResource { .. })
                            if doc.markers().requires_crd.is_some() =>
                        {
                            tracing::debug!(resource = %resource, "type not served yet, planning create");
                            plan_change(doc, None, context)
                        }
                        Err(e) => {
                            tracing::warn!(resource = %resource, error = %e, "cannot read live state");
                            Ok(PlannedChange::unreadable(doc, e.to_string()))
                        }
                    }
                }
            })
            .buffered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let (deletes, delete_dependencies) = match &options.prune_selector {
            Some(selector) => {
                let desired: HashSet<DocumentKey> = output
                    .iter()
                    .flat_map(|doc| [doc.key(), live_ref(doc, &crds).key()])
                    .collect();
                let stale: Vec<Document> = self
                    .cluster
                    .list(selector)
                    .await?
                    .into_iter()
                    .filter(|doc| !desired.contains(&doc.key()))
                    .collect();
                tracing::debug!(selector = %selector, count = stale.len(), "objects to prune");
                plan_deletes(stale)?
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(Plan {
            changes,
            deletes,
            delete_dependencies,
        })
    }

    /// Build, plan, confirm and apply
    ///
    /// Build errors abort before the cluster is contacted. Declining or
    /// cancelling before execution returns [`KubeError::Declined`] or
    /// [`KubeError::Cancelled`] with nothing mutated. Once execution starts
    /// the result is a report, including when cancelled midway.
    pub async fn apply(
        &self,
        builder: &Builder,
        options: &ApplyOptions,
        cancel: CancellationToken,
    ) -> Result<ApplyReport> {
        let output = builder.build_with(&options.build_options())?;
        self.apply_output(&output, options, cancel).await
    }

    /// Plan, confirm and apply a finished build
    pub async fn apply_output(
        &self,
        output: &BuildOutput,
        options: &ApplyOptions,
        cancel: CancellationToken,
    ) -> Result<ApplyReport> {
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KubeError::Cancelled),
            plan = self.plan_output(output, options) => plan?,
        };

        if let Some(progress) = &self.progress {
            progress.print_plan(&plan);
        }

        if !options.skip_confirmation && plan.has_mutations() {
            let approved = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(KubeError::Cancelled),
                approved = self.confirmation.confirm(&plan) => approved?,
            };
            if !approved {
                return Err(KubeError::Declined);
            }
        }

        self.execute(output, &plan, options, &cancel).await
    }

    async fn execute(
        &self,
        output: &BuildOutput,
        plan: &Plan,
        options: &ApplyOptions,
        cancel: &CancellationToken,
    ) -> Result<ApplyReport> {
        let dependencies: Vec<Vec<usize>> = (0..output.len())
            .map(|i| output.dependencies(i).to_vec())
            .collect();
        let concurrency = options.concurrency.max(1);

        let mut report = ApplyReport::default();
        let applied = self
            .run_ordered(&plan.changes, &dependencies, concurrency, cancel)
            .await;
        report.entries.extend(applied);

        let deleted = self
            .run_ordered(&plan.deletes, &plan.delete_dependencies, concurrency, cancel)
            .await;
        report.entries.extend(deleted);

        report.cancelled = cancel.is_cancelled()
            && report.entries.iter().any(|e| e.outcome == Outcome::Cancelled);

        if let Some(progress) = &self.progress {
            progress.print_summary(&report);
        }
        Ok(report)
    }

    /// Run changes honouring `dependencies`, which only point at earlier
    /// indices
    async fn run_ordered(
        &self,
        changes: &[PlannedChange],
        dependencies: &[Vec<usize>],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Vec<ReportEntry> {
        let cluster = self.cluster.as_ref();
        let mut outcomes: Vec<Option<Outcome>> = vec![None; changes.len()];
        let mut launched = vec![false; changes.len()];
        let mut in_flight = FuturesUnordered::new();
        let mut cancelled = cancel.is_cancelled();

        loop {
            if !cancelled {
                for i in 0..changes.len() {
                    if launched[i] || in_flight.len() >= concurrency {
                        continue;
                    }
                    let deps = dependencies.get(i).map(Vec::as_slice).unwrap_or_default();
                    if deps.iter().any(|&d| outcomes[d].is_none()) {
                        continue;
                    }

                    let change = &changes[i];
                    if let Some(&failed) = deps
                        .iter()
                        .find(|&&d| outcomes[d].as_ref().is_some_and(|o| !o.is_success()))
                    {
                        launched[i] = true;
                        self.finish(
                            &mut outcomes,
                            i,
                            change,
                            Outcome::SkippedDueToDependencyFailure {
                                dependency: changes[failed].resource.to_string(),
                            },
                        );
                        continue;
                    }
                    if let Some(error) = &change.error {
                        launched[i] = true;
                        self.finish(&mut outcomes, i, change, Outcome::Failed(error.clone()));
                        continue;
                    }
                    if change.action == Action::Unchanged {
                        launched[i] = true;
                        self.finish(&mut outcomes, i, change, Outcome::Unchanged);
                        continue;
                    }

                    launched[i] = true;
                    in_flight.push(async move { (i, run_change(cluster, change).await) });
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    tracing::warn!(in_flight = in_flight.len(), "cancelled, waiting for running operations");
                    cancelled = true;
                }
                Some((i, result)) = in_flight.next() => {
                    let change = &changes[i];
                    let outcome = match result {
                        Ok(()) => Outcome::succeeded(change.action),
                        Err(e) => {
                            tracing::warn!(resource = %change.resource, error = %e, "{} failed", change.action);
                            Outcome::Failed(e.to_string())
                        }
                    };
                    self.finish(&mut outcomes, i, change, outcome);
                }
                else => break,
            }
        }

        changes
            .iter()
            .zip(outcomes)
            .map(|(change, outcome)| ReportEntry {
                resource: change.resource.clone(),
                action: change.action,
                outcome: outcome.unwrap_or(Outcome::Cancelled),
            })
            .collect()
    }

    fn finish(
        &self,
        outcomes: &mut [Option<Outcome>],
        index: usize,
        change: &PlannedChange,
        outcome: Outcome,
    ) {
        if let Some(progress) = &self.progress {
            progress.outcome(&ReportEntry {
                resource: change.resource.clone(),
                action: change.action,
                outcome: outcome.clone(),
            });
        }
        outcomes[index] = Some(outcome);
    }
}

/// Where a document lives once applied: namespaced documents without a
/// namespace land in the default one
fn live_ref(doc: &Document, crds: &[CrdRef]) -> ResourceRef {
    let mut resource = ResourceRef::from_document(doc);
    if resource.namespace.is_none() && is_namespaced(doc, crds) {
        resource.namespace = Some(DEFAULT_NAMESPACE.to_string());
    }
    resource
}

async fn run_change(cluster: &dyn ClusterClient, change: &PlannedChange) -> Result<()> {
    tracing::info!(resource = %change.resource, "{}", change.action);
    match (change.action, change.desired.as_ref()) {
        (Action::Create, Some(doc)) => cluster.create(&with_last_applied(doc)?).await,
        (Action::Update, Some(doc)) => cluster.update(&with_last_applied(doc)?).await,
        (Action::Delete, _) => cluster.delete(&change.resource).await,
        _ => Ok(()),
    }
}
