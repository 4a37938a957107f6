//! Apply command - reconcile the cluster with the project

use kforge_kube::{ApplyEngine, ApplyOptions, CancellationToken, KubeCluster, ProgressReporter};

use super::ProjectArgs;
use crate::error::Result;
use crate::project::ContextOverrides;

pub async fn run(
    args: &ProjectArgs,
    overrides: &ContextOverrides,
    yes: bool,
    prune_selector: Option<String>,
    concurrency: usize,
) -> Result<()> {
    let project = args.load(overrides)?;
    let builder = project.builder()?;

    let options = ApplyOptions {
        skip_confirmation: yes,
        namespace: args.namespace(&project),
        prune_selector,
        concurrency,
        ..Default::default()
    };
    // Build before connecting so build errors do not need a cluster
    let output = builder.build_with(&options.build_options())?;

    let engine =
        ApplyEngine::new(KubeCluster::connect().await?).with_progress(ProgressReporter::new());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling apply");
            on_interrupt.cancel();
        }
    });

    let report = engine.apply_output(&output, &options, cancel).await?;
    report.into_result()?;
    Ok(())
}
