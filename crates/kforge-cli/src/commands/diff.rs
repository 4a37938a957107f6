//! Diff command - show what apply would change

use kforge_kube::{ApplyEngine, ApplyOptions, KubeCluster, ProgressReporter};

use super::ProjectArgs;
use crate::error::Result;
use crate::project::ContextOverrides;

pub async fn run(
    args: &ProjectArgs,
    overrides: &ContextOverrides,
    prune_selector: Option<String>,
) -> Result<()> {
    let project = args.load(overrides)?;
    let builder = project.builder()?;

    let options = ApplyOptions {
        namespace: args.namespace(&project),
        prune_selector,
        ..Default::default()
    };
    // Build before connecting so build errors do not need a cluster
    let output = builder.build_with(&options.build_options())?;

    let engine = ApplyEngine::new(KubeCluster::connect().await?);
    let plan = engine.plan_output(&output, &options).await?;

    ProgressReporter::new().verbose().print_plan(&plan);
    Ok(())
}
