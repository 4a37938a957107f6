//! Build command - render the project's manifests

use std::fs;
use std::path::Path;

use console::style;
use kforge_core::BuildOptions;

use super::ProjectArgs;
use crate::error::Result;
use crate::project::ContextOverrides;

pub fn run(args: &ProjectArgs, overrides: &ContextOverrides, output: Option<&Path>) -> Result<()> {
    let project = args.load(overrides)?;
    let builder = project.builder()?;

    let options = BuildOptions {
        namespace: args.namespace(&project),
    };
    let built = builder.build_with(&options)?;
    let rendered = built.render()?;

    match output {
        Some(path) => {
            fs::write(path, &rendered)?;
            eprintln!(
                "{} Wrote {} documents to {}",
                style("✓").green().bold(),
                built.len(),
                path.display()
            );
        }
        None => print!("{}", rendered),
    }

    Ok(())
}
