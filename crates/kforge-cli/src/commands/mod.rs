//! CLI commands

use std::path::PathBuf;

use clap::Args;

use crate::error::Result;
use crate::project::{ContextOverrides, PROJECT_FILE, Project};

pub mod apply;
pub mod build;
pub mod diff;

/// Arguments shared by every command
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project file
    #[arg(short, long, default_value = PROJECT_FILE, env = "KFORGE_PROJECT")]
    pub project: PathBuf,

    /// Namespace for namespaced documents that do not set one
    /// (overrides the project's namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,
}

impl ProjectArgs {
    /// Load the project with cluster context overrides applied
    pub fn load(&self, overrides: &ContextOverrides) -> Result<Project> {
        Ok(Project::load(&self.project)?.with_overrides(overrides))
    }

    /// Effective default namespace
    pub fn namespace(&self, project: &Project) -> Option<String> {
        self.namespace.clone().or_else(|| project.namespace.clone())
    }
}
