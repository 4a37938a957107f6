//! Project file (`kforge.yaml`) loading
//!
//! ```yaml
//! cluster:
//!   clusterVersion: "1.30"
//!   distribution: k3s
//!   environment: staging
//! namespace: shop
//! components:
//!   - name: crds
//!     manifests: [crds/]
//!   - name: app
//!     dependsOn: [crds]
//!     manifests: [app/deployment.yaml, app/service.yaml]
//! ```

use std::path::{Path, PathBuf};

use kforge_core::{Builder, ClusterContext, EnvironmentType, ManifestComponent};
use serde::Deserialize;

use crate::error::{CliError, Result};

/// Default project file name
pub const PROJECT_FILE: &str = "kforge.yaml";

/// A kforge project
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Project {
    /// Target cluster
    #[serde(default)]
    pub cluster: ClusterContext,

    /// Namespace for namespaced documents that do not set one
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub components: Vec<ComponentSpec>,

    /// Directory manifest paths are relative to
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Data-driven component: a set of manifest files
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentSpec {
    pub name: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Files or directories (walked recursively for .yaml/.yml files)
    #[serde(default)]
    pub manifests: Vec<PathBuf>,
}

/// Cluster context overrides from flags or environment
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub cluster_version: Option<String>,
    pub distribution: Option<String>,
    pub environment: Option<EnvironmentType>,
}

impl Project {
    /// Load a project file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config_with_help(
                format!("cannot read project file {}: {}", path.display(), e),
                format!("create a {} or pass --project", PROJECT_FILE),
            )
        })?;

        let mut project: Project = serde_yaml::from_str(&content).map_err(|e| {
            CliError::config(format!("invalid project file {}: {}", path.display(), e))
        })?;
        project.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        tracing::debug!(
            path = %path.display(),
            components = project.components.len(),
            "loaded project"
        );
        Ok(project)
    }

    /// Apply cluster context overrides
    pub fn with_overrides(mut self, overrides: &ContextOverrides) -> Self {
        if let Some(version) = &overrides.cluster_version {
            self.cluster.cluster_version = version.clone();
        }
        if let Some(distribution) = &overrides.distribution {
            self.cluster.distribution = distribution.clone();
        }
        if let Some(environment) = overrides.environment {
            self.cluster.environment = environment;
        }
        self
    }

    /// Create a builder with one manifest component per project component
    pub fn builder(&self) -> Result<Builder> {
        let mut builder = Builder::new(self.cluster.clone());

        for spec in &self.components {
            let mut component = ManifestComponent::new(spec.name.as_str());
            for path in &spec.manifests {
                for file in self.manifest_files(&spec.name, path)? {
                    component = component.with_file(file);
                }
            }
            for dependency in &spec.depends_on {
                component = component.depends_on(dependency.as_str());
            }
            builder.add_component(component)?;
        }

        Ok(builder)
    }

    fn manifest_files(&self, component: &str, path: &Path) -> Result<Vec<PathBuf>> {
        let full = self.base_dir.join(path);
        if full.is_file() {
            return Ok(vec![full]);
        }
        if !full.is_dir() {
            return Err(CliError::config(format!(
                "component '{}': manifest path {} does not exist",
                component,
                full.display()
            )));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&full)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if matches!(ext.as_str(), "yaml" | "yml") {
                        files.push(path.to_path_buf());
                    }
                }
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, path: &str, content: &str) {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    #[test]
    fn test_load_project() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            PROJECT_FILE,
            "cluster:\n  clusterVersion: '1.29'\n  environment: production\nnamespace: shop\ncomponents:\n  - name: app\n    dependsOn: [base]\n    manifests: [app.yaml]\n",
        );

        let project = Project::load(&dir.path().join(PROJECT_FILE)).unwrap();
        assert_eq!(project.cluster.cluster_version, "1.29");
        assert_eq!(project.cluster.distribution, "kubernetes");
        assert!(project.cluster.is_production());
        assert_eq!(project.namespace.as_deref(), Some("shop"));
        assert_eq!(project.components[0].depends_on, vec!["base"]);
        assert_eq!(project.base_dir, dir.path());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), PROJECT_FILE, "componnets: []\n");

        let err = Project::load(&dir.path().join(PROJECT_FILE)).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_overrides() {
        let project = Project {
            cluster: ClusterContext::default(),
            namespace: None,
            components: Vec::new(),
            base_dir: PathBuf::new(),
        }
        .with_overrides(&ContextOverrides {
            cluster_version: Some("v1.25.3".to_string()),
            distribution: None,
            environment: Some(EnvironmentType::Test),
        });

        assert_eq!(project.cluster.cluster_version, "v1.25.3");
        assert_eq!(project.cluster.distribution, "kubernetes");
        assert_eq!(project.cluster.environment, EnvironmentType::Test);
    }

    #[test]
    fn test_builder_walks_directories() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "base/b.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata: {name: b, namespace: shop}\n",
        );
        write(
            dir.path(),
            "base/nested/a.yml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata: {name: a, namespace: shop}\n",
        );
        write(dir.path(), "base/README.md", "not a manifest");
        write(
            dir.path(),
            PROJECT_FILE,
            "components:\n  - name: base\n    manifests: [base]\n",
        );

        let project = Project::load(&dir.path().join(PROJECT_FILE)).unwrap();
        let output = project.builder().unwrap().build().unwrap();
        let keys: Vec<String> = output.iter().map(|d| d.key().to_string()).collect();
        assert_eq!(
            keys,
            vec!["Namespace/shop", "shop/ConfigMap/a", "shop/ConfigMap/b"]
        );
    }

    #[test]
    fn test_missing_manifest_path() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            PROJECT_FILE,
            "components:\n  - name: app\n    manifests: [missing.yaml]\n",
        );

        let project = Project::load(&dir.path().join(PROJECT_FILE)).unwrap();
        let err = project.builder().unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
