//! Components: named units of manifest-producing logic
//!
//! A component declares the names of the components that must run before
//! it and, when executed, contributes documents through a [`BuildContext`].

use std::path::{Path, PathBuf};

use crate::context::ClusterContext;
use crate::document::{Document, DocumentKey};
use crate::error::{CoreError, Result};
use crate::manifest;
use crate::set::DocumentSet;

/// A unit of manifest-producing logic
pub trait Component: Send + Sync {
    /// Unique name within a builder
    fn name(&self) -> &str;

    /// Names of components that must execute first
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Contribute documents to the build
    ///
    /// Called exactly once per build, after every dependency has run.
    fn execute(&self, ctx: &mut BuildContext<'_>) -> Result<()>;
}

/// View of the builder handed to a running component
///
/// Components may append documents and read what earlier components
/// produced; they cannot add or remove components.
pub struct BuildContext<'a> {
    cluster: &'a ClusterContext,
    components: &'a [String],
    documents: &'a mut DocumentSet,
    current: &'a str,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        cluster: &'a ClusterContext,
        components: &'a [String],
        documents: &'a mut DocumentSet,
        current: &'a str,
    ) -> Self {
        Self {
            cluster,
            components,
            documents,
            current,
        }
    }

    /// Target cluster identity
    pub fn cluster(&self) -> &ClusterContext {
        self.cluster
    }

    /// Name of the component being executed
    pub fn component_name(&self) -> &str {
        self.current
    }

    /// Append a document to the output set
    ///
    /// Fails if a document with the same identity was already emitted.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        self.documents.insert(document, self.current)
    }

    /// Parse a raw manifest and append every document in it
    ///
    /// Returns the number of documents added.
    pub fn add_manifest(&mut self, text: &str) -> Result<usize> {
        let documents = manifest::parse_documents(text)?;
        let count = documents.len();
        for document in documents {
            self.add_document(document)?;
        }
        Ok(count)
    }

    /// Documents emitted so far, in emission order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn document(&self, key: &DocumentKey) -> Option<&Document> {
        self.documents.get(key)
    }

    /// Names of all active components, in registration order
    pub fn components(&self) -> &[String] {
        self.components
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.iter().any(|c| c == name)
    }
}

/// Component backed by a closure
///
/// ```
/// use kforge_core::{Document, FnComponent};
///
/// let app = FnComponent::new("app", |ctx| {
///     ctx.add_document(Document::new("v1", "ConfigMap", "settings").with_namespace("shop"))
/// })
/// .depends_on("base");
/// ```
pub struct FnComponent<F> {
    name: String,
    dependencies: Vec<String>,
    action: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&mut BuildContext<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            action,
        }
    }

    /// Declare a dependency on another component
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&mut BuildContext<'_>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn execute(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        (self.action)(ctx)
    }
}

#[derive(Debug, Clone)]
enum ManifestSource {
    Text(String),
    File(PathBuf),
}

/// Component that emits the documents of raw manifests
///
/// Sources are read and parsed at execution time, so editing a manifest
/// file between two builds is picked up.
#[derive(Debug, Clone)]
pub struct ManifestComponent {
    name: String,
    dependencies: Vec<String>,
    sources: Vec<ManifestSource>,
}

impl ManifestComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Add inline manifest text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.sources.push(ManifestSource::Text(text.into()));
        self
    }

    /// Add a manifest file
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.sources
            .push(ManifestSource::File(path.as_ref().to_path_buf()));
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Number of manifest sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl Component for ManifestComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn execute(&self, ctx: &mut BuildContext<'_>) -> Result<()> {
        for source in &self.sources {
            match source {
                ManifestSource::Text(text) => {
                    ctx.add_manifest(text)?;
                }
                ManifestSource::File(path) => {
                    let text = std::fs::read_to_string(path).map_err(|e| {
                        CoreError::component(
                            &self.name,
                            format!("failed to read {}: {}", path.display(), e),
                        )
                    })?;
                    let count = ctx.add_manifest(&text)?;
                    tracing::debug!(
                        component = %self.name,
                        file = %path.display(),
                        documents = count,
                        "loaded manifest file"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run(component: &dyn Component) -> Result<DocumentSet> {
        let cluster = ClusterContext::default();
        let names = vec![component.name().to_string()];
        let mut documents = DocumentSet::new();
        let mut ctx = BuildContext::new(&cluster, &names, &mut documents, component.name());
        component.execute(&mut ctx)?;
        Ok(documents)
    }

    #[test]
    fn test_fn_component() {
        let component = FnComponent::new("app", |ctx| {
            assert!(ctx.has_component("app"));
            assert!(!ctx.has_component("other"));
            ctx.add_document(Document::new("v1", "ConfigMap", "settings"))?;
            assert_eq!(ctx.documents().count(), 1);
            Ok(())
        })
        .depends_on("base")
        .depends_on("rbac");

        assert_eq!(component.dependencies(), vec!["base", "rbac"]);
        let set = run(&component).unwrap();
        assert_eq!(
            set.source_of(&DocumentKey::new("ConfigMap", None, "settings")),
            Some("app")
        );
    }

    #[test]
    fn test_manifest_component_text() {
        let component = ManifestComponent::new("raw").with_text(
            "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: shop\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  namespace: shop\n",
        );
        let set = run(&component).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_manifest_component_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "apiVersion: v1\nkind: Secret\nmetadata:\n  name: token").unwrap();

        let component = ManifestComponent::new("secrets").with_file(file.path());
        assert_eq!(component.source_count(), 1);
        let set = run(&component).unwrap();
        assert!(set.contains(&DocumentKey::new("Secret", None, "token")));
    }

    #[test]
    fn test_manifest_component_missing_file() {
        let component = ManifestComponent::new("broken").with_file("/nonexistent/kforge.yaml");
        let err = run(&component).unwrap_err();
        assert!(matches!(err, CoreError::Component { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_duplicate_within_component() {
        let component = FnComponent::new("twice", |ctx| {
            ctx.add_document(Document::new("v1", "Secret", "s"))?;
            ctx.add_document(Document::new("v1", "Secret", "s"))
        });
        let err = run(&component).unwrap_err();
        assert!(err.is_configuration());
    }
}
