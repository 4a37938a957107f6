//! The builder: component registry and build pipeline
//!
//! A build runs in fixed steps:
//! 1. order components by their declared dependencies
//! 2. execute them one by one, accumulating documents
//! 3. assign the default namespace, if one was requested
//! 4. run the post-processing stages
//! 5. order the documents for apply
//!
//! Any error aborts the build; nothing is returned partially.

use std::collections::HashSet;
use std::fmt;

use crate::collector;
use crate::component::{BuildContext, Component};
use crate::context::ClusterContext;
use crate::document::{Document, DocumentKey};
use crate::error::{CoreError, Result};
use crate::manifest;
use crate::resolver::{self, DocumentGraph};
use crate::set::DocumentSet;
use crate::stage::{self, Stage};

/// Source name for documents added directly to the builder
pub const BUILDER_SOURCE: &str = "builder";

/// Per-build options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Namespace for namespaced documents that do not specify one
    pub namespace: Option<String>,
}

impl BuildOptions {
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }
}

/// Result of a build: documents in apply order plus their dependency edges
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    documents: Vec<Document>,
    dependencies: Vec<Vec<usize>>,
}

impl BuildOutput {
    /// Documents in apply order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Indices of the documents that must be applied before `index`
    ///
    /// Every returned index is smaller than `index`.
    pub fn dependencies(&self, index: usize) -> &[usize] {
        self.dependencies
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Render as a `---` separated YAML stream
    pub fn render(&self) -> Result<String> {
        manifest::render(&self.documents)
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

/// Session object: registered components, direct documents and stages
pub struct Builder {
    cluster: ClusterContext,
    components: Vec<Box<dyn Component>>,
    documents: Vec<Document>,
    stages: Vec<Box<dyn Stage>>,
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("cluster", &self.cluster)
            .field("components", &self.component_names())
            .field("documents", &self.documents.len())
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new(ClusterContext::default())
    }
}

impl Builder {
    /// Create a builder for a target cluster
    ///
    /// The platform default stages are registered; no components are.
    pub fn new(cluster: ClusterContext) -> Self {
        Self {
            cluster,
            components: Vec::new(),
            documents: Vec::new(),
            stages: stage::default_stages(),
        }
    }

    pub fn cluster(&self) -> &ClusterContext {
        &self.cluster
    }

    /// Register a component
    ///
    /// Fails without changing the builder if the name is already taken.
    pub fn add_component(&mut self, component: impl Component + 'static) -> Result<&mut Self> {
        self.add_boxed_component(Box::new(component))
    }

    pub fn add_boxed_component(&mut self, component: Box<dyn Component>) -> Result<&mut Self> {
        if self.has_component(component.name()) {
            return Err(CoreError::DuplicateComponent {
                name: component.name().to_string(),
            });
        }
        self.components.push(component);
        Ok(self)
    }

    /// Unregister a component by name
    ///
    /// Components that depend on it are not checked here; the build reports
    /// the dangling dependency.
    pub fn remove_component(&mut self, name: &str) -> Option<Box<dyn Component>> {
        let index = self.components.iter().position(|c| c.name() == name)?;
        Some(self.components.remove(index))
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.iter().any(|c| c.name() == name)
    }

    /// Registered component names, in registration order
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Add a document directly, outside of any component
    pub fn add_document(&mut self, document: Document) -> Result<&mut Self> {
        let key = document.key();
        if self.documents.iter().any(|d| d.key() == key) {
            return Err(CoreError::DuplicateDocument {
                key: key.to_string(),
                source_name: BUILDER_SOURCE.to_string(),
            });
        }
        self.documents.push(document);
        Ok(self)
    }

    /// Parse a raw manifest and add its documents directly
    ///
    /// Either every document is added or none is. Returns the number added.
    pub fn add_manifest(&mut self, text: &str) -> Result<usize> {
        let parsed = manifest::parse_documents(text)?;

        let mut seen: HashSet<DocumentKey> = self.documents.iter().map(Document::key).collect();
        for doc in &parsed {
            if !seen.insert(doc.key()) {
                return Err(CoreError::DuplicateDocument {
                    key: doc.key().to_string(),
                    source_name: BUILDER_SOURCE.to_string(),
                });
            }
        }

        let count = parsed.len();
        self.documents.extend(parsed);
        Ok(count)
    }

    /// Remove a directly added document
    pub fn remove_document(&mut self, key: &DocumentKey) -> Option<Document> {
        let index = self.documents.iter().position(|d| &d.key() == key)?;
        Some(self.documents.remove(index))
    }

    /// Directly added documents
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Append a post-processing stage after the existing ones
    pub fn add_stage(&mut self, stage: impl Stage + 'static) -> Result<&mut Self> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(CoreError::DuplicateStage {
                name: stage.name().to_string(),
            });
        }
        self.stages.push(Box::new(stage));
        Ok(self)
    }

    pub fn remove_stage(&mut self, name: &str) -> Option<Box<dyn Stage>> {
        let index = self.stages.iter().position(|s| s.name() == name)?;
        Some(self.stages.remove(index))
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline with default options
    pub fn build(&self) -> Result<BuildOutput> {
        self.build_with(&BuildOptions::default())
    }

    /// Run the pipeline
    ///
    /// Components are executed afresh on every call, so building twice
    /// yields the same output.
    pub fn build_with(&self, options: &BuildOptions) -> Result<BuildOutput> {
        let order = resolver::order_components(&self.components)?;
        let names: Vec<String> = self.components.iter().map(|c| c.name().to_string()).collect();

        let mut set = DocumentSet::new();
        for doc in &self.documents {
            set.insert(doc.clone(), BUILDER_SOURCE)?;
        }

        for index in order {
            let component = &self.components[index];
            let before = set.len();
            let mut ctx = BuildContext::new(&self.cluster, &names, &mut set, component.name());
            component.execute(&mut ctx)?;
            tracing::debug!(
                component = component.name(),
                documents = set.len() - before,
                "executed component"
            );
        }

        if let Some(namespace) = &options.namespace {
            let changed = collector::apply_default_namespace(&mut set, namespace)?;
            tracing::debug!(namespace = %namespace, documents = changed, "applied default namespace");
        }

        for stage in &self.stages {
            stage.run(&mut set, &self.cluster)?;
            tracing::debug!(stage = stage.name(), documents = set.len(), "ran stage");
        }

        order_output(set.into_documents())
    }
}

/// Sort documents for apply and translate dependency edges to the new order
fn order_output(documents: Vec<Document>) -> Result<BuildOutput> {
    let graph = DocumentGraph::new(&documents);
    let order = graph.order()?;

    let mut position = vec![0; order.len()];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }

    let dependencies = order
        .iter()
        .map(|&old| {
            let mut deps: Vec<usize> = graph.dependencies(old).map(|d| position[d]).collect();
            deps.sort_unstable();
            deps
        })
        .collect();

    let mut slots: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
    let documents = order
        .iter()
        .filter_map(|&old| slots[old].take())
        .collect();

    Ok(BuildOutput {
        documents,
        dependencies,
    })
}
