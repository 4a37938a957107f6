//! Dependency resolution for components and documents
//!
//! Both orderings use the same Kahn-style topological sort. Among the nodes
//! that are ready at a given step, the one with the lowest priority is taken
//! first, which makes the result independent of hash ordering and stable
//! across runs.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::category::ResourceCategory;
use crate::component::Component;
use crate::document::{Document, DocumentKey};
use crate::error::{CoreError, Result};
use crate::kinds;
use crate::meta::Annotatable;

/// Annotation listing documents that must be applied first
///
/// Format: comma separated `Kind/name` or `Kind/namespace/name`. A two-part
/// reference resolves in the annotated document's namespace first, then
/// among cluster-scoped documents.
pub const DEPENDS_ON_ANNOTATION: &str = "kforge.io/depends-on";

/// Nodes that could not be ordered because of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Node indices on (or between) cycles, ascending
    pub members: Vec<usize>,
}

/// Directed graph of "must come after" relations between prioritized nodes
#[derive(Debug, Clone)]
pub struct DependencyGraph<P> {
    priorities: Vec<P>,
    dependencies: Vec<BTreeSet<usize>>,
}

impl<P: Ord + Clone> Default for DependencyGraph<P> {
    fn default() -> Self {
        Self {
            priorities: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

impl<P: Ord + Clone> DependencyGraph<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index
    pub fn add_node(&mut self, priority: P) -> usize {
        self.priorities.push(priority);
        self.dependencies.push(BTreeSet::new());
        self.priorities.len() - 1
    }

    /// Record that `node` must come after `dependency`
    ///
    /// Self references are ignored.
    pub fn add_edge(&mut self, node: usize, dependency: usize) {
        if node != dependency {
            self.dependencies[node].insert(dependency);
        }
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }

    pub fn priority(&self, node: usize) -> &P {
        &self.priorities[node]
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.dependencies[node].iter().copied()
    }

    /// Topologically sort the graph
    ///
    /// Returns the node indices with every node after all of its
    /// dependencies, or the nodes that could not be placed.
    pub fn sort(&self) -> std::result::Result<Vec<usize>, Cycle> {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<(P, usize)>> = (0..n)
            .filter(|&i| in_degree[i] == 0)
            .map(|i| Reverse((self.priorities[i].clone(), i)))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse((self.priorities[dependent].clone(), dependent)));
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }

        Err(Cycle {
            members: self.cycle_members(&in_degree, &dependents),
        })
    }

    /// Narrow the unsorted remainder down to the nodes involved in cycles
    ///
    /// Nodes that merely depend on a cycle are peeled off repeatedly.
    fn cycle_members(&self, in_degree: &[usize], dependents: &[Vec<usize>]) -> Vec<usize> {
        let mut remaining: BTreeSet<usize> = (0..self.len()).filter(|&i| in_degree[i] > 0).collect();
        loop {
            let tails: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| !dependents[i].iter().any(|d| remaining.contains(d)))
                .collect();
            if tails.is_empty() {
                break;
            }
            for tail in tails {
                remaining.remove(&tail);
            }
        }
        remaining.into_iter().collect()
    }
}

/// Compute the execution order of components
///
/// Ties are broken by registration order. Every declared dependency must be
/// registered.
pub fn order_components<C>(components: &[C]) -> Result<Vec<usize>>
where
    C: AsRef<dyn Component>,
{
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_ref().name(), i))
        .collect();

    let mut graph = DependencyGraph::new();
    for i in 0..components.len() {
        graph.add_node(i);
    }

    for (i, component) in components.iter().enumerate() {
        let component = component.as_ref();
        for dependency in component.dependencies() {
            let Some(&dep) = index.get(dependency.as_str()) else {
                return Err(CoreError::MissingDependency {
                    component: component.name().to_string(),
                    dependency,
                });
            };
            graph.add_edge(i, dep);
        }
    }

    graph.sort().map_err(|cycle| CoreError::DependencyCycle {
        members: cycle
            .members
            .into_iter()
            .map(|i| components[i].as_ref().name().to_string())
            .collect(),
    })
}

/// Apply-order graph over a set of documents
///
/// Edges, all pointing from a document to something it needs:
/// - the Namespace document of its namespace
/// - the CustomResourceDefinition it is an instance of
/// - documents named in the [`DEPENDS_ON_ANNOTATION`] annotation
/// - ServiceAccounts and roles referenced by role bindings, and the
///   ServiceAccount a workload runs as
///
/// References to documents outside the set are ignored. Independent
/// documents are ordered by [`ResourceCategory`], then by identity.
#[derive(Debug, Clone)]
pub struct DocumentGraph {
    graph: DependencyGraph<(ResourceCategory, DocumentKey)>,
}

impl DocumentGraph {
    pub fn new(documents: &[Document]) -> Self {
        let mut graph = DependencyGraph::new();
        let mut index: HashMap<DocumentKey, usize> = HashMap::new();
        for doc in documents {
            let key = doc.key();
            let node = graph.add_node((
                ResourceCategory::from_resource(doc.kind(), doc.api_version()),
                key.clone(),
            ));
            index.insert(key, node);
        }

        for (node, doc) in documents.iter().enumerate() {
            for key in references(doc) {
                if let Some(&dep) = index.get(&key) {
                    graph.add_edge(node, dep);
                }
            }
            for candidates in depends_on_annotation(doc) {
                if let Some(&dep) = candidates.iter().find_map(|key| index.get(key)) {
                    graph.add_edge(node, dep);
                }
            }
        }

        Self { graph }
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Direct dependencies of the document at `index`
    pub fn dependencies(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.dependencies(index)
    }

    /// Indices of the documents in apply order
    pub fn order(&self) -> Result<Vec<usize>> {
        self.graph.sort().map_err(|cycle| CoreError::Resolution {
            members: cycle
                .members
                .into_iter()
                .map(|i| self.graph.priority(i).1.to_string())
                .collect(),
        })
    }
}

/// Identities a document refers to
fn references(doc: &Document) -> Vec<DocumentKey> {
    let mut refs = Vec::new();

    if let Some(ns) = doc.namespace_name() {
        refs.push(DocumentKey::new(kinds::NAMESPACE, None, ns));
    }

    if let Some(crd) = &doc.markers().requires_crd {
        refs.push(DocumentKey::new(
            kinds::CUSTOM_RESOURCE_DEFINITION,
            None,
            crd.name.as_str(),
        ));
    }

    if let Some(sa) = doc.service_account_name() {
        refs.push(DocumentKey::new(kinds::SERVICE_ACCOUNT, doc.namespace_name(), sa));
    }

    if doc.kind() == kinds::ROLE_BINDING || doc.kind() == kinds::CLUSTER_ROLE_BINDING {
        refs.extend(binding_references(doc));
    }

    refs
}

fn binding_references(doc: &Document) -> Vec<DocumentKey> {
    let mut refs = Vec::new();

    if let Some(subjects) = doc.get("subjects").and_then(|s| s.as_array()) {
        for subject in subjects {
            if subject["kind"].as_str() != Some(kinds::SERVICE_ACCOUNT) {
                continue;
            }
            let Some(name) = subject["name"].as_str() else {
                continue;
            };
            let namespace = subject["namespace"].as_str().or(doc.namespace_name());
            refs.push(DocumentKey::new(kinds::SERVICE_ACCOUNT, namespace, name));
        }
    }

    if let (Some(kind), Some(name)) = (doc.get_str("roleRef.kind"), doc.get_str("roleRef.name")) {
        match kind {
            kinds::ROLE => refs.push(DocumentKey::new(kinds::ROLE, doc.namespace_name(), name)),
            kinds::CLUSTER_ROLE => refs.push(DocumentKey::new(kinds::CLUSTER_ROLE, None, name)),
            _ => {}
        }
    }

    refs
}

/// Parse the depends-on annotation
///
/// Each reference yields the identities it may resolve to, most specific
/// first.
fn depends_on_annotation(doc: &Document) -> Vec<Vec<DocumentKey>> {
    let Some(value) = doc.annotation(DEPENDS_ON_ANNOTATION) else {
        return Vec::new();
    };
    let mut refs = Vec::new();
    for reference in value.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let parts: Vec<&str> = reference.split('/').collect();
        match parts.as_slice() {
            [kind, name] => refs.push(vec![
                DocumentKey::new(*kind, doc.namespace_name(), *name),
                DocumentKey::new(*kind, None, *name),
            ]),
            [kind, namespace, name] => {
                refs.push(vec![DocumentKey::new(*kind, Some(*namespace), *name)])
            }
            _ => tracing::warn!(
                document = %doc.key(),
                reference,
                "ignoring malformed {} reference",
                DEPENDS_ON_ANNOTATION
            ),
        }
    }
    refs
}
