//! Post-processing stages run over the accumulated document set
//!
//! Every new builder starts with the platform defaults, in order:
//! [`CrdStage`], [`NamespaceStage`], [`CanonicalStage`]. Each can be removed
//! by name and custom stages can be appended.

use crate::canonical;
use crate::collector;
use crate::context::ClusterContext;
use crate::error::Result;
use crate::set::DocumentSet;

/// A pass over the complete document set, run after all components
pub trait Stage: Send + Sync {
    /// Unique name within a builder
    fn name(&self) -> &str;

    fn run(&self, documents: &mut DocumentSet, cluster: &ClusterContext) -> Result<()>;
}

/// Marks CRDs and the custom resources that are instances of them
#[derive(Debug, Clone, Copy, Default)]
pub struct CrdStage;

impl CrdStage {
    pub const NAME: &'static str = "crds";
}

impl Stage for CrdStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, documents: &mut DocumentSet, _cluster: &ClusterContext) -> Result<()> {
        collector::collect_crds(documents);
        Ok(())
    }
}

/// Synthesizes missing Namespace documents
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceStage;

impl NamespaceStage {
    pub const NAME: &'static str = "namespaces";
}

impl Stage for NamespaceStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, documents: &mut DocumentSet, _cluster: &ClusterContext) -> Result<()> {
        collector::synthesize_namespaces(documents)?;
        Ok(())
    }
}

/// Reorders every document's fields deterministically
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalStage;

impl CanonicalStage {
    pub const NAME: &'static str = "canonical-fields";
}

impl Stage for CanonicalStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, documents: &mut DocumentSet, _cluster: &ClusterContext) -> Result<()> {
        documents.iter_mut().for_each(canonical::canonicalize);
        Ok(())
    }
}

/// The platform default stages, in execution order
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(CrdStage),
        Box::new(NamespaceStage),
        Box::new(CanonicalStage),
    ]
}
