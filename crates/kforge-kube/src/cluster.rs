//! The cluster interface used by the apply engine

use std::fmt;

use async_trait::async_trait;
use kforge_core::{Document, DocumentKey};

use crate::error::Result;

/// Namespace the API server uses for namespaced objects that name none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Reference to one object in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceRef {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            api_version: doc.api_version().to_string(),
            kind: doc.kind().to_string(),
            namespace: doc.namespace_name().map(String::from),
            name: doc.name().to_string(),
        }
    }

    /// Identity within a build (apiVersion is not part of it)
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.kind.as_str(), self.namespace.as_deref(), self.name.as_str())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}

/// Operations the apply engine needs from a cluster
///
/// Implementations must be Send + Sync; the engine issues independent
/// operations concurrently.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch the live object, `None` if it does not exist
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Document>>;

    /// Create a new object
    async fn create(&self, document: &Document) -> Result<()>;

    /// Update an existing object to the desired state
    async fn update(&self, document: &Document) -> Result<()>;

    /// Delete an object; deleting a missing object succeeds
    async fn delete(&self, resource: &ResourceRef) -> Result<()>;

    /// All live objects matching a label selector (`key=value,...`)
    async fn list(&self, selector: &str) -> Result<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_from_document() {
        let doc = Document::new("apps/v1", "Deployment", "web").with_namespace("shop");
        let r = ResourceRef::from_document(&doc);
        assert_eq!(r.api_version, "apps/v1");
        assert_eq!(r.key(), doc.key());
        assert_eq!(r.to_string(), "shop/Deployment/web");
    }
}
