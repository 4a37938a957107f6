//! Cluster client backed by the Kubernetes API
//!
//! Resources are handled dynamically: apiVersion/kind are resolved through
//! API discovery, so custom resources work without compile-time types.

use async_trait::async_trait;
use kforge_core::Document;
use kforge_core::document::split_api_version;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams},
    core::GroupVersionKind,
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope, verbs},
};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::cluster::{ClusterClient, DEFAULT_NAMESPACE, ResourceRef};
use crate::error::{KubeError, Result};

/// Field manager name for creates and Server-Side Apply
pub const FIELD_MANAGER: &str = "kforge";

/// Metadata the server maintains, removed from live objects
const SERVER_METADATA: &[&str] = &[
    "managedFields",
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "generation",
];

/// Cluster client using the current kubeconfig context
pub struct KubeCluster {
    client: Client,
    /// Cached discovery, refreshed when a kind is unknown
    discovery: RwLock<Discovery>,
}

impl KubeCluster {
    /// Connect using the default kubeconfig / in-cluster configuration
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await?;
        Self::new(client).await
    }

    /// Create from an existing client
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self {
            client,
            discovery: RwLock::new(discovery),
        })
    }

    /// Re-run discovery (picks up CRDs created since)
    pub async fn refresh_discovery(&self) -> Result<()> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        *self.discovery.write().await = discovery;
        Ok(())
    }

    async fn resolve(&self, api_version: &str, kind: &str) -> Result<(ApiResource, ApiCapabilities)> {
        let gvk = gvk_from_api_version(api_version, kind);
        if let Some(found) = self.discovery.read().await.resolve_gvk(&gvk) {
            return Ok(found);
        }

        tracing::debug!(api_version, kind, "unknown resource type, refreshing discovery");
        self.refresh_discovery().await?;
        self.discovery
            .read()
            .await
            .resolve_gvk(&gvk)
            .ok_or_else(|| KubeError::UnknownResource {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
    }

    async fn api_for(&self, resource: &ResourceRef) -> Result<(Api<DynamicObject>, ApiResource)> {
        let (api_resource, capabilities) = self.resolve(&resource.api_version, &resource.kind).await?;
        let api = if capabilities.scope == Scope::Namespaced {
            let ns = resource.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
            Api::namespaced_with(self.client.clone(), ns, &api_resource)
        } else {
            Api::all_with(self.client.clone(), &api_resource)
        };
        Ok((api, api_resource))
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Document>> {
        let (api, api_resource) = self.api_for(resource).await?;
        match api.get_opt(&resource.name).await? {
            Some(obj) => Ok(Some(live_document(obj, &api_resource)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, document: &Document) -> Result<()> {
        let resource = ResourceRef::from_document(document);
        let (api, _) = self.api_for(&resource).await?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.create(&params, &to_dynamic(document)?).await?;
        Ok(())
    }

    async fn update(&self, document: &Document) -> Result<()> {
        let resource = ResourceRef::from_document(document);
        let (api, _) = self.api_for(&resource).await?;

        // Take ownership of fields other managers set
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&resource.name, &params, &Patch::Apply(&to_dynamic(document)?))
            .await?;
        Ok(())
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        let (api, _) = self.api_for(resource).await?;
        let params = DeleteParams {
            propagation_policy: Some(kube::api::PropagationPolicy::Background),
            ..Default::default()
        };

        match api.delete(&resource.name, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(KubeError::Api(e)),
        }
    }

    async fn list(&self, selector: &str) -> Result<Vec<Document>> {
        let resources: Vec<(ApiResource, ApiCapabilities)> = self
            .discovery
            .read()
            .await
            .groups()
            .flat_map(|group| group.recommended_resources())
            .filter(|(_, caps)| caps.supports_operation(verbs::LIST))
            .collect();

        let params = ListParams::default().labels(selector);
        let mut documents = Vec::new();
        for (api_resource, _) in resources {
            let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &api_resource);
            match api.list(&params).await {
                Ok(list) => {
                    for obj in list {
                        documents.push(live_document(obj, &api_resource)?);
                    }
                }
                // Kinds the user may not list cannot be pruned
                Err(kube::Error::Api(resp)) if resp.code == 403 || resp.code == 405 => {
                    tracing::debug!(kind = %api_resource.kind, "skipping unlistable resource");
                }
                Err(e) => return Err(KubeError::Api(e)),
            }
        }

        documents.sort_by_key(Document::key);
        Ok(documents)
    }
}

/// Split an apiVersion into a GroupVersionKind
///
/// - "apps/v1" -> group="apps", version="v1"
/// - "v1" -> group="", version="v1" (core API)
fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    let (group, version) = split_api_version(api_version);
    GroupVersionKind::gvk(group, version, kind)
}

fn to_dynamic(document: &Document) -> Result<DynamicObject> {
    Ok(serde_json::from_value(document.as_value().clone())?)
}

/// Convert a live object into a document, without server-maintained noise
fn live_document(obj: DynamicObject, api_resource: &ApiResource) -> Result<Document> {
    let mut value = serde_json::to_value(&obj)?;
    strip_server_fields(&mut value, api_resource);
    Document::from_value(value).map_err(|e| KubeError::Serialization(e.to_string()))
}

fn strip_server_fields(value: &mut JsonValue, api_resource: &ApiResource) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    // List items carry no type information
    object
        .entry("apiVersion")
        .or_insert_with(|| JsonValue::String(api_resource.api_version.clone()));
    object
        .entry("kind")
        .or_insert_with(|| JsonValue::String(api_resource.kind.clone()));

    if let Some(metadata) = object.get_mut("metadata").and_then(JsonValue::as_object_mut) {
        for field in SERVER_METADATA {
            metadata.shift_remove(*field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gvk_from_api_version() {
        let gvk = gvk_from_api_version("apps/v1", "Deployment");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");

        let core = gvk_from_api_version("v1", "ConfigMap");
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");

        let custom = gvk_from_api_version("example.com/v1alpha1", "Widget");
        assert_eq!(custom.group, "example.com");
        assert_eq!(custom.version, "v1alpha1");
    }

    #[test]
    fn test_strip_server_fields() {
        let api_resource = ApiResource::from_gvk(&gvk_from_api_version("v1", "ConfigMap"));
        let mut value = json!({
            "metadata": {
                "name": "cfg",
                "namespace": "shop",
                "uid": "1234",
                "resourceVersion": "99",
                "generation": 2,
                "creationTimestamp": "2024-01-01T00:00:00Z",
                "managedFields": [{"manager": "kforge"}],
                "labels": {"app": "shop"}
            },
            "data": {"a": "1"}
        });
        strip_server_fields(&mut value, &api_resource);

        assert_eq!(
            value,
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "cfg", "namespace": "shop", "labels": {"app": "shop"}},
                "data": {"a": "1"}
            })
        );
    }

    #[test]
    fn test_document_converts_to_dynamic_object() {
        let doc = Document::new("apps/v1", "Deployment", "web")
            .with_namespace("shop")
            .with("spec.replicas", 2)
            .unwrap();
        let obj = to_dynamic(&doc).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("web"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(obj.types.unwrap().kind, "Deployment");
        assert_eq!(obj.data["spec"]["replicas"], json!(2));
    }
}
