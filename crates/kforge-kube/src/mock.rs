//! In-memory cluster for testing
//!
//! Stores objects by identity, counts operations for assertions and can be
//! told to fail mutations of specific documents, all without a Kubernetes
//! cluster.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kforge_core::{Document, DocumentKey, Labelable};
use kube::core::ErrorResponse;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::cluster::{ClusterClient, ResourceRef};
use crate::error::{KubeError, Result};

/// In-memory cluster
#[derive(Clone, Default)]
pub struct MockCluster {
    /// Live objects by identity
    store: Arc<RwLock<HashMap<DocumentKey, Document>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
    /// Mutations in the order they happened, e.g. "create shop/ConfigMap/cfg"
    journal: Arc<RwLock<Vec<String>>>,
    /// Mutations of these identities fail with the given message
    failures: HashMap<DocumentKey, String>,
    /// Simulated duration of every mutation
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl OperationCounts {
    /// Creates, updates and deletes
    pub fn mutations(&self) -> usize {
        self.creates + self.updates + self.deletes
    }

    /// Every call made to the cluster
    pub fn total(&self) -> usize {
        self.gets + self.lists + self.mutations()
    }
}

impl MockCluster {
    /// Create a new empty cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-existing objects
    pub fn with_objects(objects: impl IntoIterator<Item = Document>) -> Self {
        let store = objects.into_iter().map(|d| (d.key(), d)).collect();
        Self {
            store: Arc::new(RwLock::new(store)),
            ..Self::default()
        }
    }

    /// Make every mutation of `key` fail
    pub fn fail_on(mut self, key: DocumentKey, message: impl Into<String>) -> Self {
        self.failures.insert(key, message.into());
        self
    }

    /// Delay every mutation
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Get operation counts for assertions
    pub async fn operation_counts(&self) -> OperationCounts {
        self.operations.read().await.clone()
    }

    /// Reset operation counts and the mutation journal
    pub async fn reset_counts(&self) {
        *self.operations.write().await = OperationCounts::default();
        self.journal.write().await.clear();
    }

    /// Mutations in the order they were performed
    pub async fn journal(&self) -> Vec<String> {
        self.journal.read().await.clone()
    }

    /// Live object by identity
    pub async fn object(&self, key: &DocumentKey) -> Option<Document> {
        self.store.read().await.get(key).cloned()
    }

    /// Count stored objects
    pub async fn object_count(&self) -> usize {
        self.store.read().await.len()
    }

    /// Highest number of mutations that were running at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn mutate<T>(
        &self,
        verb: &str,
        key: &DocumentKey,
        op: impl FnOnce(&mut HashMap<DocumentKey, Document>) -> Result<T>,
    ) -> Result<T> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = match self.failures.get(key) {
            Some(message) => Err(api_error(500, "InternalError", message.clone())),
            None => {
                let mut store = self.store.write().await;
                op(&mut store)
            }
        };
        if result.is_ok() {
            self.journal.write().await.push(format!("{} {}", verb, key));
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Document>> {
        self.operations.write().await.gets += 1;
        Ok(self.store.read().await.get(&resource.key()).cloned())
    }

    async fn create(&self, document: &Document) -> Result<()> {
        self.operations.write().await.creates += 1;
        let key = document.key();
        self.mutate("create", &key, |store| {
            if store.contains_key(&key) {
                return Err(api_error(
                    409,
                    "AlreadyExists",
                    format!("{} already exists", key),
                ));
            }
            store.insert(key.clone(), document.clone());
            Ok(())
        })
        .await
    }

    async fn update(&self, document: &Document) -> Result<()> {
        self.operations.write().await.updates += 1;
        let key = document.key();
        self.mutate("update", &key, |store| {
            let Some(live) = store.get_mut(&key) else {
                return Err(api_error(404, "NotFound", format!("{} not found", key)));
            };
            let mut merged = live.as_value().clone();
            merge(&mut merged, document.as_value());
            *live = Document::from_value(merged)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        self.operations.write().await.deletes += 1;
        let key = resource.key();
        self.mutate("delete", &key, |store| {
            store.remove(&key);
            Ok(())
        })
        .await
    }

    async fn list(&self, selector: &str) -> Result<Vec<Document>> {
        self.operations.write().await.lists += 1;
        let mut matching: Vec<Document> = self
            .store
            .read()
            .await
            .values()
            .filter(|doc| selector_matches(selector, &doc.labels()))
            .cloned()
            .collect();
        matching.sort_by_key(Document::key);
        Ok(matching)
    }
}

fn api_error(code: u16, reason: &str, message: String) -> KubeError {
    KubeError::Api(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

/// Merge `patch` into `target`: mappings recursively, everything else replaced
fn merge(target: &mut JsonValue, patch: &JsonValue) {
    match (target, patch) {
        (JsonValue::Object(target), JsonValue::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Equality-based label selector matching (`a=b`, `a==b`, `a!=b`, `a`, `!a`)
fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .all(|requirement| {
            if let Some((key, value)) = requirement.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = requirement
                .split_once("==")
                .or_else(|| requirement.split_once('='))
            {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else if let Some(key) = requirement.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(requirement)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(name: &str) -> Document {
        Document::new("v1", "ConfigMap", name).with_namespace("default")
    }

    #[tokio::test]
    async fn test_mock_create_and_get() {
        let cluster = MockCluster::new();
        cluster.create(&cm("a")).await.unwrap();

        let live = cluster
            .get(&ResourceRef::from_document(&cm("a")))
            .await
            .unwrap();
        assert!(live.is_some());

        let counts = cluster.operation_counts().await;
        assert_eq!(counts.creates, 1);
        assert_eq!(counts.gets, 1);
        assert_eq!(cluster.journal().await, vec!["create default/ConfigMap/a"]);
    }

    #[tokio::test]
    async fn test_mock_create_duplicate_fails() {
        let cluster = MockCluster::with_objects([cm("a")]);
        let err = cluster.create(&cm("a")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_mock_update_merges() {
        let cluster = MockCluster::with_objects([cm("a").with("data.x", "1").unwrap()]);
        cluster
            .update(&cm("a").with("data.y", "2").unwrap())
            .await
            .unwrap();

        let live = cluster
            .object(&DocumentKey::new("ConfigMap", Some("default"), "a"))
            .await
            .unwrap();
        assert_eq!(live.get_str("data.x"), Some("1"));
        assert_eq!(live.get_str("data.y"), Some("2"));

        let err = cluster.update(&cm("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mock_delete_missing_is_ok() {
        let cluster = MockCluster::with_objects([cm("a")]);
        cluster
            .delete(&ResourceRef::from_document(&cm("a")))
            .await
            .unwrap();
        cluster
            .delete(&ResourceRef::from_document(&cm("a")))
            .await
            .unwrap();
        assert_eq!(cluster.object_count().await, 0);
        assert_eq!(cluster.operation_counts().await.deletes, 2);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let cluster = MockCluster::new().fail_on(cm("bad").key(), "admission webhook denied");
        let err = cluster.create(&cm("bad")).await.unwrap_err();
        assert!(err.to_string().contains("admission webhook denied"));
        assert!(cluster.journal().await.is_empty());
        cluster.create(&cm("good")).await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_list_by_selector() {
        let cluster = MockCluster::with_objects([
            cm("a").with_label("app", "shop").with_label("tier", "web"),
            cm("b").with_label("app", "shop"),
            cm("c"),
        ]);
        let names = |docs: Vec<Document>| -> Vec<String> {
            docs.iter().map(|d| d.name().to_string()).collect()
        };

        assert_eq!(names(cluster.list("app=shop").await.unwrap()), vec!["a", "b"]);
        assert_eq!(names(cluster.list("app=shop,tier!=web").await.unwrap()), vec!["b"]);
        assert_eq!(names(cluster.list("tier").await.unwrap()), vec!["a"]);
        assert_eq!(names(cluster.list("!app").await.unwrap()), vec!["c"]);
        assert_eq!(cluster.operation_counts().await.lists, 4);
    }
}
