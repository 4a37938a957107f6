//! In-memory representation of a single Kubernetes manifest
//!
//! A [`Document`] keeps the whole object as an open property tree so that
//! any kind (including custom resources) can be represented. Identity
//! (`apiVersion`, `kind`, `metadata.namespace`, `metadata.name`) is read from
//! the tree; `apiVersion` and `kind` cannot be changed once a document exists.

use std::fmt;

use serde_json::{Map, Value as JsonValue, json};

use crate::error::{CoreError, Result};
use crate::path::{PropertyPath, Segment};

/// Identity of a document within one build: kind, namespace and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl DocumentKey {
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.map(String::from),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", ns, self.kind, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// A custom resource type defined by a CustomResourceDefinition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdRef {
    /// CRD object name (`<plural>.<group>`)
    pub name: String,
    pub group: String,
    pub kind: String,
    /// Served versions
    pub versions: Vec<String>,
    /// Whether instances live in a namespace
    pub namespaced: bool,
}

impl CrdRef {
    /// Check whether a document's apiVersion/kind is an instance of this CRD
    pub fn matches(&self, api_version: &str, kind: &str) -> bool {
        let (group, version) = split_api_version(api_version);
        self.kind == kind && self.group == group && self.versions.iter().any(|v| v == version)
    }
}

/// Derived classification attached to a document during a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers {
    /// Set when the document itself is a CustomResourceDefinition
    pub defines_crd: Option<CrdRef>,
    /// Set when the document is an instance of a CRD present in the same build
    pub requires_crd: Option<CrdRef>,
    /// Set when the document was synthesized rather than authored
    pub synthesized: bool,
}

/// One Kubernetes-style manifest object
#[derive(Debug, Clone)]
pub struct Document {
    root: JsonValue,
    markers: Markers,
}

impl Document {
    /// Create a document with only identity fields populated
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            root: json!({
                "apiVersion": api_version.into(),
                "kind": kind.into(),
                "metadata": { "name": name.into() },
            }),
            markers: Markers::default(),
        }
    }

    /// Create a document from a parsed value tree
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(_) = value else {
            return Err(CoreError::invalid_document("manifest must be a mapping"));
        };

        for field in ["apiVersion", "kind"] {
            match value.get(field) {
                Some(JsonValue::String(s)) if !s.is_empty() => {}
                Some(_) => {
                    return Err(CoreError::invalid_document(format!(
                        "'{}' must be a non-empty string",
                        field
                    )));
                }
                None => {
                    return Err(CoreError::invalid_document(format!(
                        "missing '{}'",
                        field
                    )));
                }
            }
        }

        let metadata = value
            .get("metadata")
            .ok_or_else(|| CoreError::invalid_document("missing 'metadata'"))?;
        validate_metadata(metadata)?;

        Ok(Self {
            root: value,
            markers: Markers::default(),
        })
    }

    /// Parse a single YAML (or JSON) document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml).map_err(|e| CoreError::Parse {
            index: 0,
            fragment: crate::manifest::fragment_of(yaml),
            message: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Minimal Namespace document
    pub fn namespace(name: impl Into<String>) -> Self {
        Self::new("v1", crate::kinds::NAMESPACE, name)
    }

    pub fn api_version(&self) -> &str {
        self.root["apiVersion"].as_str().unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.root["kind"].as_str().unwrap_or_default()
    }

    /// API group ("" for the core group)
    pub fn group(&self) -> &str {
        split_api_version(self.api_version()).0
    }

    /// API version without the group
    pub fn version(&self) -> &str {
        split_api_version(self.api_version()).1
    }

    pub fn name(&self) -> &str {
        self.root["metadata"]["name"].as_str().unwrap_or_default()
    }

    pub fn namespace_name(&self) -> Option<&str> {
        self.root["metadata"]["namespace"]
            .as_str()
            .filter(|ns| !ns.is_empty())
    }

    /// Set or clear `metadata.namespace`
    pub fn set_namespace(&mut self, namespace: Option<&str>) {
        let Some(metadata) = self.root["metadata"].as_object_mut() else {
            return;
        };
        match namespace {
            Some(ns) => {
                metadata.insert("namespace".to_string(), JsonValue::String(ns.to_string()));
            }
            None => {
                metadata.shift_remove("namespace");
            }
        }
    }

    /// Builder-style namespace assignment
    pub fn with_namespace(mut self, namespace: impl AsRef<str>) -> Self {
        self.set_namespace(Some(namespace.as_ref()));
        self
    }

    /// Identity of this document
    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.kind(), self.namespace_name(), self.name())
    }

    /// Look up a value by path; `None` when absent
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        PropertyPath::parse(path).ok()?.get(&self.root)
    }

    /// Look up a string value by path
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Set a value by path, creating intermediate mappings and sequences
    ///
    /// Changes that would leave `metadata` without a valid name are rolled
    /// back and reported as errors.
    pub fn set(&mut self, path: &str, value: impl Into<JsonValue>) -> Result<()> {
        let path = PropertyPath::parse(path)?;
        let value = value.into();
        self.edit(&path, |root| path.set(root, value))
    }

    /// Builder-style [`Document::set`]
    pub fn with(mut self, path: &str, value: impl Into<JsonValue>) -> Result<Self> {
        self.set(path, value)?;
        Ok(self)
    }

    /// Remove a value by path
    pub fn remove(&mut self, path: &str) -> Result<Option<JsonValue>> {
        let path = PropertyPath::parse(path)?;
        if let [Segment::Key(root)] = path.segments() {
            if root == "metadata" {
                return Err(CoreError::ImmutableField {
                    field: root.clone(),
                });
            }
        }
        self.edit(&path, |root| Ok(path.remove(root)))
    }

    /// Run an edit under the identity rules, restoring the touched top-level
    /// field when the edit fails or breaks `metadata`
    fn edit<T>(
        &mut self,
        path: &PropertyPath,
        change: impl FnOnce(&mut JsonValue) -> Result<T>,
    ) -> Result<T> {
        let field = match path.segments().first() {
            Some(Segment::Key(field)) => field.clone(),
            _ => {
                return Err(CoreError::InvalidPath {
                    path: path.to_string(),
                    message: "a document path must start with a field name".to_string(),
                });
            }
        };
        if field == "apiVersion" || field == "kind" {
            return Err(CoreError::ImmutableField { field });
        }

        let saved = self.root.get(&field).cloned();
        let result = change(&mut self.root).and_then(|value| {
            if field == "metadata" {
                validate_metadata(&self.root["metadata"])?;
            }
            Ok(value)
        });

        if result.is_err() {
            if let JsonValue::Object(map) = &mut self.root {
                match saved {
                    Some(previous) => {
                        map.insert(field, previous);
                    }
                    None => {
                        map.shift_remove(&field);
                    }
                }
            }
        }
        result
    }

    /// Top-level fields of the document
    pub fn fields(&self) -> &Map<String, JsonValue> {
        // from_value/new guarantee an object root
        self.root.as_object().unwrap_or_else(|| empty_map())
    }

    /// `spec`, if present
    pub fn spec(&self) -> Option<&JsonValue> {
        self.root.get("spec")
    }

    /// The whole value tree
    pub fn as_value(&self) -> &JsonValue {
        &self.root
    }

    pub fn into_value(self) -> JsonValue {
        self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut JsonValue {
        &mut self.root
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub(crate) fn markers_mut(&mut self) -> &mut Markers {
        &mut self.markers
    }

    /// Whether this document is a CustomResourceDefinition
    pub fn is_crd(&self) -> bool {
        self.kind() == crate::kinds::CUSTOM_RESOURCE_DEFINITION
            && self.group() == crate::kinds::APIEXTENSIONS_GROUP
    }

    pub fn is_namespace(&self) -> bool {
        self.kind() == crate::kinds::NAMESPACE && self.api_version() == "v1"
    }

    /// Serialize to a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| CoreError::invalid_document(e.to_string()))
    }
}

fn empty_map() -> &'static Map<String, JsonValue> {
    static EMPTY: std::sync::OnceLock<Map<String, JsonValue>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

fn validate_metadata(metadata: &JsonValue) -> Result<()> {
    let JsonValue::Object(meta) = metadata else {
        return Err(CoreError::invalid_document("'metadata' must be a mapping"));
    };
    match meta.get("name") {
        Some(JsonValue::String(name)) if !name.is_empty() => {}
        _ => {
            return Err(CoreError::invalid_document(
                "metadata.name must be a non-empty string",
            ));
        }
    }
    match meta.get("namespace") {
        None | Some(JsonValue::String(_)) | Some(JsonValue::Null) => Ok(()),
        Some(_) => Err(CoreError::invalid_document(
            "metadata.namespace must be a string",
        )),
    }
}

/// Split an apiVersion into group and version
///
/// - "apps/v1" -> ("apps", "v1")
/// - "v1" -> ("", "v1")
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Document {
        Document::from_yaml(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: shop
spec:
  replicas: 2
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.27
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_identity() {
        let doc = deployment();
        assert_eq!(doc.api_version(), "apps/v1");
        assert_eq!(doc.group(), "apps");
        assert_eq!(doc.version(), "v1");
        assert_eq!(doc.kind(), "Deployment");
        assert_eq!(doc.name(), "web");
        assert_eq!(doc.namespace_name(), Some("shop"));
        assert_eq!(doc.key().to_string(), "shop/Deployment/web");
    }

    #[test]
    fn test_get_and_set() {
        let mut doc = deployment();
        assert_eq!(doc.get("spec.replicas"), Some(&json!(2)));
        assert_eq!(
            doc.get_str("spec.template.spec.containers[0].image"),
            Some("nginx:1.27")
        );
        assert!(doc.get("spec.strategy.type").is_none());

        doc.set("spec.strategy.type", "Recreate").unwrap();
        assert_eq!(doc.get_str("spec.strategy.type"), Some("Recreate"));
    }

    #[test]
    fn test_identity_is_immutable() {
        let mut doc = deployment();
        assert!(matches!(
            doc.set("kind", "StatefulSet"),
            Err(CoreError::ImmutableField { .. })
        ));
        assert!(matches!(
            doc.set("apiVersion", "apps/v1beta1"),
            Err(CoreError::ImmutableField { .. })
        ));
        assert!(doc.remove("metadata").is_err());
        assert!(doc.set("metadata.name", "").is_err());
        assert!(doc.set("metadata.name", 5).is_err());
        assert_eq!(doc.kind(), "Deployment");

        doc.set("metadata.name", "web-v2").unwrap();
        assert_eq!(doc.name(), "web-v2");
    }

    #[test]
    fn test_paths_cannot_break_identity() {
        let mut doc = deployment();
        let before = doc.as_value().clone();

        assert!(matches!(doc.set("[0]", "x"), Err(CoreError::InvalidPath { .. })));
        assert!(doc.set("metadata[0]", "x").is_err());
        assert!(doc.set("metadata.name[0]", "x").is_err());
        assert!(doc.set("metadata.name.first", "x").is_err());
        assert!(doc.set("metadata.namespace.x", "y").is_err());
        assert!(doc.set("metadata", json!({"labels": {}})).is_err());
        assert!(doc.remove("metadata.name").is_err());
        assert!(doc.remove("kind").is_err());
        assert!(doc.remove("[0]").is_err());

        assert_eq!(doc.as_value(), &before);
        assert_eq!(doc.key().to_string(), "shop/Deployment/web");
    }

    #[test]
    fn test_failed_set_is_rolled_back() {
        let mut doc = deployment();
        assert!(doc.set("spec.args[99999]", "x").is_err());
        assert!(doc.get("spec.args").is_none());

        doc.set("metadata.labels.app", "web").unwrap();
        assert_eq!(doc.get_str("metadata.labels.app"), Some("web"));
        assert_eq!(doc.remove("metadata.labels.app").unwrap(), Some(json!("web")));
    }

    #[test]
    fn test_clone_is_deep() {
        let prototype = deployment();
        let mut copy = prototype.clone();
        copy.set("spec.replicas", 5).unwrap();
        copy.set_namespace(Some("other"));

        assert_eq!(prototype.get("spec.replicas"), Some(&json!(2)));
        assert_eq!(prototype.namespace_name(), Some("shop"));
        assert_eq!(copy.key().namespace.as_deref(), Some("other"));
    }

    #[test]
    fn test_from_value_validation() {
        assert!(Document::from_value(json!("text")).is_err());
        assert!(Document::from_value(json!({"kind": "Pod", "metadata": {"name": "a"}})).is_err());
        assert!(Document::from_value(json!({"apiVersion": "v1", "kind": "Pod"})).is_err());
        assert!(
            Document::from_value(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {}}))
                .is_err()
        );
        assert!(
            Document::from_value(
                json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "a"}})
            )
            .is_ok()
        );
    }

    #[test]
    fn test_namespace_document() {
        let ns = Document::namespace("team-a");
        assert!(ns.is_namespace());
        assert_eq!(ns.key(), DocumentKey::new("Namespace", None, "team-a"));
        assert_eq!(ns.fields().len(), 3);
    }

    #[test]
    fn test_empty_namespace_is_none() {
        let doc = Document::new("v1", "ConfigMap", "cfg").with_namespace("");
        assert_eq!(doc.namespace_name(), None);
    }

    #[test]
    fn test_crd_ref_matches() {
        let crd = CrdRef {
            name: "widgets.example.com".to_string(),
            group: "example.com".to_string(),
            kind: "Widget".to_string(),
            versions: vec!["v1".to_string(), "v1beta1".to_string()],
            namespaced: true,
        };
        assert!(crd.matches("example.com/v1", "Widget"));
        assert!(crd.matches("example.com/v1beta1", "Widget"));
        assert!(!crd.matches("example.com/v2", "Widget"));
        assert!(!crd.matches("other.com/v1", "Widget"));
        assert!(!crd.matches("example.com/v1", "Gadget"));
    }
}
