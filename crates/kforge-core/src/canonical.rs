//! Deterministic field ordering
//!
//! Keys are reordered by a fixed priority list for well-known positions and
//! alphabetically otherwise. Sequences keep their order except for fields
//! whose element order carries no meaning (selector requirements, RBAC rule
//! lists), which are sorted by their canonical JSON form. Values are never
//! changed.

use serde_json::{Map, Value as JsonValue};

use crate::document::Document;

/// Top-level key priority
const TOP_LEVEL_ORDER: &[&str] = &[
    "apiVersion",
    "kind",
    "metadata",
    "spec",
    "data",
    "stringData",
    "status",
];

/// Priority for any `metadata` mapping (including pod templates)
const METADATA_ORDER: &[&str] = &["name", "generateName", "namespace", "labels", "annotations"];

/// Priority for mappings that are sequence elements (containers, ports, env)
const ITEM_ORDER: &[&str] = &["name"];

/// Sequence fields whose element order is not significant
const UNORDERED_FIELDS: &[&str] = &[
    "matchExpressions",
    "verbs",
    "apiGroups",
    "resources",
    "resourceNames",
    "nonResourceURLs",
];

/// Canonicalize a document in place
pub fn canonicalize(document: &mut Document) {
    let root = std::mem::take(document.root_mut());
    *document.root_mut() = canonical_value(root, TOP_LEVEL_ORDER);
}

/// Canonical form of a standalone value tree, using top-level ordering
pub fn canonicalize_value(value: JsonValue) -> JsonValue {
    canonical_value(value, TOP_LEVEL_ORDER)
}

fn canonical_value(value: JsonValue, order: &[&str]) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(canonical_map(map, order)),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .map(|item| canonical_value(item, ITEM_ORDER))
                .collect(),
        ),
        other => other,
    }
}

fn canonical_map(map: Map<String, JsonValue>, order: &[&str]) -> Map<String, JsonValue> {
    // `values` of a selector requirement ({key, operator, values}) is a set
    let selector_requirement = map.contains_key("key") && map.contains_key("operator");

    let mut entries: Vec<(String, JsonValue)> = map
        .into_iter()
        .map(|(key, value)| {
            let child_order = if key == "metadata" { METADATA_ORDER } else { &[] };
            let mut value = canonical_value(value, child_order);
            let unordered = UNORDERED_FIELDS.contains(&key.as_str())
                || (selector_requirement && key == "values");
            if unordered {
                if let JsonValue::Array(items) = &mut value {
                    items.sort_by_cached_key(|item| item.to_string());
                }
            }
            (key, value)
        })
        .collect();

    entries.sort_by(|(a, _), (b, _)| {
        rank(order, a)
            .cmp(&rank(order, b))
            .then_with(|| a.cmp(b))
    });
    entries.into_iter().collect()
}

fn rank(order: &[&str], key: &str) -> usize {
    order
        .iter()
        .position(|k| *k == key)
        .unwrap_or(order.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(value: &JsonValue) -> Vec<&str> {
        value
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn canonical(yaml: &str) -> Document {
        let mut doc = Document::from_yaml(yaml).unwrap();
        canonicalize(&mut doc);
        doc
    }

    #[test]
    fn test_key_order() {
        let doc = canonical(
            r#"
zeta: 1
status: {}
spec:
  replicas: 1
  selector: {}
metadata:
  labels: {b: "2", a: "1"}
  namespace: shop
  name: web
kind: Deployment
apiVersion: apps/v1
alpha: true
"#,
        );
        let root = doc.as_value();
        assert_eq!(
            keys(root),
            vec!["apiVersion", "kind", "metadata", "spec", "status", "alpha", "zeta"]
        );
        assert_eq!(keys(&root["metadata"]), vec!["name", "namespace", "labels"]);
        assert_eq!(keys(&root["metadata"]["labels"]), vec!["a", "b"]);
        assert_eq!(keys(&root["spec"]), vec!["replicas", "selector"]);
    }

    #[test]
    fn test_containers_keep_order_and_put_name_first() {
        let doc = canonical(
            r#"
apiVersion: v1
kind: Pod
metadata: {name: p}
spec:
  containers:
    - image: b:1
      name: second
    - image: a:1
      name: first
      env:
        - value: "1"
          name: B
        - value: "2"
          name: A
"#,
        );
        let containers = doc.get("spec.containers").unwrap();
        assert_eq!(containers[0]["name"], "second");
        assert_eq!(containers[1]["name"], "first");
        assert_eq!(keys(&containers[0]), vec!["name", "image"]);
        assert_eq!(keys(&containers[1]), vec!["name", "env", "image"]);
        assert_eq!(containers[1]["env"][0]["name"], "B");
    }

    #[test]
    fn test_unordered_fields_are_sorted() {
        let doc = canonical(
            r#"
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata: {name: r}
rules:
  - verbs: [watch, get, list]
    resources: [pods, configmaps]
    apiGroups: [""]
"#,
        );
        assert_eq!(doc.get("rules[0].verbs"), Some(&json!(["get", "list", "watch"])));
        assert_eq!(doc.get("rules[0].resources"), Some(&json!(["configmaps", "pods"])));
        assert_eq!(keys(doc.get("rules[0]").unwrap()), vec!["apiGroups", "resources", "verbs"]);

        let doc = canonical(
            r#"
apiVersion: apps/v1
kind: Deployment
metadata: {name: d}
spec:
  selector:
    matchExpressions:
      - {key: tier, operator: In, values: [web, api]}
      - {key: app, operator: Exists}
"#,
        );
        let exprs = doc.get("spec.selector.matchExpressions").unwrap();
        assert_eq!(exprs[0]["key"], "app");
        assert_eq!(exprs[1]["values"], json!(["api", "web"]));
    }

    #[test]
    fn test_container_resources_mapping_untouched() {
        let doc = canonical(
            r#"
apiVersion: v1
kind: Pod
metadata: {name: p}
spec:
  containers:
    - name: c
      resources: {limits: {memory: 1Gi}, requests: {cpu: "1"}}
      args: [--z, --a]
"#,
        );
        assert_eq!(doc.get("spec.containers[0].args"), Some(&json!(["--z", "--a"])));
        assert_eq!(doc.get_str("spec.containers[0].resources.limits.memory"), Some("1Gi"));
    }

    #[test]
    fn test_idempotent() {
        let once = canonical(
            r#"
kind: ConfigMap
apiVersion: v1
data: {z: "1", a: "2"}
metadata: {annotations: {x: y}, name: cfg}
"#,
        );
        let mut twice = once.clone();
        canonicalize(&mut twice);
        assert_eq!(once.as_value(), twice.as_value());
        assert_eq!(once.to_yaml().unwrap(), twice.to_yaml().unwrap());
    }

    #[test]
    fn test_values_unchanged() {
        let value = json!({"kind": "X", "apiVersion": "v1", "spec": {"n": 1.5, "flag": false, "s": "007"}});
        let canonical = canonicalize_value(value.clone());
        assert_eq!(canonical, value);
    }
}
