//! Namespace synthesis and CRD collection
//!
//! Both passes are pure functions of the document set and safe to run more
//! than once.

use std::collections::BTreeSet;

use crate::document::{CrdRef, Document, DocumentKey};
use crate::error::Result;
use crate::kinds;
use crate::set::DocumentSet;

/// Source name recorded for synthesized documents
pub const SYNTHESIZED_SOURCE: &str = "namespace-synthesis";

/// Add a minimal Namespace document for every referenced namespace that has
/// none
///
/// Returns the names of the synthesized namespaces, sorted. A namespace set
/// on a cluster-scoped document is ignored.
pub fn synthesize_namespaces(documents: &mut DocumentSet) -> Result<Vec<String>> {
    let crds = defined_crds(documents.iter());
    let referenced: BTreeSet<String> = documents
        .iter()
        .filter(|doc| is_namespaced(doc, &crds))
        .filter_map(|doc| doc.namespace_name())
        .map(String::from)
        .collect();

    let mut synthesized = Vec::new();
    for namespace in referenced {
        let key = DocumentKey::new(kinds::NAMESPACE, None, namespace.as_str());
        if documents.contains(&key) {
            continue;
        }

        let mut doc = Document::namespace(namespace.as_str());
        doc.markers_mut().synthesized = true;
        documents.insert(doc, SYNTHESIZED_SOURCE)?;
        tracing::debug!(namespace = %namespace, "synthesized namespace");
        synthesized.push(namespace);
    }

    Ok(synthesized)
}

/// Read the custom resource type a CRD document defines
///
/// Returns `None` (and logs) when `spec.group` or `spec.names.kind` is
/// missing.
pub fn crd_ref(doc: &Document) -> Option<CrdRef> {
    if !doc.is_crd() {
        return None;
    }

    let group = doc.get_str("spec.group");
    let kind = doc.get_str("spec.names.kind");
    let (Some(group), Some(kind)) = (group, kind) else {
        tracing::warn!(
            crd = doc.name(),
            "CustomResourceDefinition without spec.group or spec.names.kind, not collected"
        );
        return None;
    };

    let mut versions: Vec<String> = doc
        .get("spec.versions")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    // apiextensions.k8s.io/v1beta1 single-version form
    if let Some(version) = doc.get_str("spec.version") {
        if !versions.iter().any(|v| v == version) {
            versions.push(version.to_string());
        }
    }

    Some(CrdRef {
        name: doc.name().to_string(),
        group: group.to_string(),
        kind: kind.to_string(),
        versions,
        namespaced: doc.get_str("spec.scope") != Some("Cluster"),
    })
}

/// All custom resource types defined in a set
pub fn defined_crds<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Vec<CrdRef> {
    documents.into_iter().filter_map(crd_ref).collect()
}

/// Mark CRD documents and the custom resources that depend on them
///
/// Returns the number of custom resources marked.
pub fn collect_crds(documents: &mut DocumentSet) -> usize {
    let crds = defined_crds(documents.iter());
    let mut marked = 0;

    for doc in documents.iter_mut() {
        if doc.is_crd() {
            let defined = crds.iter().find(|c| c.name == doc.name()).cloned();
            doc.markers_mut().defines_crd = defined;
            continue;
        }

        let required = crds
            .iter()
            .find(|c| c.matches(doc.api_version(), doc.kind()))
            .cloned();
        if required.is_some() {
            marked += 1;
        }
        doc.markers_mut().requires_crd = required;
    }

    tracing::debug!(crds = crds.len(), custom_resources = marked, "collected CRDs");
    marked
}

/// Whether a document of this kind lives in a namespace
///
/// Built-in kinds use the static table, custom resources the scope of their
/// CRD when it is part of `crds`. Unknown custom kinds are assumed
/// namespaced.
pub fn is_namespaced(doc: &Document, crds: &[CrdRef]) -> bool {
    if let Some(crd) = crds.iter().find(|c| c.matches(doc.api_version(), doc.kind())) {
        return crd.namespaced;
    }
    !kinds::is_cluster_scoped(doc.kind())
}

/// Give every namespaced document without a namespace the default one
///
/// Returns the number of documents changed.
pub fn apply_default_namespace(documents: &mut DocumentSet, namespace: &str) -> Result<usize> {
    let crds = defined_crds(documents.iter());
    let mut changed = 0;

    for doc in documents.iter_mut() {
        if doc.namespace_name().is_none() && is_namespaced(doc, &crds) {
            doc.set_namespace(Some(namespace));
            changed += 1;
        }
    }

    if changed > 0 {
        documents.rekey()?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRD: &str = r#"
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  scope: Namespaced
  names:
    kind: Widget
    plural: widgets
  versions:
    - name: v1
      served: true
      storage: true
"#;

    fn set_of(docs: Vec<Document>) -> DocumentSet {
        let mut set = DocumentSet::new();
        for doc in docs {
            set.insert(doc, "test").unwrap();
        }
        set
    }

    #[test]
    fn test_synthesize_namespaces() {
        let mut set = set_of(vec![
            Document::new("v1", "Pod", "a").with_namespace("ns-a"),
            Document::new("v1", "Pod", "b").with_namespace("ns-a"),
            Document::new("v1", "Pod", "c").with_namespace("ns-b"),
            Document::namespace("ns-b"),
        ]);

        let created = synthesize_namespaces(&mut set).unwrap();
        assert_eq!(created, vec!["ns-a"]);
        assert_eq!(set.len(), 5);

        let ns = set
            .get(&DocumentKey::new("Namespace", None, "ns-a"))
            .unwrap();
        assert!(ns.markers().synthesized);
        assert!(ns.get("metadata.labels").is_none());
        assert_eq!(set.source_of(&ns.key()), Some(SYNTHESIZED_SOURCE));

        let existing = set
            .get(&DocumentKey::new("Namespace", None, "ns-b"))
            .unwrap();
        assert!(!existing.markers().synthesized);
    }

    #[test]
    fn test_synthesize_namespaces_idempotent() {
        let mut set = set_of(vec![Document::new("v1", "Pod", "a").with_namespace("ns-a")]);
        synthesize_namespaces(&mut set).unwrap();
        let created = synthesize_namespaces(&mut set).unwrap();
        assert!(created.is_empty());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_cluster_scoped_namespace_is_ignored() {
        let cluster_crd = CRD
            .replace("scope: Namespaced", "scope: Cluster")
            .replace("kind: Widget", "kind: Gadget");
        let mut set = set_of(vec![
            Document::new("rbac.authorization.k8s.io/v1", "ClusterRole", "reader")
                .with_namespace("stray"),
            Document::from_yaml(&cluster_crd).unwrap(),
            Document::new("example.com/v1", "Gadget", "g").with_namespace("also-stray"),
            Document::new("v1", "ConfigMap", "cfg").with_namespace("real"),
        ]);

        assert_eq!(synthesize_namespaces(&mut set).unwrap(), vec!["real"]);
        assert!(!set.contains(&DocumentKey::new("Namespace", None, "stray")));
    }

    #[test]
    fn test_crd_ref() {
        let crd = crd_ref(&Document::from_yaml(CRD).unwrap()).unwrap();
        assert_eq!(crd.group, "example.com");
        assert_eq!(crd.kind, "Widget");
        assert_eq!(crd.versions, vec!["v1"]);
        assert!(crd.namespaced);

        let broken = Document::new(
            "apiextensions.k8s.io/v1",
            "CustomResourceDefinition",
            "broken.example.com",
        );
        assert!(crd_ref(&broken).is_none());
        assert!(crd_ref(&Document::new("v1", "ConfigMap", "x")).is_none());
    }

    #[test]
    fn test_collect_crds_marks_instances() {
        let mut set = set_of(vec![
            Document::new("example.com/v1", "Widget", "w").with_namespace("x"),
            Document::from_yaml(CRD).unwrap(),
            Document::new("example.com/v2", "Widget", "other-version"),
            Document::new("v1", "ConfigMap", "plain"),
        ]);

        assert_eq!(collect_crds(&mut set), 1);
        // Running again changes nothing
        assert_eq!(collect_crds(&mut set), 1);

        let widget = set
            .get(&DocumentKey::new("Widget", Some("x"), "w"))
            .unwrap();
        assert_eq!(
            widget.markers().requires_crd.as_ref().map(|c| c.name.as_str()),
            Some("widgets.example.com")
        );
        let crd = set
            .get(&DocumentKey::new(
                "CustomResourceDefinition",
                None,
                "widgets.example.com",
            ))
            .unwrap();
        assert!(crd.markers().defines_crd.is_some());
        let plain = set
            .get(&DocumentKey::new("ConfigMap", None, "plain"))
            .unwrap();
        assert!(plain.markers().requires_crd.is_none());
    }

    #[test]
    fn test_apply_default_namespace() {
        let cluster_crd = CRD
            .replace("scope: Namespaced", "scope: Cluster")
            .replace("widgets.example.com", "gadgets.example.com")
            .replace("kind: Widget", "kind: Gadget");
        let mut set = set_of(vec![
            Document::new("v1", "ConfigMap", "cfg"),
            Document::new("v1", "Secret", "kept").with_namespace("other"),
            Document::new("rbac.authorization.k8s.io/v1", "ClusterRole", "reader"),
            Document::from_yaml(&cluster_crd).unwrap(),
            Document::new("example.com/v1", "Gadget", "g"),
            Document::new("unknown.io/v1", "Thing", "t"),
        ]);

        assert_eq!(apply_default_namespace(&mut set, "prod").unwrap(), 2);
        assert!(set.contains(&DocumentKey::new("ConfigMap", Some("prod"), "cfg")));
        assert!(set.contains(&DocumentKey::new("Thing", Some("prod"), "t")));
        assert!(set.contains(&DocumentKey::new("Secret", Some("other"), "kept")));
        assert!(set.contains(&DocumentKey::new("ClusterRole", None, "reader")));
        assert!(set.contains(&DocumentKey::new("Gadget", None, "g")));
    }
}
