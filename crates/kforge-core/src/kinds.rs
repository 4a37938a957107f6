//! Well-known kinds and typed accessors over the generic [`Document`]
//!
//! Rather than one Rust type per Kubernetes kind, documents carry a `kind`
//! discriminator and these helpers know where kind-specific fields live.

use serde_json::Value as JsonValue;

use crate::document::Document;

pub const NAMESPACE: &str = "Namespace";
pub const CUSTOM_RESOURCE_DEFINITION: &str = "CustomResourceDefinition";
pub const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";
pub const SERVICE_ACCOUNT: &str = "ServiceAccount";
pub const ROLE: &str = "Role";
pub const CLUSTER_ROLE: &str = "ClusterRole";
pub const ROLE_BINDING: &str = "RoleBinding";
pub const CLUSTER_ROLE_BINDING: &str = "ClusterRoleBinding";

/// Built-in kinds that are not namespaced
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "PersistentVolume",
    "StorageClass",
    "CSIDriver",
    "CSINode",
    "VolumeAttachment",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "APIService",
    "PriorityClass",
    "RuntimeClass",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
    "ValidatingAdmissionPolicy",
    "ValidatingAdmissionPolicyBinding",
    "CertificateSigningRequest",
    "FlowSchema",
    "PriorityLevelConfiguration",
];

/// Check whether a built-in kind is cluster-scoped
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Path of the pod spec inside a workload of the given kind
pub fn pod_spec_path(kind: &str) -> Option<&'static str> {
    match kind {
        "Pod" => Some("spec"),
        "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Job" => {
            Some("spec.template.spec")
        }
        "CronJob" => Some("spec.jobTemplate.spec.template.spec"),
        _ => None,
    }
}

impl Document {
    /// Pod spec for workload kinds
    pub fn pod_spec(&self) -> Option<&JsonValue> {
        pod_spec_path(self.kind()).and_then(|path| self.get(path))
    }

    /// Containers of a workload, in declaration order
    pub fn containers(&self) -> Vec<&JsonValue> {
        self.pod_spec()
            .and_then(|spec| spec.get("containers"))
            .and_then(|c| c.as_array())
            .map(|items| items.iter().collect())
            .unwrap_or_default()
    }

    /// `spec.serviceAccountName` of the pod template, if any
    pub fn service_account_name(&self) -> Option<&str> {
        self.pod_spec()
            .and_then(|spec| spec.get("serviceAccountName"))
            .and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_scoped() {
        assert!(is_cluster_scoped("Namespace"));
        assert!(is_cluster_scoped("ClusterRole"));
        assert!(is_cluster_scoped("CustomResourceDefinition"));
        assert!(!is_cluster_scoped("Deployment"));
        assert!(!is_cluster_scoped("ConfigMap"));
    }

    #[test]
    fn test_containers_per_kind() {
        let cron = Document::new("batch/v1", "CronJob", "nightly")
            .with(
                "spec.jobTemplate.spec.template.spec.containers[0].name",
                "report",
            )
            .unwrap();
        assert_eq!(cron.containers().len(), 1);
        assert_eq!(cron.containers()[0]["name"], "report");

        let pod = Document::new("v1", "Pod", "p")
            .with("spec.containers[0].name", "a")
            .unwrap()
            .with("spec.containers[1].name", "b")
            .unwrap()
            .with("spec.serviceAccountName", "runner")
            .unwrap();
        let names: Vec<_> = pod.containers().iter().map(|c| c["name"].clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(pod.service_account_name(), Some("runner"));

        let cm = Document::new("v1", "ConfigMap", "c");
        assert!(cm.containers().is_empty());
        assert!(cm.pod_spec().is_none());
    }
}
