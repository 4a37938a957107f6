//! Resource categories used as the default apply ordering
//!
//! Resources are applied from lowest to highest category value so that
//! prerequisites (CRDs, namespaces, RBAC, configuration) exist before the
//! workloads that use them. Explicit dependency edges always win over
//! categories; categories only break ties between independent documents.

use crate::document::split_api_version;

/// Resource category for ordering during apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceCategory {
    /// CustomResourceDefinition - applied first
    Crd = 0,
    /// Namespace - created before namespace-scoped resources
    Namespace = 1,
    /// ResourceQuota, LimitRange
    NamespaceConfig = 2,
    /// ClusterRole, ClusterRoleBinding
    ClusterRbac = 10,
    /// Role, RoleBinding, ServiceAccount
    NamespacedRbac = 11,
    /// ConfigMap, Secret
    Config = 20,
    /// PersistentVolume, PersistentVolumeClaim, StorageClass
    Storage = 21,
    /// NetworkPolicy, Service, Endpoints, Ingress
    Network = 30,
    /// Deployment, StatefulSet, DaemonSet, ReplicaSet, Pod
    Workload = 40,
    /// Job, CronJob
    Batch = 50,
    /// HorizontalPodAutoscaler, VerticalPodAutoscaler, PodDisruptionBudget
    Autoscaling = 60,
    /// Custom Resources (using CRDs)
    CustomResource = 70,
    /// Everything else
    Other = 100,
}

/// API groups served by Kubernetes itself
const CORE_GROUPS: &[&str] = &[
    "",
    "apps",
    "batch",
    "autoscaling",
    "policy",
    "networking.k8s.io",
    "rbac.authorization.k8s.io",
    "storage.k8s.io",
    "admissionregistration.k8s.io",
    "apiextensions.k8s.io",
    "apiregistration.k8s.io",
    "certificates.k8s.io",
    "coordination.k8s.io",
    "discovery.k8s.io",
    "events.k8s.io",
    "flowcontrol.apiserver.k8s.io",
    "node.k8s.io",
    "scheduling.k8s.io",
];

impl ResourceCategory {
    /// Categorize a resource by its kind and apiVersion
    pub fn from_resource(kind: &str, api_version: &str) -> Self {
        match kind {
            "CustomResourceDefinition" => Self::Crd,
            "Namespace" => Self::Namespace,
            "ResourceQuota" | "LimitRange" => Self::NamespaceConfig,
            "ClusterRole" | "ClusterRoleBinding" => Self::ClusterRbac,
            "Role" | "RoleBinding" | "ServiceAccount" => Self::NamespacedRbac,
            "ConfigMap" | "Secret" => Self::Config,
            "PersistentVolume" | "PersistentVolumeClaim" | "StorageClass" => Self::Storage,
            "NetworkPolicy" | "Service" | "Endpoints" | "Ingress" | "IngressClass" => Self::Network,
            "Deployment" | "StatefulSet" | "DaemonSet" | "ReplicaSet" | "Pod" => Self::Workload,
            "Job" | "CronJob" => Self::Batch,
            "HorizontalPodAutoscaler" | "VerticalPodAutoscaler" | "PodDisruptionBudget" => {
                Self::Autoscaling
            }
            _ if Self::is_custom_api_version(api_version) => Self::CustomResource,
            _ => Self::Other,
        }
    }

    /// Check if an apiVersion belongs to a non built-in API group
    ///
    /// Core APIs: v1, apps/v1, batch/v1, etc.
    /// Custom APIs: mygroup.example.com/v1, stable.example.com/v1beta1
    pub fn is_custom_api_version(api_version: &str) -> bool {
        let (group, _) = split_api_version(api_version);
        !CORE_GROUPS.contains(&group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_category_ordering() {
        assert!(ResourceCategory::Crd < ResourceCategory::Namespace);
        assert!(ResourceCategory::Namespace < ResourceCategory::ClusterRbac);
        assert!(ResourceCategory::ClusterRbac < ResourceCategory::Config);
        assert!(ResourceCategory::Config < ResourceCategory::Workload);
        assert!(ResourceCategory::Workload < ResourceCategory::CustomResource);
    }

    #[test]
    fn test_resource_category_builtin() {
        assert_eq!(
            ResourceCategory::from_resource("CustomResourceDefinition", "apiextensions.k8s.io/v1"),
            ResourceCategory::Crd
        );
        assert_eq!(
            ResourceCategory::from_resource("Namespace", "v1"),
            ResourceCategory::Namespace
        );
        assert_eq!(
            ResourceCategory::from_resource("ServiceAccount", "v1"),
            ResourceCategory::NamespacedRbac
        );
        assert_eq!(
            ResourceCategory::from_resource("StatefulSet", "apps/v1"),
            ResourceCategory::Workload
        );
    }

    #[test]
    fn test_resource_category_custom_resource() {
        assert_eq!(
            ResourceCategory::from_resource("Certificate", "cert-manager.io/v1"),
            ResourceCategory::CustomResource
        );
        assert_eq!(
            ResourceCategory::from_resource("VirtualService", "networking.istio.io/v1beta1"),
            ResourceCategory::CustomResource
        );
        assert_eq!(
            ResourceCategory::from_resource("Lease", "coordination.k8s.io/v1"),
            ResourceCategory::Other
        );
    }
}
