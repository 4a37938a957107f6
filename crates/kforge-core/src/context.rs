//! Target cluster identity passed into a builder at construction

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Classification of the target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    Test,
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentType::Test => write!(f, "test"),
            EnvironmentType::Development => write!(f, "development"),
            EnvironmentType::Staging => write!(f, "staging"),
            EnvironmentType::Production => write!(f, "production"),
        }
    }
}

impl FromStr for EnvironmentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(EnvironmentType::Test),
            "dev" | "development" => Ok(EnvironmentType::Development),
            "staging" => Ok(EnvironmentType::Staging),
            "prod" | "production" => Ok(EnvironmentType::Production),
            other => Err(format!(
                "unknown environment '{}' (expected test, development, staging or production)",
                other
            )),
        }
    }
}

/// Cluster the manifests are generated for
///
/// Only used by components to select variants; the builder itself does not
/// interpret these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterContext {
    /// Kubernetes version, e.g. "1.31" or "v1.30.2+k3s1"
    #[serde(default = "default_cluster_version")]
    pub cluster_version: String,

    /// Distribution name, e.g. "kubernetes", "k3s", "openshift"
    #[serde(default = "default_distribution")]
    pub distribution: String,

    #[serde(default)]
    pub environment: EnvironmentType,
}

fn default_cluster_version() -> String {
    "1.31".to_string()
}

fn default_distribution() -> String {
    "kubernetes".to_string()
}

impl Default for ClusterContext {
    fn default() -> Self {
        Self {
            cluster_version: default_cluster_version(),
            distribution: default_distribution(),
            environment: EnvironmentType::default(),
        }
    }
}

impl ClusterContext {
    pub fn new(
        cluster_version: impl Into<String>,
        distribution: impl Into<String>,
        environment: EnvironmentType,
    ) -> Self {
        Self {
            cluster_version: cluster_version.into(),
            distribution: distribution.into(),
            environment,
        }
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CoreError::Parse {
            index: 0,
            fragment: crate::manifest::fragment_of(yaml),
            message: e.to_string(),
        })
    }

    /// Parsed cluster version
    ///
    /// Accepts a leading `v`, missing minor/patch components and build
    /// metadata (`1.30`, `v1.30.2`, `1.30.2+k3s1`).
    pub fn version(&self) -> Option<Version> {
        let raw = self.cluster_version.trim().trim_start_matches('v');
        let (core, suffix) = match raw.find(['-', '+']) {
            Some(idx) => raw.split_at(idx),
            None => (raw, ""),
        };

        let mut parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        while parts.len() < 3 {
            parts.push("0");
        }

        Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
    }

    /// Check if the cluster is at least `major.minor`
    pub fn at_least(&self, major: u64, minor: u64) -> bool {
        self.version()
            .map(|v| (v.major, v.minor) >= (major, minor))
            .unwrap_or(false)
    }

    pub fn is_production(&self) -> bool {
        self.environment == EnvironmentType::Production
    }
}
