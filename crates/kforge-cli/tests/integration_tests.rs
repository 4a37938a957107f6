//! Integration tests for CLI commands

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to run kforge command in a project directory
fn kforge(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kforge"))
        .args(args)
        .current_dir(dir)
        .env_remove("KFORGE_PROJECT")
        .env_remove("KFORGE_CLUSTER_VERSION")
        .env_remove("KFORGE_DISTRIBUTION")
        .env_remove("KFORGE_ENVIRONMENT")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute kforge")
}

fn write(dir: &Path, path: &str, content: &str) {
    let full = dir.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

const DEPLOYMENT: &str = r#"apiVersion: apps/v1
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
"#;

const CONFIG: &str = r#"kind: ConfigMap
apiVersion: v1
data:
  mode: fast
metadata:
  namespace: shop
  name: web
"#;

/// Project with two components, `app` depending on `config`
fn shop_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app/deployment.yaml", DEPLOYMENT);
    write(dir.path(), "config/configmap.yaml", CONFIG);
    write(
        dir.path(),
        "kforge.yaml",
        r#"cluster:
  clusterVersion: "1.30"
components:
  - name: app
    dependsOn: [config]
    manifests: [app]
  - name: config
    manifests: [config/configmap.yaml]
"#,
    );
    dir
}

mod build_command {
    use super::*;

    #[test]
    fn test_build_to_stdout() {
        let project = shop_project();
        let output = kforge(project.path(), &["build"]);

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        insta::assert_snapshot!(stdout, @r"
        apiVersion: v1
        kind: Namespace
        metadata:
          name: shop
        ---
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: web
          namespace: shop
        data:
          mode: fast
        ---
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
        ");
    }

    #[test]
    fn test_build_is_reproducible() {
        let project = shop_project();
        let first = kforge(project.path(), &["build"]);
        let second = kforge(project.path(), &["build"]);
        assert_eq!(first.stdout, second.stdout);
    }

    #[test]
    fn test_build_to_file() {
        let project = shop_project();
        let output = kforge(project.path(), &["build", "-o", "out.yaml"]);

        assert!(output.status.success());
        let written = fs::read_to_string(project.path().join("out.yaml")).unwrap();
        assert!(written.contains("kind: Deployment"));
        assert!(String::from_utf8_lossy(&output.stderr).contains("3 documents"));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_build_with_project_path() {
        let project = shop_project();
        let elsewhere = TempDir::new().unwrap();
        let path = project.path().join("kforge.yaml");
        let output = kforge(elsewhere.path(), &["build", "-p", path.to_str().unwrap()]);

        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("kind: ConfigMap"));
    }

    #[test]
    fn test_build_namespace_flag() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "cm.yaml",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n",
        );
        write(
            dir.path(),
            "kforge.yaml",
            "namespace: from-project\ncomponents:\n  - name: app\n    manifests: [cm.yaml]\n",
        );

        let output = kforge(dir.path(), &["build"]);
        assert!(String::from_utf8_lossy(&output.stdout).contains("namespace: from-project"));

        let output = kforge(dir.path(), &["build", "-n", "from-flag"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("namespace: from-flag"));
        assert!(!stdout.contains("from-project"));
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_missing_project_file() {
        let dir = TempDir::new().unwrap();
        let output = kforge(dir.path(), &["build"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_missing_dependency() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "cm.yaml", CONFIG);
        write(
            dir.path(),
            "kforge.yaml",
            "components:\n  - name: B\n    dependsOn: [A]\n    manifests: [cm.yaml]\n",
        );

        let output = kforge(dir.path(), &["build"]);
        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("'B'"));
        assert!(stderr.contains("'A'"));
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_duplicate_document() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/cm.yaml", CONFIG);
        write(dir.path(), "b/cm.yaml", CONFIG);
        write(
            dir.path(),
            "kforge.yaml",
            "components:\n  - name: a\n    manifests: [a]\n  - name: b\n    manifests: [b]\n",
        );

        let output = kforge(dir.path(), &["build"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("duplicate"));
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.yaml", "apiVersion: v1\nkind: [unclosed\n");
        write(
            dir.path(),
            "kforge.yaml",
            "components:\n  - name: broken\n    manifests: [bad.yaml]\n",
        );

        let output = kforge(dir.path(), &["build"]);
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_circular_document_references() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "cms.yaml",
            r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: a
  namespace: shop
  annotations:
    kforge.io/depends-on: ConfigMap/b
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: b
  namespace: shop
  annotations:
    kforge.io/depends-on: ConfigMap/a
"#,
        );
        write(
            dir.path(),
            "kforge.yaml",
            "components:\n  - name: app\n    manifests: [cms.yaml]\n",
        );

        let output = kforge(dir.path(), &["build"]);
        assert_eq!(output.status.code(), Some(4));
    }

    #[test]
    fn test_apply_build_error_needs_no_cluster() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "kforge.yaml",
            "components:\n  - name: x\n    dependsOn: [y]\n  - name: y\n    dependsOn: [x]\n",
        );

        let output = Command::new(env!("CARGO_BIN_EXE_kforge"))
            .args(["apply", "--yes"])
            .current_dir(dir.path())
            .env("KUBECONFIG", dir.path().join("missing-kubeconfig"))
            .env_remove("KFORGE_PROJECT")
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute kforge");

        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("cycle"));
    }

    #[test]
    fn test_invalid_environment_flag() {
        let project = shop_project();
        let output = kforge(project.path(), &["build", "--environment", "qa"]);
        assert!(!output.status.success());
    }
}
