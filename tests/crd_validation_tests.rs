//! # CRD Validation Tests
//!
//! Deserialize sample resources to catch schema drift early.

use global_config_controller::crd::{GlobalConfig, GlobalSecret, SecretType};
use kube::core::CustomResourceExt;

#[test]
fn test_global_config_from_yaml() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalConfig
metadata:
  name: platform-endpoints
  namespace: platform
spec:
  namespaces:
    avoidregex: ["^kube-"]
    matchregex: [".*"]
  data:
    LOG_ENDPOINT: https://logs.internal
    TRACE_SAMPLE_RATE: "0.1"
"#;

    let config: GlobalConfig = serde_yaml::from_str(yaml).expect("Should deserialize GlobalConfig");
    assert_eq!(config.spec.namespaces.avoid_regex, vec!["^kube-"]);
    assert_eq!(config.spec.namespaces.match_regex, vec![".*"]);
    assert_eq!(
        config.spec.data.get("TRACE_SAMPLE_RATE").map(String::as_str),
        Some("0.1")
    );
    assert!(config.status.is_none());
}

#[test]
fn test_global_config_defaults() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalConfig
metadata:
  name: empty
  namespace: platform
spec:
  namespaces: {}
"#;

    let config: GlobalConfig = serde_yaml::from_str(yaml).expect("Should deserialize with defaults");
    assert!(config.spec.namespaces.avoid_regex.is_empty());
    assert!(config.spec.namespaces.match_regex.is_empty());
    assert!(config.spec.data.is_empty());
}

#[test]
fn test_global_secret_from_yaml() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalSecret
metadata:
  name: registry-credentials
  namespace: platform
spec:
  immutable: true
  type: kubernetes.io/dockerconfigjson
  namespaces:
    matchregex: ["^team-"]
  data:
    .dockerconfigjson: eyJhdXRocyI6e319
"#;

    let secret: GlobalSecret = serde_yaml::from_str(yaml).expect("Should deserialize GlobalSecret");
    assert!(secret.spec.immutable);
    assert_eq!(secret.spec.secret_type, SecretType::DockerConfigJson);
    assert!(secret.spec.namespaces.avoid_regex.is_empty());
    assert!(secret.spec.data.contains_key(".dockerconfigjson"));
}

#[test]
fn test_global_secret_type_defaults_to_opaque() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalSecret
metadata:
  name: token
  namespace: platform
spec:
  namespaces:
    matchregex: [".*"]
  data:
    token: YWJj
"#;

    let secret: GlobalSecret = serde_yaml::from_str(yaml).expect("Should deserialize GlobalSecret");
    assert_eq!(secret.spec.secret_type, SecretType::Opaque);
    assert!(!secret.spec.immutable);
}

#[test]
fn test_unknown_secret_type_is_rejected() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalSecret
metadata:
  name: token
  namespace: platform
spec:
  type: example.com/custom
  namespaces: {}
"#;

    assert!(serde_yaml::from_str::<GlobalSecret>(yaml).is_err());
}

#[test]
fn test_status_round_trips_camel_case() {
    let yaml = r#"
apiVersion: globals.octopilot.io/v1beta2
kind: GlobalConfig
metadata:
  name: settings
  namespace: default
spec:
  namespaces:
    matchregex: ["^team-"]
status:
  observedGeneration: 3
  matchedNamespaces: 2
  avoidedNamespaces: 5
  conditions:
    - type: Ready
      status: "True"
      reason: Reconciled
  deployed:
    - namespace: team-a
      name: settings
      version: "3"
"#;

    let config: GlobalConfig = serde_yaml::from_str(yaml).expect("Should deserialize status");
    let status = config.status.expect("status present");
    assert_eq!(status.observed_generation, Some(3));
    assert_eq!(status.matched_namespaces, Some(2));
    assert_eq!(status.condition("Ready").unwrap().status, "True");
    assert_eq!(status.deployed[0].version, "3");
}

#[test]
fn test_generated_crds() {
    let config_crd = GlobalConfig::crd();
    assert_eq!(config_crd.spec.group, "globals.octopilot.io");
    assert_eq!(config_crd.spec.names.kind, "GlobalConfig");
    assert_eq!(config_crd.spec.scope, "Namespaced");
    assert_eq!(config_crd.spec.versions[0].name, "v1beta2");
    assert!(config_crd.spec.versions[0].subresources.is_some());

    let secret_crd = GlobalSecret::crd();
    assert_eq!(secret_crd.spec.names.kind, "GlobalSecret");
    let short_names = secret_crd.spec.names.short_names.unwrap_or_default();
    assert!(short_names.contains(&"gs".to_string()));
    assert!(short_names.contains(&"gss".to_string()));
}
