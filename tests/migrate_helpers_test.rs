//! Unit tests for the pure pieces of the migration engine.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, PodSpec, SecretVolumeSource, Volume};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::ObjectMeta;

use velero_migrate::config::RestoreOptions;
use velero_migrate::crd::backup_storage_location::{
    BackupStorageLocation, BackupStorageLocationSpec, BackupStorageLocationStatus,
    ObjectStorageLocation, equivalent, readonly_clone_name, readonly_credentials_name,
    stage_readonly,
};
use velero_migrate::crd::restore::{
    RestoreSpec, TerminalState, is_terminal, or_label_clauses, terminal_state,
};
use velero_migrate::crd::shared::SecretKeySelector;
use velero_migrate::error::Error;
use velero_migrate::helm::{HelmRelease, select_release};
use velero_migrate::migrate::credentials::server_pod_secret_name;
use velero_migrate::migrate::storage_class::{
    default_storage_class, merge_mappings, remap_config_map,
};

/// Build a storage location with the given bucket and provider config.
fn test_location(name: &str, bucket: &str, config: &[(&str, &str)]) -> BackupStorageLocation {
    let spec = BackupStorageLocationSpec {
        provider: "aws".to_string(),
        object_storage: Some(ObjectStorageLocation {
            bucket: bucket.to_string(),
            prefix: None,
            ca_cert: None,
        }),
        config: config
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        credential: None,
        access_mode: None,
        is_default: None,
    };
    let mut location = BackupStorageLocation::new(name, spec);
    location.metadata.namespace = Some("velero".to_string());
    location
}

fn available(mut location: BackupStorageLocation) -> BackupStorageLocation {
    location.status = Some(BackupStorageLocationStatus {
        phase: Some("Available".to_string()),
    });
    location
}

// ── storage location equivalence ────────────────────────────────────────────

#[test]
fn test_equivalent_when_storage_and_config_match_and_source_available() {
    let source = available(test_location("loc-a", "b1", &[("region", "eu-1")]));
    let candidate = test_location("other-name", "b1", &[("region", "eu-1")]);
    assert!(equivalent(&source, &candidate));
}

#[test]
fn test_equivalent_ignores_candidate_phase() {
    let source = available(test_location("loc-a", "b1", &[]));
    // Candidate has no status at all; still counts.
    let candidate = test_location("loc-b", "b1", &[]);
    assert!(candidate.status.is_none());
    assert!(equivalent(&source, &candidate));
}

#[test]
fn test_not_equivalent_when_source_not_available() {
    let source = test_location("loc-a", "b1", &[]);
    let candidate = test_location("loc-b", "b1", &[]);
    assert!(!equivalent(&source, &candidate));

    let mut unavailable = test_location("loc-a", "b1", &[]);
    unavailable.status = Some(BackupStorageLocationStatus {
        phase: Some("Unavailable".to_string()),
    });
    assert!(!equivalent(&unavailable, &candidate));
}

#[test]
fn test_not_equivalent_when_config_differs() {
    let source = available(test_location("loc-a", "b1", &[("region", "eu-1")]));
    let candidate = test_location("loc-b", "b1", &[("region", "us-2")]);
    assert!(!equivalent(&source, &candidate));

    let missing_key = test_location("loc-c", "b1", &[]);
    assert!(!equivalent(&source, &missing_key));
}

#[test]
fn test_not_equivalent_when_bucket_differs() {
    let source = available(test_location("loc-a", "b1", &[]));
    let candidate = test_location("loc-b", "b2", &[]);
    assert!(!equivalent(&source, &candidate));
}

// ── clone naming and staging ────────────────────────────────────────────────

#[test]
fn test_readonly_names_derive_from_bucket() {
    assert_eq!(readonly_clone_name("b1"), "b1-readonly");
    assert_eq!(readonly_credentials_name("b1"), "b1-readonly-credentials");
}

#[test]
fn test_stage_readonly_forces_access_mode_and_default() {
    let mut location = test_location("loc-a", "b1", &[]);
    location.spec.access_mode = Some("ReadWrite".to_string());
    location.spec.is_default = Some(true);

    stage_readonly(&mut location.spec);
    assert_eq!(location.spec.access_mode.as_deref(), Some("ReadOnly"));
    assert_eq!(location.spec.is_default, Some(false));
}

// ── OR label selector construction ──────────────────────────────────────────

#[test]
fn test_or_label_clauses_one_clause_per_pair() {
    let labels = BTreeMap::from([
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
    ]);
    let clauses = or_label_clauses(&labels);
    assert_eq!(clauses.len(), 2);
    for clause in &clauses {
        assert_eq!(clause.match_labels.len(), 1);
    }
    let pairs: BTreeMap<String, String> = clauses
        .iter()
        .flat_map(|c| c.match_labels.clone())
        .collect();
    assert_eq!(pairs, labels);
}

#[test]
fn test_or_label_clauses_empty_input() {
    assert!(or_label_clauses(&BTreeMap::new()).is_empty());
}

// ── terminal phase classification ───────────────────────────────────────────

#[test]
fn test_terminal_state_classification() {
    assert_eq!(terminal_state("Completed"), Some(TerminalState::Success));
    assert_eq!(terminal_state("Failed"), Some(TerminalState::Failure));
    assert_eq!(
        terminal_state("PartiallyFailed"),
        Some(TerminalState::Failure)
    );
    assert_eq!(
        terminal_state("FailedValidation"),
        Some(TerminalState::Failure)
    );
    assert_eq!(terminal_state("InProgress"), None);
    assert_eq!(terminal_state("New"), None);
    assert_eq!(terminal_state(""), None);
}

#[test]
fn test_is_terminal() {
    assert!(is_terminal("Completed"));
    assert!(is_terminal("PartiallyFailed"));
    assert!(!is_terminal("InProgress"));
}

// ── restore spec wire shape ─────────────────────────────────────────────────

#[test]
fn test_restore_spec_minimal_serializes_only_backup_name() {
    let options = RestoreOptions {
        backup_name: "nightly".to_string(),
        ..Default::default()
    };
    let value = serde_json::to_value(RestoreSpec::from_options(&options)).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert_eq!(value["backupName"], "nightly");
}

#[test]
fn test_restore_spec_full_wire_shape() {
    let options = RestoreOptions {
        backup_name: "nightly".to_string(),
        item_operation_timeout: Some("4h".to_string()),
        included_namespaces: vec!["app".to_string()],
        label_selector: BTreeMap::from([("tier".to_string(), "web".to_string())]),
        or_label_selectors: BTreeMap::from([("a".to_string(), "1".to_string())]),
        namespace_mapping: BTreeMap::from([("app".to_string(), "app-restored".to_string())]),
        restore_pvs: Some(true),
        preserve_node_ports: Some(false),
        existing_resource_policy: Some("update".to_string()),
        ..Default::default()
    };
    let value = serde_json::to_value(RestoreSpec::from_options(&options)).unwrap();

    // Velero's exact field spellings.
    assert_eq!(value["restorePVs"], serde_json::json!(true));
    assert_eq!(value["preserveNodePorts"], serde_json::json!(false));
    assert_eq!(value["itemOperationTimeout"], "4h");
    assert_eq!(value["existingResourcePolicy"], "update");
    assert_eq!(value["includedNamespaces"][0], "app");
    assert_eq!(value["labelSelector"]["matchLabels"]["tier"], "web");
    assert_eq!(value["orLabelSelectors"][0]["matchLabels"]["a"], "1");
    assert_eq!(value["namespaceMapping"]["app"], "app-restored");

    // Unset options stay off the wire.
    assert!(value.get("scheduleName").is_none());
    assert!(value.get("includeClusterResources").is_none());
    assert!(value.get("excludedNamespaces").is_none());
}

// ── storage class mapping ───────────────────────────────────────────────────

fn test_class(name: &str, default: bool) -> StorageClass {
    let annotations = default.then(|| {
        BTreeMap::from([(
            "storageclass.kubernetes.io/is-default-class".to_string(),
            "true".to_string(),
        )])
    });
    StorageClass {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations,
            ..Default::default()
        },
        provisioner: "kubernetes.io/no-provisioner".to_string(),
        ..Default::default()
    }
}

const DEFAULT_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

#[test]
fn test_default_storage_class_picks_annotated() {
    let classes = [test_class("slow", false), test_class("fast", true)];
    assert_eq!(default_storage_class(&classes, DEFAULT_ANNOTATION), "fast");
}

#[test]
fn test_default_storage_class_empty_when_none_annotated() {
    let classes = [test_class("slow", false)];
    assert_eq!(default_storage_class(&classes, DEFAULT_ANNOTATION), "");
}

#[test]
fn test_merge_mappings_overwrites_existing_keys() {
    let mut data = BTreeMap::from([
        ("old-class".to_string(), "stale-default".to_string()),
        ("kept".to_string(), "kept-target".to_string()),
    ]);
    merge_mappings(
        &mut data,
        &["old-class".to_string(), "new-class".to_string()],
        "fast",
    );
    assert_eq!(data.len(), 3);
    assert_eq!(data["old-class"], "fast");
    assert_eq!(data["new-class"], "fast");
    assert_eq!(data["kept"], "kept-target");
}

#[test]
fn test_remap_config_map_carries_plugin_labels() {
    let cm = remap_config_map(
        "change-storage-class-config",
        "velero",
        &["standard".to_string()],
        "fast",
    );
    let labels = cm.metadata.labels.unwrap();
    assert_eq!(labels["velero.io/plugin-config"], "");
    assert_eq!(labels["velero.io/change-storage-class"], "RestoreItemAction");
    assert_eq!(cm.data.unwrap()["standard"], "fast");
}

// ── server pod secret extraction ────────────────────────────────────────────

fn test_pod(volumes: Vec<Volume>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some("velero-5c7b".to_string()),
            namespace: Some("velero".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn test_server_pod_secret_name_found() {
    let pod = test_pod(vec![
        Volume {
            name: "plugins".to_string(),
            ..Default::default()
        },
        Volume {
            name: "cloud-credentials".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some("velero-aws-creds".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]);
    let name = server_pod_secret_name(&pod, "cloud-credentials").unwrap();
    assert_eq!(name, "velero-aws-creds");
}

#[test]
fn test_server_pod_secret_name_missing_volume_is_an_error() {
    let pod = test_pod(vec![Volume {
        name: "plugins".to_string(),
        ..Default::default()
    }]);
    assert!(server_pod_secret_name(&pod, "cloud-credentials").is_err());
}

// ── credential rewrite target ───────────────────────────────────────────────

#[test]
fn test_secret_key_selector_round_trip() {
    let selector = SecretKeySelector {
        name: "b1-readonly-credentials".to_string(),
        key: "cloud".to_string(),
    };
    let value = serde_json::to_value(&selector).unwrap();
    assert_eq!(value["name"], "b1-readonly-credentials");
    assert_eq!(value["key"], "cloud");
}

// ── helm release selection ──────────────────────────────────────────────────

fn release(name: &str, chart: &str) -> HelmRelease {
    HelmRelease {
        name: name.to_string(),
        namespace: "velero".to_string(),
        chart: chart.to_string(),
    }
}

#[test]
fn test_chart_name_and_version_split() {
    let r = release("velero", "velero-5.2.0");
    assert_eq!(r.chart_name(), "velero");
    assert_eq!(r.chart_version(), "5.2.0");

    let hyphenated = release("csi", "aws-ebs-csi-driver-2.9.0");
    assert_eq!(hyphenated.chart_name(), "aws-ebs-csi-driver");
    assert_eq!(hyphenated.chart_version(), "2.9.0");
}

#[test]
fn test_select_release_single_match() {
    let releases = [release("backup", "velero-5.2.0"), release("db", "postgresql-12.0.1")];
    let selected = select_release(&releases, "velero").unwrap();
    assert_eq!(selected.name, "backup");
}

#[test]
fn test_select_release_zero_matches_is_not_found() {
    let releases = [release("db", "postgresql-12.0.1")];
    let err = select_release(&releases, "velero").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_select_release_multiple_matches_is_ambiguous() {
    let releases = [release("one", "velero-5.2.0"), release("two", "velero-5.1.0")];
    let err = select_release(&releases, "velero").unwrap_err();
    assert!(matches!(err, Error::Helm(_)));
}
