//! Fixed identifiers of the Velero installation this tool drives.
//!
//! Kept in an immutable struct threaded through the engine instead of
//! process-wide constants, so individual pieces can run against fakes or a
//! renamed installation.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Label selector identifying the Velero server pod.
    pub server_pod_label: String,

    /// Restrict the server pod search to a single namespace. `None` searches
    /// all namespaces, which is the broad-but-safe default.
    pub server_search_namespace: Option<String>,

    /// Volume on the server pod that carries the global credentials secret.
    pub credentials_volume: String,

    /// Secret key used when credentials are taken from the server pod.
    pub global_credentials_key: String,

    /// Name of the storage-class remap plugin ConfigMap.
    pub storage_class_config_map: String,

    /// Annotation marking a cluster's default StorageClass.
    pub default_class_annotation: String,

    /// Short name matched against chart names during release discovery.
    pub chart_short_name: String,

    /// Public chart repository the cloned release installs from.
    pub chart_repository: String,

    /// Interval between backup-arrival polls.
    pub backup_poll_interval: Duration,

    /// Overall deadline for the backup to sync into the destination.
    pub backup_sync_timeout: Duration,

    /// Deadline for the cloned chart's resources and jobs to become ready.
    pub chart_install_timeout: Duration,

    /// Deadline for the restore to reach a terminal phase.
    pub restore_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_pod_label: "name=velero".to_string(),
            server_search_namespace: None,
            credentials_volume: "cloud-credentials".to_string(),
            global_credentials_key: "cloud".to_string(),
            storage_class_config_map: "change-storage-class-config".to_string(),
            default_class_annotation: "storageclass.kubernetes.io/is-default-class".to_string(),
            chart_short_name: "velero".to_string(),
            chart_repository: "https://vmware-tanzu.github.io/helm-charts".to_string(),
            backup_poll_interval: Duration::from_secs(5),
            backup_sync_timeout: Duration::from_secs(5 * 60),
            chart_install_timeout: Duration::from_secs(15 * 60),
            restore_timeout: Duration::from_secs(60 * 60),
        }
    }
}
