//! Fully resolved run configuration.
//!
//! Populated by the CLI layer before the engine starts; the engine itself
//! never prompts or reads the environment.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where to find the two clusters and what to restore.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Kubeconfig for the source cluster; `None` uses the default chain.
    pub source_kubeconfig: Option<PathBuf>,
    pub source_context: Option<String>,

    /// Kubeconfig for the destination cluster; `None` uses the default chain.
    pub destination_kubeconfig: Option<PathBuf>,
    pub destination_context: Option<String>,

    /// Namespace of the source Velero installation. Discovered from the
    /// server pod when not set.
    pub source_velero_namespace: Option<String>,

    /// Namespace of the destination Velero installation.
    pub destination_velero_namespace: String,

    /// Helm release name of the source installation; discovered by chart
    /// name when not set.
    pub source_helm_release: Option<String>,

    /// Name given to the Restore object in the destination cluster.
    pub restore_name: String,

    pub restore: RestoreOptions,
}

/// Scope filters and policy flags forwarded into the Restore spec.
#[derive(Clone, Debug, Default)]
pub struct RestoreOptions {
    pub backup_name: String,
    pub schedule_name: Option<String>,
    /// Forwarded verbatim; Velero parses it as a Go duration ("4h").
    pub item_operation_timeout: Option<String>,
    pub included_namespaces: Vec<String>,
    pub excluded_namespaces: Vec<String>,
    pub included_resources: Vec<String>,
    pub excluded_resources: Vec<String>,
    pub include_cluster_resources: Option<bool>,
    /// AND semantics: an object must carry every pair.
    pub label_selector: BTreeMap<String, String>,
    /// OR semantics: each pair becomes its own selector clause.
    pub or_label_selectors: BTreeMap<String, String>,
    pub namespace_mapping: BTreeMap<String, String>,
    pub restore_pvs: Option<bool>,
    pub preserve_node_ports: Option<bool>,
    pub existing_resource_policy: Option<String>,
}
