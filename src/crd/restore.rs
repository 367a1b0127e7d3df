//! Restore (velero.io/v1) — the declarative restore request, plus the
//! terminal-phase classification the observer runs on.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::RestoreOptions;

/// One label-selector clause. Velero ORs the clauses in
/// `spec.orLabelSelectors`, so a single-key clause per input pair gives OR
/// semantics across the pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorClause {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "Restore",
    plural = "restores",
    namespaced,
    status = "RestoreStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSpec {
    pub backup_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_operation_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_resources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_cluster_resources: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelectorClause>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or_label_selectors: Vec<LabelSelectorClause>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_mapping: BTreeMap<String, String>,

    /// Velero spells this `restorePVs`, not `restorePvs`.
    #[serde(
        default,
        rename = "restorePVs",
        skip_serializing_if = "Option::is_none"
    )]
    pub restore_pvs: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_node_ports: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_resource_policy: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl RestoreSpec {
    pub fn from_options(options: &RestoreOptions) -> Self {
        let label_selector = if options.label_selector.is_empty() {
            None
        } else {
            Some(LabelSelectorClause {
                match_labels: options.label_selector.clone(),
            })
        };
        Self {
            backup_name: options.backup_name.clone(),
            schedule_name: options.schedule_name.clone(),
            item_operation_timeout: options.item_operation_timeout.clone(),
            included_namespaces: options.included_namespaces.clone(),
            excluded_namespaces: options.excluded_namespaces.clone(),
            included_resources: options.included_resources.clone(),
            excluded_resources: options.excluded_resources.clone(),
            include_cluster_resources: options.include_cluster_resources,
            label_selector,
            or_label_selectors: or_label_clauses(&options.or_label_selectors),
            namespace_mapping: options.namespace_mapping.clone(),
            restore_pvs: options.restore_pvs,
            preserve_node_ports: options.preserve_node_ports,
            existing_resource_policy: options.existing_resource_policy.clone(),
        }
    }
}

/// Convert `{k: v}` pairs into independent single-key clauses. An object
/// matching any one clause is included (OR), as opposed to one clause
/// carrying all pairs (AND).
pub fn or_label_clauses(labels: &BTreeMap<String, String>) -> Vec<LabelSelectorClause> {
    labels
        .iter()
        .map(|(k, v)| LabelSelectorClause {
            match_labels: BTreeMap::from([(k.clone(), v.clone())]),
        })
        .collect()
}

/// How a terminal restore ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalState {
    Success,
    Failure,
}

/// `Completed` is the only success. Velero's failure phases all contain
/// "failed" (`Failed`, `PartiallyFailed`, `FailedValidation`, ...), so that
/// substring is the failure test. Anything else keeps the watch open.
pub fn terminal_state(phase: &str) -> Option<TerminalState> {
    if phase == "Completed" {
        Some(TerminalState::Success)
    } else if phase.to_ascii_lowercase().contains("failed") {
        Some(TerminalState::Failure)
    } else {
        None
    }
}

pub fn is_terminal(phase: &str) -> bool {
    terminal_state(phase).is_some()
}
