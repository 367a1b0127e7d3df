//! BackupStorageLocation (velero.io/v1) — where Velero keeps backup data.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::shared::SecretKeySelector;

/// Phase reported by Velero once it has validated a location.
pub const PHASE_AVAILABLE: &str = "Available";

/// Bucket coordinates of a storage location.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStorageLocation {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "velero.io",
    version = "v1",
    kind = "BackupStorageLocation",
    plural = "backupstoragelocations",
    shortname = "bsl",
    namespaced,
    status = "BackupStorageLocationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationSpec {
    #[serde(default)]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_storage: Option<ObjectStorageLocation>,

    /// Provider-specific configuration (region, s3Url, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<SecretKeySelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<String>,

    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

/// Observed state of a BackupStorageLocation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageLocationStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Whether `candidate` in the destination is interchangeable with `source`.
///
/// The object storage coordinates and the provider config must match
/// key-for-key, and the source side must actually be serving ("Available").
/// The candidate's own phase is deliberately not consulted: a location the
/// destination Velero has not validated yet still counts.
pub fn equivalent(source: &BackupStorageLocation, candidate: &BackupStorageLocation) -> bool {
    let source_available =
        source.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PHASE_AVAILABLE);
    source_available
        && source.spec.object_storage == candidate.spec.object_storage
        && source.spec.config == candidate.spec.config
}

/// Name of the read-only clone created in the destination.
pub fn readonly_clone_name(bucket: &str) -> String {
    format!("{bucket}-readonly")
}

/// Name of the credentials secret the clone references.
pub fn readonly_credentials_name(bucket: &str) -> String {
    format!("{bucket}-readonly-credentials")
}

/// Stage a source spec for replication. The clone must never be writable in
/// the destination, and must not clobber the destination's own default.
pub fn stage_readonly(spec: &mut BackupStorageLocationSpec) {
    spec.access_mode = Some("ReadOnly".to_string());
    spec.is_default = Some(false);
}
