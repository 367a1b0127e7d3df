//! Credential propagation from the source cluster to the destination.
//!
//! A storage location either names its own credential secret
//! (`spec.credential`) or relies on the secret mounted on the Velero server
//! pod's credentials volume. Either way the destination ends up with one
//! deterministically named secret the read-only clone can reference.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, ListParams, ObjectMeta, PostParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::cluster::get_or_not_found;
use crate::crd::backup_storage_location::BackupStorageLocation;
use crate::crd::shared::SecretKeySelector;
use crate::error::{Error, Result};
use crate::settings::Settings;

/// Locate the Velero server pod by its well-known label. Zero matches is a
/// typed `NotFound` so callers can branch on it (clone the chart, abort the
/// implicit credential path).
pub async fn find_server_pod(client: &Client, settings: &Settings) -> Result<Pod> {
    let pods: Api<Pod> = match &settings.server_search_namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let list = pods
        .list(&ListParams::default().labels(&settings.server_pod_label))
        .await?;
    list.items
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found("velero server pod"))
}

/// Name of the secret mounted on the server pod's credentials volume.
pub fn server_pod_secret_name(pod: &Pod, volume: &str) -> Result<String> {
    let volumes = pod
        .spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .ok_or_else(|| Error::config(format!("pod {} has no volumes", pod.name_any())))?;
    volumes
        .iter()
        .find(|v| v.name == volume)
        .and_then(|v| v.secret.as_ref())
        .and_then(|s| s.secret_name.clone())
        .ok_or_else(|| {
            Error::config(format!(
                "pod {} has no '{volume}' secret volume",
                pod.name_any()
            ))
        })
}

/// Create the secret unless one with that name already exists. Existence,
/// not content, is the check: a secret from an earlier run is left as is.
pub async fn ensure_secret(
    client: &Client,
    namespace: &str,
    name: &str,
    data: Option<BTreeMap<String, ByteString>>,
) -> Result<()> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let existing = secrets.list(&ListParams::default()).await?;
    if existing.items.iter().any(|s| s.name_any() == name) {
        info!(%name, %namespace, "credentials secret already present, leaving it untouched");
        return Ok(());
    }
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data,
        ..Default::default()
    };
    secrets.create(&PostParams::default(), &secret).await?;
    info!(%name, %namespace, "created credentials secret");
    Ok(())
}

/// Materialize the secret the read-only clone will use, and point the staged
/// location at it.
///
/// Explicit path: the location's own secret is copied verbatim and its key
/// preserved. Implicit path: the server pod's global credentials secret is
/// copied under the fixed `cloud` key.
pub async fn propagate(
    source: &Client,
    destination: &Client,
    settings: &Settings,
    location: &mut BackupStorageLocation,
    destination_namespace: &str,
    destination_secret_name: &str,
) -> Result<()> {
    match location.spec.credential.clone() {
        Some(credential) => {
            let source_namespace = location.namespace().unwrap_or_default();
            let secrets: Api<Secret> = Api::namespaced(source.clone(), &source_namespace);
            let secret = get_or_not_found(&secrets, &credential.name, "secret").await?;
            ensure_secret(
                destination,
                destination_namespace,
                destination_secret_name,
                secret.data.clone(),
            )
            .await?;
            location.spec.credential = Some(SecretKeySelector {
                name: destination_secret_name.to_string(),
                key: credential.key,
            });
        }
        None => {
            let pod = find_server_pod(source, settings).await?;
            let secret_name = server_pod_secret_name(&pod, &settings.credentials_volume)?;
            let pod_namespace = pod.namespace().unwrap_or_default();
            info!(
                pod = %pod.name_any(),
                secret = %secret_name,
                "location has no explicit credential, copying the server pod's"
            );
            let secrets: Api<Secret> = Api::namespaced(source.clone(), &pod_namespace);
            let secret = get_or_not_found(&secrets, &secret_name, "secret").await?;
            ensure_secret(
                destination,
                destination_namespace,
                destination_secret_name,
                secret.data.clone(),
            )
            .await?;
            location.spec.credential = Some(SecretKeySelector {
                name: destination_secret_name.to_string(),
                key: settings.global_credentials_key.clone(),
            });
        }
    }
    Ok(())
}
