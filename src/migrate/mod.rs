//! The migration sequence.
//!
//! Stages run strictly in order because each depends on the side effects of
//! the one before: the credential secret must exist before the location
//! clone, the clone before the backup-arrival wait, the restore before its
//! watch. Already-committed side effects are never rolled back; the
//! idempotent existence checks make a re-run converge instead.

pub mod credentials;
pub mod restore;
pub mod storage_class;
pub mod storage_location;
pub mod wait;

use kube::{Client, ResourceExt};
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::helm;
use crate::settings::Settings;

pub async fn run(
    source: &Client,
    destination: &Client,
    settings: &Settings,
    config: &Config,
) -> Result<()> {
    let source_namespace = match &config.source_velero_namespace {
        Some(ns) => ns.clone(),
        None => {
            let pod = credentials::find_server_pod(source, settings).await?;
            let ns = pod.namespace().unwrap_or_default();
            info!(namespace = %ns, "discovered source velero namespace from server pod");
            ns
        }
    };
    let destination_namespace = config.destination_velero_namespace.clone();

    // The destination must run Velero before anything can sync there. When
    // it does not, replicate the source installation's chart.
    match credentials::find_server_pod(destination, settings).await {
        Ok(pod) => {
            info!(pod = %pod.name_any(), "found velero server in destination cluster");
        }
        Err(Error::NotFound(_)) => {
            info!("no velero server in destination cluster, cloning the source helm release");
            helm::clone_release(settings, config, &destination_namespace).await?;
        }
        Err(e) => return Err(e),
    }

    storage_location::reconcile(
        source,
        destination,
        settings,
        &source_namespace,
        &destination_namespace,
        &config.restore.backup_name,
    )
    .await?;

    storage_class::publish(source, destination, settings, &destination_namespace).await?;

    restore::submit_and_wait(
        destination,
        settings,
        &destination_namespace,
        &config.restore_name,
        &config.restore,
    )
    .await
}
