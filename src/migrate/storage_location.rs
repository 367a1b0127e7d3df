//! Storage location reconciliation.
//!
//! Ensures the destination cluster has a usable, read-only storage location
//! equivalent to the one the selected backup depends on, then waits for the
//! destination Velero to sync the backup metadata into view.

use kube::api::{Api, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::info;

use crate::cluster::get_or_not_found;
use crate::crd::backup::Backup;
use crate::crd::backup_storage_location::{
    BackupStorageLocation, equivalent, readonly_clone_name, readonly_credentials_name,
    stage_readonly,
};
use crate::error::{Error, Result};
use crate::migrate::{credentials, wait};
use crate::settings::Settings;

/// Resolve the backup's storage location and replicate it into the
/// destination unless an equivalent one already exists there.
pub async fn reconcile(
    source: &Client,
    destination: &Client,
    settings: &Settings,
    source_namespace: &str,
    destination_namespace: &str,
    backup_name: &str,
) -> Result<()> {
    let backups: Api<Backup> = Api::namespaced(source.clone(), source_namespace);
    let backup = get_or_not_found(&backups, backup_name, "backup").await?;
    let location_name = backup.spec.storage_location.clone().ok_or_else(|| {
        Error::config(format!("backup {backup_name} names no storage location"))
    })?;

    let locations: Api<BackupStorageLocation> = Api::namespaced(source.clone(), source_namespace);
    let mut location = get_or_not_found(&locations, &location_name, "storage location").await?;

    let destination_locations: Api<BackupStorageLocation> =
        Api::namespaced(destination.clone(), destination_namespace);
    let existing = destination_locations.list(&ListParams::default()).await?;
    if existing.items.iter().any(|c| equivalent(&location, c)) {
        info!(
            location = %location_name,
            "destination already has an equivalent storage location"
        );
        return Ok(());
    }

    let bucket = location
        .spec
        .object_storage
        .as_ref()
        .map(|o| o.bucket.clone())
        .ok_or_else(|| {
            Error::config(format!("storage location {location_name} names no bucket"))
        })?;
    let clone_name = readonly_clone_name(&bucket);
    let secret_name = readonly_credentials_name(&bucket);
    info!(
        location = %location_name,
        clone = %clone_name,
        "no equivalent storage location in destination, replicating"
    );

    stage_readonly(&mut location.spec);
    credentials::propagate(
        source,
        destination,
        settings,
        &mut location,
        destination_namespace,
        &secret_name,
    )
    .await?;

    let mut clone = BackupStorageLocation::new(&clone_name, location.spec.clone());
    clone.metadata.namespace = Some(destination_namespace.to_string());
    destination_locations
        .create(&PostParams::default(), &clone)
        .await?;
    info!(clone = %clone_name, "created read-only storage location");

    await_backup_arrival(destination, settings, destination_namespace, backup_name).await
}

/// Block until the destination Velero has synced the backup into view.
/// Deadline expiry is reported as a timeout naming the backup; the sync
/// itself is Velero's job, so nothing is retried beyond re-listing.
async fn await_backup_arrival(
    destination: &Client,
    settings: &Settings,
    namespace: &str,
    backup_name: &str,
) -> Result<()> {
    info!(backup = %backup_name, timeout = ?settings.backup_sync_timeout, "waiting for backup to sync into destination");
    let backups: Api<Backup> = Api::namespaced(destination.clone(), namespace);
    let params = ListParams::default().fields(&format!("metadata.name={backup_name}"));
    let arrived = wait::poll_until(
        settings.backup_poll_interval,
        settings.backup_sync_timeout,
        || {
            let backups = backups.clone();
            let params = params.clone();
            async move {
                let list = backups.list(&params).await?;
                Ok(list.items.iter().any(|b| b.name_any() == backup_name))
            }
        },
    )
    .await?;
    if !arrived {
        return Err(Error::Timeout(
            settings.backup_sync_timeout,
            format!("backup {backup_name} did not appear in the destination cluster"),
        ));
    }
    info!(backup = %backup_name, "backup visible in destination");
    Ok(())
}
