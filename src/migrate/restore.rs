//! Restore submission and observation.
//!
//! The restore is created once and never touched again; Velero owns its
//! lifecycle from then on. A watch scoped to the restore's name wakes the
//! caller when a terminal-looking phase flies by, but the final verdict
//! always comes from a fresh read — a watch event can describe a stale,
//! superseded object state.

use std::time::Duration;

use futures::TryStreamExt;
use kube::api::{Api, PostParams};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Client, ResourceExt};
use tokio::sync::oneshot;
use tracing::info;

use crate::config::RestoreOptions;
use crate::crd::restore::{Restore, RestoreSpec, TerminalState, is_terminal, terminal_state};
use crate::error::{Error, Result};
use crate::settings::Settings;

/// Create the restore and block until it reaches a terminal phase or the
/// deadline passes.
pub async fn submit_and_wait(
    destination: &Client,
    settings: &Settings,
    namespace: &str,
    name: &str,
    options: &RestoreOptions,
) -> Result<()> {
    let api: Api<Restore> = Api::namespaced(destination.clone(), namespace);
    let mut restore = Restore::new(name, RestoreSpec::from_options(options));
    restore.metadata.namespace = Some(namespace.to_string());
    api.create(&PostParams::default(), &restore).await?;
    info!(%name, %namespace, backup = %options.backup_name, "restore created");

    observe(api, settings.restore_timeout, name).await
}

/// Watch the named restore until the reader task signals a terminal phase,
/// then decide from a re-fetched object.
async fn observe(api: Api<Restore>, deadline: Duration, name: &str) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    let watch_config = watcher::Config::default().fields(&format!("metadata.name={name}"));
    let watch_api = api.clone();
    let reader = tokio::spawn(async move {
        let stream = watcher(watch_api, watch_config)
            .default_backoff()
            .applied_objects();
        let mut stream = std::pin::pin!(stream);
        let mut tx = Some(tx);
        while let Some(restore) = stream.try_next().await? {
            let phase = restore
                .status
                .as_ref()
                .and_then(|s| s.phase.clone())
                .unwrap_or_default();
            if phase.is_empty() {
                continue;
            }
            info!(restore = %restore.name_any(), %phase, "restore status");
            if is_terminal(&phase) {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                return Ok::<_, Error>(());
            }
        }
        Ok(())
    });

    match tokio::time::timeout(deadline, rx).await {
        Err(_) => {
            reader.abort();
            return Err(Error::Timeout(
                deadline,
                format!("restore {name} did not reach a terminal phase"),
            ));
        }
        // The reader dropped the sender without signalling: the watch stream
        // errored out or ended.
        Ok(Err(_)) => {
            return Err(match reader.await {
                Ok(Err(e)) => e,
                _ => Error::Restore(format!("watch on restore {name} ended unexpectedly")),
            });
        }
        Ok(Ok(())) => {}
    }

    let fresh = api
        .get(name)
        .await
        .map_err(|e| Error::Restore(format!("final phase of restore {name} is unreadable: {e}")))?;
    let phase = fresh.status.as_ref().and_then(|s| s.phase.clone());
    match phase.as_deref().map(terminal_state) {
        Some(Some(TerminalState::Success)) => {
            info!(restore = %name, "restore completed");
            Ok(())
        }
        Some(_) => Err(Error::Restore(format!(
            "restore {name} finished in phase {}",
            phase.unwrap_or_default()
        ))),
        None => Err(Error::Restore(format!(
            "restore {name} reports no phase after completion signal"
        ))),
    }
}
