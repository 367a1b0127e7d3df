//! velero-migrate — restore a Velero backup into a different cluster.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use velero_migrate::cluster;
use velero_migrate::config::{Config, RestoreOptions};
use velero_migrate::migrate;
use velero_migrate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "velero-migrate",
    version,
    about = "Restore a Velero backup from a source cluster into a destination cluster"
)]
struct Args {
    /// Path to the source kubeconfig (default chain when omitted).
    #[arg(long, env = "SOURCE_KUBECONFIG")]
    source_kubeconfig: Option<PathBuf>,

    /// Context name in the source kubeconfig.
    #[arg(long, env = "SOURCE_CONTEXT")]
    source_context: Option<String>,

    /// Path to the destination kubeconfig (default chain when omitted).
    #[arg(long, env = "DESTINATION_KUBECONFIG")]
    destination_kubeconfig: Option<PathBuf>,

    /// Context name in the destination kubeconfig.
    #[arg(long, env = "DESTINATION_CONTEXT")]
    destination_context: Option<String>,

    /// Source Velero namespace (discovered from the server pod when omitted).
    #[arg(long, env = "SOURCE_VELERO_NAMESPACE")]
    source_velero_namespace: Option<String>,

    /// Destination Velero namespace.
    #[arg(long, default_value = "velero", env = "DESTINATION_VELERO_NAMESPACE")]
    destination_velero_namespace: String,

    /// Helm release name of the source Velero installation (discovered by
    /// chart name when omitted).
    #[arg(long, env = "SOURCE_HELM_RELEASE")]
    source_helm_release: Option<String>,

    /// Restrict the Velero server pod search to one namespace.
    #[arg(long, env = "VELERO_POD_NAMESPACE")]
    velero_pod_namespace: Option<String>,

    /// Name for the Restore object created in the destination.
    #[arg(long, env = "RESTORE_NAME")]
    restore_name: String,

    /// Name of the Velero backup to restore.
    #[arg(long, env = "BACKUP_NAME")]
    backup_name: String,

    /// Velero schedule name.
    #[arg(long, env = "SCHEDULE_NAME")]
    schedule_name: Option<String>,

    /// Time to wait for asynchronous item operations, as a Go duration ("4h").
    #[arg(long, env = "ITEM_OPERATION_TIMEOUT")]
    item_operation_timeout: Option<String>,

    /// Namespaces to include in the restore.
    #[arg(long, value_delimiter = ',')]
    included_namespaces: Vec<String>,

    /// Namespaces to exclude from the restore.
    #[arg(long, value_delimiter = ',')]
    excluded_namespaces: Vec<String>,

    /// Resources to include in the restore.
    #[arg(long, value_delimiter = ',')]
    included_resources: Vec<String>,

    /// Resources to exclude from the restore.
    #[arg(long, value_delimiter = ',')]
    excluded_resources: Vec<String>,

    /// Whether to restore cluster-scoped resources.
    #[arg(long)]
    include_cluster_resources: Option<bool>,

    /// key=value pairs an object must all carry to be restored (AND).
    #[arg(long, value_parser = parse_key_value, value_delimiter = ',')]
    label_selector: Vec<(String, String)>,

    /// key=value pairs of which an object must carry any one (OR).
    #[arg(long, value_parser = parse_key_value, value_delimiter = ',')]
    or_label_selectors: Vec<(String, String)>,

    /// source=target namespace pairs to restore into.
    #[arg(long, value_parser = parse_key_value, value_delimiter = ',')]
    namespace_mapping: Vec<(String, String)>,

    /// Whether to restore included PVs from snapshots.
    #[arg(long)]
    restore_pvs: Option<bool>,

    /// Whether to keep nodePorts from the backup.
    #[arg(long)]
    preserve_node_ports: Option<bool>,

    /// Velero policy for resources that already exist ("none", "update").
    #[arg(long, env = "EXISTING_RESOURCE_POLICY")]
    existing_resource_policy: Option<String>,

    /// Seconds to wait for the restore to reach a terminal phase.
    #[arg(long, default_value = "3600")]
    restore_timeout: u64,

    /// Seconds to wait for the backup to sync into the destination.
    #[arg(long, default_value = "300")]
    backup_sync_timeout: u64,

    /// Log format: "text" for human-readable, "json" for structured.
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    log_format: String,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,kube=warn,hyper=warn,tower=warn".into());
    if args.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let settings = Settings {
        server_search_namespace: args.velero_pod_namespace.clone(),
        restore_timeout: Duration::from_secs(args.restore_timeout),
        backup_sync_timeout: Duration::from_secs(args.backup_sync_timeout),
        ..Default::default()
    };

    let config = Config {
        source_kubeconfig: args.source_kubeconfig,
        source_context: args.source_context,
        destination_kubeconfig: args.destination_kubeconfig,
        destination_context: args.destination_context,
        source_velero_namespace: args.source_velero_namespace,
        destination_velero_namespace: args.destination_velero_namespace,
        source_helm_release: args.source_helm_release,
        restore_name: args.restore_name,
        restore: RestoreOptions {
            backup_name: args.backup_name,
            schedule_name: args.schedule_name,
            item_operation_timeout: args.item_operation_timeout,
            included_namespaces: args.included_namespaces,
            excluded_namespaces: args.excluded_namespaces,
            included_resources: args.included_resources,
            excluded_resources: args.excluded_resources,
            include_cluster_resources: args.include_cluster_resources,
            label_selector: args.label_selector.into_iter().collect::<BTreeMap<_, _>>(),
            or_label_selectors: args
                .or_label_selectors
                .into_iter()
                .collect::<BTreeMap<_, _>>(),
            namespace_mapping: args
                .namespace_mapping
                .into_iter()
                .collect::<BTreeMap<_, _>>(),
            restore_pvs: args.restore_pvs,
            preserve_node_ports: args.preserve_node_ports,
            existing_resource_policy: args.existing_resource_policy,
        },
    };

    let source = cluster::client_for(
        config.source_kubeconfig.as_deref(),
        config.source_context.as_deref(),
    )
    .await
    .context("connecting to source cluster")?;
    let destination = cluster::client_for(
        config.destination_kubeconfig.as_deref(),
        config.destination_context.as_deref(),
    )
    .await
    .context("connecting to destination cluster")?;

    info!(
        backup = %config.restore.backup_name,
        restore = %config.restore_name,
        "starting migration"
    );
    migrate::run(&source, &destination, &settings, &config)
        .await
        .context("migration failed")?;
    info!("migration complete");
    Ok(())
}
