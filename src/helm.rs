//! Helm release discovery and cloning.
//!
//! Runs through the `helm` binary rather than an in-process implementation:
//! release payloads and chart rendering are Helm's own problem. Every
//! invocation is pinned to a kubeconfig/context pair so the two clusters
//! never get mixed up.

use std::path::PathBuf;

use serde::Deserialize;
use tokio::process::Command;
use tracing::info;
use which::which;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::settings::Settings;

/// One row of `helm list -o json`.
#[derive(Clone, Debug, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    /// Chart with trailing version, e.g. `velero-5.2.0`.
    pub chart: String,
}

impl HelmRelease {
    /// Chart name without the version: `velero-5.2.0` → `velero`.
    pub fn chart_name(&self) -> &str {
        self.chart
            .rsplit_once('-')
            .map(|(name, _)| name)
            .unwrap_or(&self.chart)
    }

    /// Chart version: `velero-5.2.0` → `5.2.0`.
    pub fn chart_version(&self) -> &str {
        self.chart
            .rsplit_once('-')
            .map(|(_, version)| version)
            .unwrap_or_default()
    }
}

/// Pick the single deployed release whose chart name contains `short_name`.
/// Zero matches is a typed `NotFound`; several matches are ambiguous and not
/// resolved automatically.
pub fn select_release<'a>(
    releases: &'a [HelmRelease],
    short_name: &str,
) -> Result<&'a HelmRelease> {
    let matches: Vec<&HelmRelease> = releases
        .iter()
        .filter(|r| r.chart_name().contains(short_name))
        .collect();
    match matches.as_slice() {
        [] => Err(Error::not_found(format!(
            "deployed helm release with '{short_name}' in its chart name"
        ))),
        [one] => Ok(*one),
        several => Err(Error::helm(format!(
            "{} releases match chart name '{short_name}' ({}); specify one with --source-helm-release",
            several.len(),
            several
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Kubeconfig/context flags one helm invocation is pinned to.
#[derive(Clone, Debug, Default)]
struct HelmTarget {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl HelmTarget {
    fn source(config: &Config) -> Self {
        Self {
            kubeconfig: config.source_kubeconfig.clone(),
            context: config.source_context.clone(),
        }
    }

    fn destination(config: &Config) -> Self {
        Self {
            kubeconfig: config.destination_kubeconfig.clone(),
            context: config.destination_context.clone(),
        }
    }

    fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(path) = &self.kubeconfig {
            flags.push("--kubeconfig".to_string());
            flags.push(path.display().to_string());
        }
        if let Some(context) = &self.context {
            flags.push("--kube-context".to_string());
            flags.push(context.clone());
        }
        flags
    }
}

async fn helm(target: &HelmTarget, args: &[&str]) -> Result<String> {
    let binary =
        which("helm").map_err(|_| Error::helm("helm executable not found in PATH"))?;
    let output = Command::new(binary)
        .args(args)
        .args(target.flags())
        .output()
        .await?;
    if !output.status.success() {
        return Err(Error::helm(format!(
            "helm {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn list_releases(target: &HelmTarget) -> Result<Vec<HelmRelease>> {
    let out = helm(
        target,
        &["list", "--all-namespaces", "--deployed", "-o", "json"],
    )
    .await?;
    Ok(serde_json::from_str(&out)?)
}

/// Full computed values of a release, as YAML.
async fn release_values(target: &HelmTarget, release: &HelmRelease) -> Result<String> {
    let values = helm(
        target,
        &[
            "get",
            "values",
            &release.name,
            "--namespace",
            &release.namespace,
            "--all",
            "-o",
            "yaml",
        ],
    )
    .await?;
    // Fail here, with a parse error, rather than mid-install.
    serde_yaml::from_str::<serde_yaml::Value>(&values)?;
    Ok(values)
}

/// Replicate the source cluster's Velero release into the destination
/// namespace: same chart, same version, same computed values, installed from
/// the chart's public repository and waited on until its resources and jobs
/// are ready.
pub async fn clone_release(
    settings: &Settings,
    config: &Config,
    destination_namespace: &str,
) -> Result<()> {
    let source_target = HelmTarget::source(config);
    let destination_target = HelmTarget::destination(config);

    let releases = list_releases(&source_target).await?;
    let release = match &config.source_helm_release {
        Some(name) => releases
            .iter()
            .find(|r| &r.name == name)
            .ok_or_else(|| Error::not_found(format!("helm release {name}")))?,
        None => select_release(&releases, &settings.chart_short_name)?,
    };
    info!(
        release = %release.name,
        chart = %release.chart,
        "cloning helm release into destination cluster"
    );

    let values = release_values(&source_target, release).await?;
    let values_path = std::env::temp_dir().join(format!("{}-values.yaml", release.name));
    tokio::fs::write(&values_path, &values).await?;

    helm(
        &destination_target,
        &[
            "repo",
            "add",
            &settings.chart_short_name,
            &settings.chart_repository,
            "--force-update",
        ],
    )
    .await?;

    let chart_ref = format!("{}/{}", settings.chart_short_name, release.chart_name());
    let timeout = format!("{}s", settings.chart_install_timeout.as_secs());
    let values_arg = values_path.display().to_string();
    helm(
        &destination_target,
        &[
            "upgrade",
            "--install",
            &release.name,
            &chart_ref,
            "--namespace",
            destination_namespace,
            "--create-namespace",
            "--version",
            release.chart_version(),
            "--values",
            &values_arg,
            "--wait",
            "--wait-for-jobs",
            "--timeout",
            &timeout,
        ],
    )
    .await?;
    info!(release = %release.name, namespace = %destination_namespace, "helm release ready in destination");
    Ok(())
}
