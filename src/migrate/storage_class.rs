//! Storage-class remapping.
//!
//! Publishes the ConfigMap Velero's change-storage-class restore item action
//! reads, mapping every source storage class to the destination's default so
//! restored workloads bind to storage that actually exists there.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ListParams, ObjectMeta, PostParams};
use kube::{Client, ResourceExt};
use tracing::{info, warn};

use crate::error::Result;
use crate::settings::Settings;

/// Build or merge the remap ConfigMap in the destination namespace.
/// Existing keys are overwritten so repeated runs converge on the newest
/// destination default instead of failing.
pub async fn publish(
    source: &Client,
    destination: &Client,
    settings: &Settings,
    namespace: &str,
) -> Result<()> {
    let source_classes: Api<StorageClass> = Api::all(source.clone());
    let source_names: Vec<String> = source_classes
        .list(&ListParams::default())
        .await?
        .items
        .iter()
        .map(|c| c.name_any())
        .collect();

    let destination_classes: Api<StorageClass> = Api::all(destination.clone());
    let classes = destination_classes.list(&ListParams::default()).await?;
    let default_class = default_storage_class(&classes.items, &settings.default_class_annotation);
    if default_class.is_empty() {
        warn!("destination cluster has no annotated default StorageClass; mapping targets will be empty");
    }

    let config_maps: Api<ConfigMap> = Api::namespaced(destination.clone(), namespace);
    let existing = config_maps.list(&ListParams::default()).await?;
    let found = existing
        .items
        .into_iter()
        .find(|cm| cm.name_any() == settings.storage_class_config_map);

    match found {
        Some(mut config_map) => {
            let mut data = config_map.data.take().unwrap_or_default();
            merge_mappings(&mut data, &source_names, &default_class);
            config_map.data = Some(data);
            config_maps
                .replace(
                    &settings.storage_class_config_map,
                    &PostParams::default(),
                    &config_map,
                )
                .await?;
            info!(
                name = %settings.storage_class_config_map,
                %namespace,
                "merged storage-class mappings into existing config map"
            );
        }
        None => {
            let config_map = remap_config_map(
                &settings.storage_class_config_map,
                namespace,
                &source_names,
                &default_class,
            );
            config_maps
                .create(&PostParams::default(), &config_map)
                .await?;
            info!(
                name = %settings.storage_class_config_map,
                %namespace,
                default = %default_class,
                "created storage-class remap config map"
            );
        }
    }
    Ok(())
}

/// Name of the class annotated as the cluster default, or `""` when none is.
pub fn default_storage_class(classes: &[StorageClass], annotation: &str) -> String {
    classes
        .iter()
        .find(|c| {
            c.metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(annotation))
                .map(String::as_str)
                == Some("true")
        })
        .map(|c| c.name_any())
        .unwrap_or_default()
}

/// Map every source class to the destination default, overwriting existing
/// entries.
pub fn merge_mappings(
    data: &mut BTreeMap<String, String>,
    source_classes: &[String],
    destination_default: &str,
) {
    for class in source_classes {
        data.insert(class.clone(), destination_default.to_string());
    }
}

/// The plugin ConfigMap, labelled so Velero's change-storage-class
/// RestoreItemAction picks it up.
pub fn remap_config_map(
    name: &str,
    namespace: &str,
    source_classes: &[String],
    destination_default: &str,
) -> ConfigMap {
    let mut data = BTreeMap::new();
    merge_mappings(&mut data, source_classes, destination_default);
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([
                ("velero.io/plugin-config".to_string(), String::new()),
                (
                    "velero.io/change-storage-class".to_string(),
                    "RestoreItemAction".to_string(),
                ),
            ])),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}
