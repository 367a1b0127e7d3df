//! Construction of the two cluster clients and shared API-access helpers.

use std::fmt::Debug;
use std::path::Path;

use kube::api::Api;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Build a client for one cluster from an explicit kubeconfig path (or the
/// default chain) and an optional context name.
pub async fn client_for(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client> {
    let kubeconfig = match kubeconfig {
        Some(path) => Kubeconfig::read_from(path)?,
        None => Kubeconfig::read()?,
    };
    let options = KubeConfigOptions {
        context: context.map(str::to_owned),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
    Ok(Client::try_from(config)?)
}

/// Get a resource, mapping a 404 into the crate's typed `NotFound` so
/// callers can branch on absence without string-matching.
pub async fn get_or_not_found<K>(api: &Api<K>, name: &str, what: &str) -> Result<K>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(obj),
        Err(kube::Error::Api(ref e)) if e.code == 404 => {
            Err(Error::not_found(format!("{what} {name}")))
        }
        Err(e) => Err(e.into()),
    }
}
