use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// SecretKeySelector selects a key from a Secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}
