//! Credential references for HetznerCluster
//!
//! The Hetzner Cloud API token never lives in the cluster spec itself. The spec
//! only names a Kubernetes Secret and the key inside it that holds the token;
//! the reconciler resolves that reference against the credential store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default Secret key holding the HCloud API token.
pub const DEFAULT_HCLOUD_TOKEN_KEY: &str = "hcloud";

/// Reference to the Secret holding the Hetzner API credentials
///
/// Serialized as:
///
/// ```yaml
/// hetznerSecretRef:
///   name: hetzner
///   key:
///     hcloudToken: hcloud
/// ```
///
/// The token needs Read & Write permission (generated in the Hetzner console under
/// Security / API TOKENS).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerSecretRef {
    /// Name of the Secret (same namespace as the HetznerCluster)
    pub name: String,

    /// Keys inside the Secret
    pub key: HetznerSecretKeyRef,
}

/// Key names inside the Hetzner Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerSecretKeyRef {
    /// Key whose value is the HCloud API token
    pub hcloud_token: String,
}

impl HetznerSecretRef {
    /// Create a reference to `name` with an explicit token key
    pub fn new(name: impl Into<String>, hcloud_token_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: HetznerSecretKeyRef {
                hcloud_token: hcloud_token_key.into(),
            },
        }
    }

    /// Create a reference to `name` using the conventional `hcloud` key
    pub fn with_default_key(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_HCLOUD_TOKEN_KEY)
    }

    /// True when both the Secret name and the token key are set
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.key.hcloud_token.trim().is_empty()
    }
}
