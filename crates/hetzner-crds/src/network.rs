//! HCloud private network configuration and observed state

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::region::NetworkZone;

/// Default network range
pub const DEFAULT_CIDR_BLOCK: &str = "10.0.0.0/16";
/// Default subnet the servers are attached to
pub const DEFAULT_SUBNET_CIDR_BLOCK: &str = "10.0.0.0/24";

/// Desired private network of the cluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HCloudNetworkSpec {
    /// Create and attach a private network
    #[serde(default)]
    pub enabled: bool,

    /// IP range of the whole network
    #[serde(default = "default_cidr_block")]
    pub cidr_block: String,

    /// IP range of the subnet servers are attached to; must lie inside `cidrBlock`
    #[serde(default = "default_subnet_cidr_block")]
    pub subnet_cidr_block: String,

    /// Network zone of the subnet
    #[serde(default)]
    pub network_zone: NetworkZone,
}

fn default_cidr_block() -> String {
    DEFAULT_CIDR_BLOCK.to_string()
}

fn default_subnet_cidr_block() -> String {
    DEFAULT_SUBNET_CIDR_BLOCK.to_string()
}

impl Default for HCloudNetworkSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            cidr_block: default_cidr_block(),
            subnet_cidr_block: default_subnet_cidr_block(),
            network_zone: NetworkZone::default(),
        }
    }
}

/// Observed private network
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// HCloud network ID
    #[serde(default)]
    pub id: i64,

    /// Labels set on the HCloud network
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// IDs of servers attached to the network
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_servers: Vec<i64>,
}
