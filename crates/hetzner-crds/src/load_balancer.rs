//! Control plane load balancer
//!
//! Fields with a schema default (`algorithm`, `type`, `port`) are optional in the
//! model. The defaults are applied at the boundary by
//! [`crate::validation::apply_defaults`]; the accessors below only read through.

use schemars::generate::SchemaGenerator;
use schemars::{json_schema, JsonSchema, Schema};
use serde::{Deserialize, Serialize};

use crate::region::Region;

/// Default Kubernetes API server port
pub const DEFAULT_API_SERVER_PORT: i32 = 6443;
/// Lowest valid port
pub const MIN_PORT: i32 = 1;
/// Highest valid port
pub const MAX_PORT: i32 = 65535;

/// Desired control plane load balancer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Load balancer name; generated from the cluster name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Balancing algorithm, round_robin when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "algorithm_schema")]
    pub algorithm: Option<LoadBalancerAlgorithm>,

    /// Load balancer SKU, lb11 when absent
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "load_balancer_type_schema")]
    pub type_: Option<LoadBalancerType>,

    /// API server port (1-65535), 6443 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    #[schemars(extend("default" = 6443))]
    pub port: Option<i32>,

    /// Additional services routed from the load balancer to the targets
    #[serde(rename = "extraTargets", default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<LoadBalancerTargetSpec>,

    /// Location of the load balancer
    pub region: Region,
}

impl LoadBalancerSpec {
    /// Load balancer in `region` with every optional field unset
    pub fn new(region: Region) -> Self {
        Self {
            name: None,
            algorithm: None,
            type_: None,
            port: None,
            targets: Vec::new(),
            region,
        }
    }

    /// Effective algorithm
    pub fn algorithm(&self) -> LoadBalancerAlgorithm {
        self.algorithm.unwrap_or_default()
    }

    /// Effective SKU
    pub fn load_balancer_type(&self) -> LoadBalancerType {
        self.type_.unwrap_or_default()
    }

    /// Effective API server port
    pub fn port(&self) -> i32 {
        self.port.unwrap_or(DEFAULT_API_SERVER_PORT)
    }
}

fn algorithm_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "description": "Balancing algorithm, round_robin when absent",
        "type": "string",
        "enum": LoadBalancerAlgorithm::ALL.map(|a| a.as_str()),
        "default": LoadBalancerAlgorithm::default().as_str(),
        "nullable": true,
    })
}

fn load_balancer_type_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "description": "Load balancer SKU, lb11 when absent",
        "type": "string",
        "enum": LoadBalancerType::ALL.map(|t| t.as_str()),
        "default": LoadBalancerType::default().as_str(),
        "nullable": true,
    })
}

/// Load balancing algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    /// Rotate through targets
    #[default]
    RoundRobin,
    /// Prefer the target with the fewest open connections
    LeastConnections,
}

impl LoadBalancerAlgorithm {
    /// All accepted values
    pub const ALL: [LoadBalancerAlgorithm; 2] = [
        LoadBalancerAlgorithm::RoundRobin,
        LoadBalancerAlgorithm::LeastConnections,
    ];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerAlgorithm::RoundRobin => "round_robin",
            LoadBalancerAlgorithm::LeastConnections => "least_connections",
        }
    }
}

impl std::str::FromStr for LoadBalancerAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Load balancer SKU, smallest first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerType {
    /// LB11
    #[default]
    Lb11,
    /// LB21
    Lb21,
    /// LB31
    Lb31,
}

impl LoadBalancerType {
    /// All accepted values
    pub const ALL: [LoadBalancerType; 3] = [LoadBalancerType::Lb11, LoadBalancerType::Lb21, LoadBalancerType::Lb31];

    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Lb11 => "lb11",
            LoadBalancerType::Lb21 => "lb21",
            LoadBalancerType::Lb31 => "lb31",
        }
    }
}

impl std::str::FromStr for LoadBalancerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Additional service on the control plane load balancer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerTargetSpec {
    /// Protocol of the service
    pub protocol: LoadBalancerProtocol,

    /// Port the load balancer listens on
    #[schemars(range(min = 1, max = 65535))]
    pub listen_port: i32,

    /// Port on the targets
    #[schemars(range(min = 1, max = 65535))]
    pub destination_port: i32,
}

/// Protocol of a load balancer service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerProtocol {
    /// Plain TCP passthrough
    Tcp,
    /// HTTP
    Http,
    /// HTTPS
    Https,
}

/// Observed control plane load balancer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// HCloud load balancer ID
    #[serde(default)]
    pub id: i64,

    /// Public IPv4 address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv4: String,

    /// Public IPv6 address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv6: String,

    /// Address inside the private network
    #[serde(rename = "internalIP", default, skip_serializing_if = "String::is_empty")]
    pub internal_ip: String,

    /// IDs of attached target servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<i64>,

    /// Delete protection is enabled in HCloud
    #[serde(default)]
    pub protected: bool,
}

impl LoadBalancerStatus {
    /// True if `server_id` is attached as a target
    pub fn has_target(&self, server_id: i64) -> bool {
        self.targets.contains(&server_id)
    }

    /// Whether the controller may delete or replace the load balancer
    pub fn allows_destructive_changes(&self) -> bool {
        !self.protected
    }
}
