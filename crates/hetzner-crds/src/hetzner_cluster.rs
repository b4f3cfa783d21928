//! HetznerCluster Custom Resource Definition
//!
//! Infrastructure side of a cluster-api cluster on Hetzner Cloud. Clients own
//! `spec`; the reconciler owns `status` and reports progress through
//! `status.conditions` only.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::conditions::{conditions_schema, Condition, HasConditions};
use crate::load_balancer::{LoadBalancerSpec, LoadBalancerStatus};
use crate::network::{HCloudNetworkSpec, NetworkStatus};
use crate::placement_group::{HCloudPlacementGroupSpec, HCloudPlacementGroupStatus};
use crate::references::HetznerSecretRef;
use crate::region::Region;

/// Label cluster-api puts on infrastructure objects to name the owning Cluster
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Suffix of the generated control plane load balancer name
pub const LOAD_BALANCER_NAME_SUFFIX: &str = "kube-apiserver";

/// HetznerClusterSpec defines the desired state of a HetznerCluster
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "HetznerCluster",
    plural = "hetznerclusters",
    shortname = "capihc",
    category = "cluster-api",
    namespaced,
    status = "HetznerClusterStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".metadata.labels.cluster\\.x-k8s\\.io/cluster-name","description":"Cluster to which this HetznerCluster belongs"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.ready","description":"Cluster infrastructure is ready for Nodes"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".spec.controlPlaneEndpoint","description":"API Endpoint","priority":1}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HetznerClusterSpec {
    /// Private network. Absent means no private network is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcloud_network: Option<HCloudNetworkSpec>,

    /// Regions the control plane is spread over; at least one
    #[schemars(length(min = 1))]
    pub control_plane_regions: Vec<Region>,

    /// Cluster wide SSH keys, by name or fingerprint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<SSHKeySpec>,

    /// Endpoint used to reach the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,

    /// Control plane load balancer
    pub control_plane_load_balancer: LoadBalancerSpec,

    /// Placement groups available to machines of this cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hcloud_placement_groups: Vec<HCloudPlacementGroupSpec>,

    /// Secret holding the HCloud API token
    pub hetzner_secret_ref: HetznerSecretRef,
}

/// SSH key known to Hetzner Cloud
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SSHKeySpec {
    /// Name of the key in HCloud
    pub name: String,

    /// Fingerprint, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Host and port of the control plane API (cluster-api `APIEndpoint`)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Hostname or IP
    pub host: String,

    /// Port
    pub port: i32,
}

impl ApiEndpoint {
    /// Create an endpoint
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// True if neither host nor port is set
    pub fn is_zero(&self) -> bool {
        self.host.is_empty() && self.port == 0
    }

    /// True if both host and port are set
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port > 0
    }
}

impl std::fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A failure domain as reported to cluster-api
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainSpec {
    /// Control plane machines may be placed here
    #[serde(default)]
    pub control_plane: bool,

    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Usable failure domains keyed by identifier (region name)
///
/// Serialized as a map for wire compatibility with cluster-api.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct FailureDomains(pub BTreeMap<String, FailureDomainSpec>);

impl FailureDomains {
    /// One control plane capable failure domain per region
    pub fn from_regions(regions: &[Region]) -> Self {
        Self(
            regions
                .iter()
                .map(|r| {
                    (
                        r.to_string(),
                        FailureDomainSpec {
                            control_plane: true,
                            attributes: BTreeMap::new(),
                        },
                    )
                })
                .collect(),
        )
    }

    /// Identifiers of all failure domains, sorted
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Identifiers usable for control plane machines, sorted
    pub fn control_plane_names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, fd)| fd.control_plane)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Look up a failure domain
    pub fn get(&self, name: &str) -> Option<&FailureDomainSpec> {
        self.0.get(name)
    }

    /// Number of failure domains
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if none are known
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// HetznerClusterStatus defines the observed state of a HetznerCluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HetznerClusterStatus {
    /// Infrastructure is fully provisioned and ready for nodes
    #[serde(default)]
    #[schemars(extend("default" = false))]
    pub ready: bool,

    /// Observed private network
    #[serde(rename = "networkStatus", default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkStatus>,

    /// Observed control plane load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_load_balancer: Option<LoadBalancerStatus>,

    /// Observed placement groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hcloud_placement_groups: Vec<HCloudPlacementGroupStatus>,

    /// Failure domains actually usable
    #[serde(default, skip_serializing_if = "FailureDomains::is_empty")]
    pub failure_domains: FailureDomains,

    /// Reconciliation progress, at most one entry per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}

impl HasConditions for HetznerCluster {
    fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.status.get_or_insert_with(HetznerClusterStatus::default).conditions = conditions;
    }
}

impl HetznerCluster {
    /// Name of the owning cluster-api Cluster, from the standard label
    pub fn cluster_name(&self) -> Option<&str> {
        self.labels().get(CLUSTER_NAME_LABEL).map(String::as_str)
    }

    /// Load balancer name from the spec, or `<name>-kube-apiserver`
    pub fn load_balancer_name(&self) -> String {
        self.spec
            .control_plane_load_balancer
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.name_any(), LOAD_BALANCER_NAME_SUFFIX))
    }

    /// Status ready flag; false while no status was written
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    /// Merge patch touching only `status`, for the reconciler
    pub fn status_patch(&self) -> serde_json::Value {
        json!({ "status": self.status })
    }

    /// Merge patch touching only `spec`, for clients
    pub fn spec_patch(&self) -> serde_json::Value {
        json!({ "spec": self.spec })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{mark_true, READY_CONDITION};
    use chrono::Utc;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn cluster() -> HetznerCluster {
        HetznerCluster {
            metadata: ObjectMeta {
                name: Some("prod".to_string()),
                namespace: Some("default".to_string()),
                labels: Some(BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), "prod-cluster".to_string())])),
                ..Default::default()
            },
            spec: HetznerClusterSpec {
                hcloud_network: None,
                control_plane_regions: vec![Region::Fsn1, Region::Nbg1],
                ssh_keys: vec![],
                control_plane_endpoint: None,
                control_plane_load_balancer: LoadBalancerSpec::new(Region::Fsn1),
                hcloud_placement_groups: vec![],
                hetzner_secret_ref: HetznerSecretRef::with_default_key("hetzner"),
            },
            status: None,
        }
    }

    #[test]
    fn test_conditions_empty_without_status() {
        let cluster = cluster();
        assert!(cluster.conditions().is_empty());
        assert!(!cluster.is_ready());
    }

    #[test]
    fn test_set_conditions_creates_status() {
        let mut cluster = cluster();
        mark_true(&mut cluster, READY_CONDITION, Utc::now());

        let status = cluster.status.as_ref().unwrap();
        assert_eq!(status.conditions.len(), 1);
        assert!(!status.ready);
    }

    #[test]
    fn test_load_balancer_name() {
        let mut cluster = cluster();
        assert_eq!(cluster.load_balancer_name(), "prod-kube-apiserver");
        cluster.spec.control_plane_load_balancer.name = Some("api".to_string());
        assert_eq!(cluster.load_balancer_name(), "api");
        assert_eq!(cluster.cluster_name(), Some("prod-cluster"));
    }

    #[test]
    fn test_failure_domains_from_regions() {
        let domains = FailureDomains::from_regions(&[Region::Nbg1, Region::Fsn1]);
        assert_eq!(domains.names(), vec!["fsn1", "nbg1"]);
        assert_eq!(domains.control_plane_names(), vec!["fsn1", "nbg1"]);
        assert_eq!(
            serde_json::to_value(&domains).unwrap(),
            json!({"fsn1": {"controlPlane": true}, "nbg1": {"controlPlane": true}})
        );
    }

    #[test]
    fn test_patches_are_side_specific() {
        let mut cluster = cluster();
        cluster.status = Some(HetznerClusterStatus {
            ready: true,
            ..Default::default()
        });

        let status_patch = cluster.status_patch();
        assert!(status_patch.get("spec").is_none());
        assert_eq!(status_patch["status"]["ready"], true);

        let spec_patch = cluster.spec_patch();
        assert!(spec_patch.get("status").is_none());
        assert_eq!(spec_patch["spec"]["controlPlaneRegions"], json!(["fsn1", "nbg1"]));
    }

    #[test]
    fn test_api_endpoint() {
        assert!(ApiEndpoint::default().is_zero());
        let endpoint = ApiEndpoint::new("10.0.0.1", 6443);
        assert!(endpoint.is_valid());
        assert_eq!(endpoint.to_string(), "10.0.0.1:6443");
    }
}
