//! HCloud placement groups

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired placement group
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HCloudPlacementGroupSpec {
    /// Name, unique within the cluster
    pub name: String,

    /// Placement strategy
    #[serde(rename = "type", default)]
    pub type_: PlacementGroupType,
}

/// Placement strategy of a group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlacementGroupType {
    /// Servers are spread across distinct physical hosts
    #[default]
    Spread,
}

/// Observed placement group
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HCloudPlacementGroupStatus {
    /// HCloud placement group ID
    #[serde(default)]
    pub id: i64,

    /// Name as in the spec
    #[serde(default)]
    pub name: String,

    /// Placement strategy
    #[serde(rename = "type", default)]
    pub type_: PlacementGroupType,

    /// IDs of servers in the group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<i64>,
}

impl HCloudPlacementGroupStatus {
    /// True if the observed group matches the desired one by name and type
    pub fn matches(&self, spec: &HCloudPlacementGroupSpec) -> bool {
        self.name == spec.name && self.type_ == spec.type_
    }
}
