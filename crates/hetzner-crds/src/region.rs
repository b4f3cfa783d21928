//! Hetzner Cloud regions and network zones

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hetzner Cloud location a control plane can be placed in
///
/// HCloud networks have very low latency inside a network zone, so a region is
/// treated like a topology zone (`topology.kubernetes.io/zone`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Falkenstein, Germany
    Fsn1,
    /// Nuremberg, Germany
    Nbg1,
    /// Helsinki, Finland
    Hel1,
    /// Ashburn, Virginia
    Ash,
    /// Hillsboro, Oregon
    Hil,
}

impl Region {
    /// All known regions
    pub const ALL: [Region; 5] = [Region::Fsn1, Region::Nbg1, Region::Hel1, Region::Ash, Region::Hil];

    /// Wire identifier of the region
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Fsn1 => "fsn1",
            Region::Nbg1 => "nbg1",
            Region::Hel1 => "hel1",
            Region::Ash => "ash",
            Region::Hil => "hil",
        }
    }

    /// Network zone the region belongs to
    pub fn network_zone(&self) -> NetworkZone {
        match self {
            Region::Fsn1 | Region::Nbg1 | Region::Hel1 => NetworkZone::EuCentral,
            Region::Ash => NetworkZone::UsEast,
            Region::Hil => NetworkZone::UsWest,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Network zone of an HCloud private network
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkZone {
    /// Europe (fsn1, nbg1, hel1)
    #[default]
    EuCentral,
    /// US east coast (ash)
    UsEast,
    /// US west coast (hil)
    UsWest,
}
