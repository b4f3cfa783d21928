//! HetznerCluster CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for cluster-api infrastructure on
//! Hetzner Cloud, plus the condition protocol reconcilers use to report progress.
//!
//! - [`HetznerCluster`]: desired (`spec`, client owned) and observed (`status`,
//!   reconciler owned) state of the cluster infrastructure
//! - [`conditions`]: [`HasConditions`] capability and the upsert/summary helpers
//! - [`finalizer`]: deletion gating
//! - [`validation`]: admission constraints and schema defaults
//! - [`registry`]: explicit kind registry for polymorphic decoding and CRD output

pub mod conditions;
pub mod finalizer;
pub mod hetzner_cluster;
pub mod load_balancer;
pub mod network;
pub mod placement_group;
pub mod references;
pub mod region;
pub mod registry;
pub mod validation;

pub use conditions::{Condition, ConditionSeverity, ConditionStatus, HasConditions};
pub use finalizer::HETZNER_CLUSTER_FINALIZER;
pub use hetzner_cluster::*;
pub use load_balancer::*;
pub use network::*;
pub use placement_group::*;
pub use references::*;
pub use region::*;
pub use registry::{ConditionedResource, RegisteredKind, RegistryError, SchemeRegistry};
pub use validation::ValidationError;
