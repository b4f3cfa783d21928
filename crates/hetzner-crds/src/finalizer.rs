//! Finalizer handling
//!
//! A finalizer token blocks physical removal of a resource until the process
//! owning the token has cleaned up external state (HCloud load balancer, network,
//! placement groups) and removed it again. Helpers are generic over any
//! `kube::Resource` and only touch `metadata.finalizers`.

use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::info;

/// Finalizer set on HetznerCluster objects by the reconciler
pub const HETZNER_CLUSTER_FINALIZER: &str = "hetznercluster.infrastructure.cluster.x-k8s.io";

/// Check if `finalizer` is present
pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

/// Add `finalizer` unless already present
///
/// Returns true if the list changed.
pub fn add_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if has_finalizer(obj, finalizer) {
        return false;
    }
    obj.finalizers_mut().push(finalizer.to_string());
    info!("Added finalizer {} to {}", finalizer, obj.name_any());
    true
}

/// Remove every occurrence of `finalizer`
///
/// Returns true if the list changed.
pub fn remove_finalizer<K: Resource>(obj: &mut K, finalizer: &str) -> bool {
    if !has_finalizer(obj, finalizer) {
        return false;
    }
    obj.finalizers_mut().retain(|f| f != finalizer);
    info!("Removed finalizer {} from {}", finalizer, obj.name_any());
    true
}

/// Deletion was requested but may still be blocked by finalizers
pub fn is_being_deleted<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// True once no finalizer remains, i.e. storage may physically remove the object
pub fn deletion_allowed<K: Resource>(obj: &K) -> bool {
    obj.finalizers().is_empty()
}

/// Merge patch setting `metadata.finalizers` to the object's current list
pub fn finalizers_patch<K: Resource>(obj: &K) -> serde_json::Value {
    json!({
        "metadata": {
            "finalizers": obj.finalizers()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HetznerCluster, HetznerClusterSpec, HetznerSecretRef, LoadBalancerSpec, Region};

    fn cluster() -> HetznerCluster {
        HetznerCluster::new(
            "prod",
            HetznerClusterSpec {
                hcloud_network: None,
                control_plane_regions: vec![Region::Fsn1],
                ssh_keys: vec![],
                control_plane_endpoint: None,
                control_plane_load_balancer: LoadBalancerSpec::new(Region::Fsn1),
                hcloud_placement_groups: vec![],
                hetzner_secret_ref: HetznerSecretRef::with_default_key("hetzner"),
            },
        )
    }

    #[test]
    fn test_finalizer_name() {
        assert_eq!(HETZNER_CLUSTER_FINALIZER, "hetznercluster.infrastructure.cluster.x-k8s.io");
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut cluster = cluster();
        assert!(add_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER));
        assert!(!add_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER));
        assert_eq!(cluster.finalizers().len(), 1);
    }

    #[test]
    fn test_deletion_gated_until_all_finalizers_removed() {
        let mut cluster = cluster();
        assert!(deletion_allowed(&cluster));

        add_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER);
        add_finalizer(&mut cluster, "example.com/other-owner");
        cluster.metadata.deletion_timestamp = Some(serde_json::from_value(json!("2024-01-01T00:00:00Z")).unwrap());
        assert!(is_being_deleted(&cluster));
        assert!(!deletion_allowed(&cluster));

        assert!(remove_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER));
        assert!(!deletion_allowed(&cluster));

        assert!(remove_finalizer(&mut cluster, "example.com/other-owner"));
        assert!(deletion_allowed(&cluster));
        assert!(!remove_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER));
    }

    #[test]
    fn test_finalizers_patch() {
        let mut cluster = cluster();
        add_finalizer(&mut cluster, HETZNER_CLUSTER_FINALIZER);
        assert_eq!(
            finalizers_patch(&cluster),
            json!({"metadata": {"finalizers": [HETZNER_CLUSTER_FINALIZER]}})
        );
    }
}
