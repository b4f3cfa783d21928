//! Boundary validation and defaulting
//!
//! Constraints a valid HetznerCluster must satisfy before it is persisted. The API
//! server enforces most of them through the generated CRD schema; this module
//! expresses the same contract in code for admission, tests and tooling.
//!
//! Schema-level defaults (`algorithm`, `type`, `port`) are applied here and
//! nowhere else.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::hetzner_cluster::{HetznerCluster, HetznerClusterSpec};
use crate::load_balancer::{
    LoadBalancerAlgorithm, LoadBalancerType, DEFAULT_API_SERVER_PORT, MAX_PORT, MIN_PORT,
};
use crate::region::Region;

/// Reasons a HetznerCluster is rejected at admission
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `controlPlaneRegions` missing or empty
    #[error("controlPlaneRegions must contain at least one region")]
    InvalidRegionList,

    /// Value outside an enumerated set
    #[error("invalid value {value} for {field}, expected one of: {allowed}")]
    InvalidEnumValue {
        /// Wire path of the field
        field: &'static str,
        /// Offending value as found in the input
        value: String,
        /// Accepted values
        allowed: String,
    },

    /// Port outside [1, 65535]
    #[error("port {0} out of range [1, 65535]")]
    InvalidPort(i64),

    /// `hetznerSecretRef` missing or incomplete
    #[error("hetznerSecretRef with name and key.hcloudToken is required")]
    MissingCredentialReference,

    /// Input does not match the schema otherwise
    #[error("malformed HetznerCluster: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fill schema defaults for unset optional fields
pub fn apply_defaults(spec: &mut HetznerClusterSpec) {
    let lb = &mut spec.control_plane_load_balancer;
    lb.algorithm = Some(lb.algorithm.unwrap_or_default());
    lb.type_ = Some(lb.type_.unwrap_or_default());
    lb.port = Some(lb.port.unwrap_or(DEFAULT_API_SERVER_PORT));
}

/// Check a typed spec against the admission constraints
pub fn validate(spec: &HetznerClusterSpec) -> Result<(), ValidationError> {
    if spec.control_plane_regions.is_empty() {
        return Err(ValidationError::InvalidRegionList);
    }

    if !spec.hetzner_secret_ref.is_complete() {
        return Err(ValidationError::MissingCredentialReference);
    }

    let lb = &spec.control_plane_load_balancer;
    if let Some(port) = lb.port {
        check_port(i64::from(port))?;
    }
    for target in &lb.targets {
        check_port(i64::from(target.listen_port))?;
        check_port(i64::from(target.destination_port))?;
    }

    Ok(())
}

/// Decode a raw `spec` object, apply defaults and validate
///
/// Enumerated fields and the port are checked on the raw value first so the
/// error names the offending field instead of a generic decode failure.
pub fn decode_spec(value: &Value) -> Result<HetznerClusterSpec, ValidationError> {
    let result = precheck(value).and_then(|()| {
        let mut spec: HetznerClusterSpec = serde_json::from_value(value.clone())?;
        apply_defaults(&mut spec);
        validate(&spec)?;
        Ok(spec)
    });

    match &result {
        Ok(spec) => debug!(
            regions = spec.control_plane_regions.len(),
            "HetznerCluster spec accepted"
        ),
        Err(e) => warn!("Rejected HetznerCluster spec: {}", e),
    }
    result
}

/// Decode a whole HetznerCluster object with a validated, defaulted spec
pub fn decode_cluster(value: &Value) -> Result<HetznerCluster, ValidationError> {
    let spec = decode_spec(value.get("spec").unwrap_or(&Value::Null))?;
    let mut cluster: HetznerCluster = serde_json::from_value(value.clone())?;
    cluster.spec = spec;
    Ok(cluster)
}

fn precheck(spec: &Value) -> Result<(), ValidationError> {
    let secret_ref = spec.get("hetznerSecretRef");
    let secret_name = secret_ref.and_then(|r| r.get("name")).and_then(Value::as_str);
    let token_key = secret_ref
        .and_then(|r| r.get("key"))
        .and_then(|k| k.get("hcloudToken"))
        .and_then(Value::as_str);
    if secret_name.is_none_or(str::is_empty) || token_key.is_none_or(str::is_empty) {
        return Err(ValidationError::MissingCredentialReference);
    }

    match spec.get("controlPlaneRegions").and_then(Value::as_array) {
        Some(regions) if !regions.is_empty() => {
            for region in regions {
                check_enum::<Region>("spec.controlPlaneRegions", region, &region_names())?;
            }
        }
        _ => return Err(ValidationError::InvalidRegionList),
    }

    if let Some(lb) = spec.get("controlPlaneLoadBalancer") {
        if let Some(algorithm) = lb.get("algorithm") {
            let allowed: Vec<&str> = LoadBalancerAlgorithm::ALL.iter().map(|a| a.as_str()).collect();
            check_enum::<LoadBalancerAlgorithm>("spec.controlPlaneLoadBalancer.algorithm", algorithm, &allowed)?;
        }
        if let Some(type_) = lb.get("type") {
            let allowed: Vec<&str> = LoadBalancerType::ALL.iter().map(|t| t.as_str()).collect();
            check_enum::<LoadBalancerType>("spec.controlPlaneLoadBalancer.type", type_, &allowed)?;
        }
        if let Some(region) = lb.get("region") {
            check_enum::<Region>("spec.controlPlaneLoadBalancer.region", region, &region_names())?;
        }
        match lb.get("port") {
            None | Some(Value::Null) => {}
            Some(port) => match port.as_i64() {
                Some(port) => check_port(port)?,
                None => {
                    return Err(ValidationError::Malformed(serde::de::Error::custom(format!(
                        "spec.controlPlaneLoadBalancer.port must be an integer in [{MIN_PORT}, {MAX_PORT}], got {port}"
                    ))));
                }
            },
        }
    }

    Ok(())
}

fn region_names() -> Vec<&'static str> {
    Region::ALL.iter().map(|r| r.as_str()).collect()
}

fn check_enum<T: std::str::FromStr>(
    field: &'static str,
    value: &Value,
    allowed: &[&str],
) -> Result<(), ValidationError> {
    if value.is_null() {
        return Ok(());
    }
    match value.as_str().map(str::parse::<T>) {
        Some(Ok(_)) => Ok(()),
        _ => Err(ValidationError::InvalidEnumValue {
            field,
            value: value.to_string(),
            allowed: allowed.join(", "),
        }),
    }
}

fn check_port(port: i64) -> Result<(), ValidationError> {
    if (i64::from(MIN_PORT)..=i64::from(MAX_PORT)).contains(&port) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPort(port))
    }
}
