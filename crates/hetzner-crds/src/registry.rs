//! Resource kind registry
//!
//! Explicit replacement for a process-wide scheme: the binary builds one
//! [`SchemeRegistry`] at startup (usually via [`SchemeRegistry::with_defaults`])
//! and passes it to whatever needs polymorphic decoding or the CRD manifests.
//! Nothing registers itself implicitly.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResourceExt, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::conditions::HasConditions;
use crate::hetzner_cluster::HetznerCluster;

/// Errors from registering or decoding kinds
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Same kind registered twice
    #[error("kind {0} is already registered")]
    AlreadyRegistered(String),

    /// Input has no `kind` field
    #[error("object has no kind")]
    MissingKind,

    /// Kind not known to this registry
    #[error("kind {0} is not registered")]
    UnknownKind(String),

    /// Known kind, different group/version
    #[error("apiVersion {found} does not match {expected} registered for {kind}")]
    ApiVersionMismatch {
        /// Kind of the object
        kind: String,
        /// Registered apiVersion
        expected: String,
        /// apiVersion of the object
        found: String,
    },

    /// Object does not match the kind's schema
    #[error("failed to decode {kind}: {source}")]
    Decode {
        /// Kind being decoded
        kind: String,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// CRD manifest could not be rendered
    #[error("failed to render CRD manifest: {0}")]
    Render(#[from] serde_yaml::Error),
}

/// A decoded object of any registered kind
pub trait ConditionedResource: HasConditions + Debug + Send + Sync {
    /// Kind of the object
    fn kind_name(&self) -> String;

    /// `metadata.name`, or generateName
    fn object_name(&self) -> String;

    /// For downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;
}

impl<K> ConditionedResource for K
where
    K: HasConditions + Resource<DynamicType = ()> + Debug + Send + Sync + 'static,
{
    fn kind_name(&self) -> String {
        K::kind(&()).into_owned()
    }

    fn object_name(&self) -> String {
        self.name_any()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type DecodeFn = fn(Value) -> Result<Box<dyn ConditionedResource>, serde_json::Error>;

/// Metadata and constructors of one registered kind
#[derive(Debug, Clone)]
pub struct RegisteredKind {
    /// API group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind
    pub kind: String,
    /// Kind of the list wrapper (`<Kind>List`)
    pub list_kind: String,
    /// Plural resource name
    pub plural: String,
    crd: fn() -> CustomResourceDefinition,
    decode: DecodeFn,
}

impl RegisteredKind {
    /// `group/version`
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Generated CustomResourceDefinition
    pub fn crd(&self) -> CustomResourceDefinition {
        (self.crd)()
    }
}

fn decode_as<K>(value: Value) -> Result<Box<dyn ConditionedResource>, serde_json::Error>
where
    K: ConditionedResource + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<K>(value)?))
}

/// Registry of resource kinds keyed by kind name
#[derive(Debug, Default)]
pub struct SchemeRegistry {
    kinds: BTreeMap<String, RegisteredKind>,
    list_kinds: BTreeMap<String, String>,
}

impl SchemeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind of this crate registered
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        add_to_scheme(&mut registry)?;
        Ok(registry)
    }

    /// Register `K` and its list kind
    pub fn register<K>(&mut self) -> Result<(), RegistryError>
    where
        K: CustomResourceExt
            + Resource<DynamicType = ()>
            + HasConditions
            + DeserializeOwned
            + Debug
            + Send
            + Sync
            + 'static,
    {
        let kind = K::kind(&()).into_owned();
        if self.kinds.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }

        let entry = RegisteredKind {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: kind.clone(),
            list_kind: format!("{kind}List"),
            plural: K::plural(&()).into_owned(),
            crd: K::crd,
            decode: decode_as::<K>,
        };
        info!("Registered kind {} ({})", kind, entry.api_version());

        self.list_kinds.insert(entry.list_kind.clone(), kind.clone());
        self.kinds.insert(kind, entry);
        Ok(())
    }

    /// Look up a kind or list kind
    pub fn get(&self, kind: &str) -> Option<&RegisteredKind> {
        self.kinds
            .get(kind)
            .or_else(|| self.list_kinds.get(kind).and_then(|k| self.kinds.get(k)))
    }

    /// Registered kinds, sorted by kind
    pub fn kinds(&self) -> impl Iterator<Item = &RegisteredKind> {
        self.kinds.values()
    }

    /// Decode a single object using its `kind` and `apiVersion`
    pub fn decode(&self, value: Value) -> Result<Box<dyn ConditionedResource>, RegistryError> {
        let kind = object_kind(&value)?;
        let entry = self
            .kinds
            .get(&kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.clone()))?;
        check_api_version(entry, &kind, &value)?;

        debug!("Decoding {}", kind);
        (entry.decode)(value).map_err(|source| RegistryError::Decode { kind, source })
    }

    /// Decode a `<Kind>List` into its items
    pub fn decode_list(&self, value: Value) -> Result<Vec<Box<dyn ConditionedResource>>, RegistryError> {
        let list_kind = object_kind(&value)?;
        let entry = self
            .list_kinds
            .get(&list_kind)
            .and_then(|k| self.kinds.get(k))
            .ok_or_else(|| RegistryError::UnknownKind(list_kind.clone()))?;
        check_api_version(entry, &list_kind, &value)?;

        let items = match value {
            Value::Object(mut map) => map.remove("items").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        let items = match items {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(RegistryError::Decode {
                    kind: list_kind,
                    source: serde::de::Error::custom(format!("items must be a list, got {other}")),
                });
            }
        };

        items
            .into_iter()
            .map(|item| {
                (entry.decode)(item).map_err(|source| RegistryError::Decode {
                    kind: entry.kind.clone(),
                    source,
                })
            })
            .collect()
    }

    /// CRDs of all registered kinds
    pub fn crds(&self) -> Vec<CustomResourceDefinition> {
        self.kinds.values().map(RegisteredKind::crd).collect()
    }

    /// All CRDs as one multi-document YAML manifest
    pub fn crds_yaml(&self) -> Result<String, RegistryError> {
        let mut out = String::new();
        for crd in self.crds() {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&crd)?);
        }
        Ok(out)
    }
}

/// Register every kind defined in this crate
pub fn add_to_scheme(registry: &mut SchemeRegistry) -> Result<(), RegistryError> {
    registry.register::<HetznerCluster>()
}

fn object_kind(value: &Value) -> Result<String, RegistryError> {
    value
        .get("kind")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or(RegistryError::MissingKind)
}

fn check_api_version(entry: &RegisteredKind, kind: &str, value: &Value) -> Result<(), RegistryError> {
    let expected = entry.api_version();
    match value.get("apiVersion").and_then(Value::as_str) {
        Some(found) if found != expected => Err(RegistryError::ApiVersionMismatch {
            kind: kind.to_string(),
            expected,
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}
