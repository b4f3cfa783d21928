//! Condition protocol
//!
//! Conditions are the externally observable progress signal of a resource. Each
//! condition is identified by its `type`; a resource carries at most one condition
//! per type.
//!
//! Storage and policy are split on purpose:
//! - [`HasConditions`] is the storage capability a resource kind exposes. Its
//!   `set_conditions` replaces the whole list and does nothing else.
//! - The free functions in this module ([`set_condition`], [`mark_true`],
//!   [`summarize`], ...) implement the read-modify-write upsert on top of it and
//!   take the current time as an argument, so the model never reads a clock.
//!
//! Callers doing an upsert must hold whatever single-writer guarantee the
//! surrounding system provides; nothing here is synchronized.

use chrono::{DateTime, Utc};
use schemars::generate::SchemaGenerator;
use schemars::{json_schema, JsonSchema, Schema};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Aggregated readiness of a resource
pub const READY_CONDITION: &str = "Ready";
/// Private network exists and is attached
pub const NETWORK_ATTACHED_CONDITION: &str = "NetworkAttached";
/// Control plane load balancer exists and targets are attached
pub const LOAD_BALANCER_ATTACHED_CONDITION: &str = "LoadBalancerAttached";
/// Placement groups match the spec
pub const PLACEMENT_GROUPS_SYNCED_CONDITION: &str = "PlacementGroupsSynced";
/// The Hetzner API answered with the referenced credentials
pub const HETZNER_API_REACHABLE_CONDITION: &str = "HetznerAPIReachable";

/// Network could not be created or attached
pub const NETWORK_RECONCILE_FAILED_REASON: &str = "NetworkReconcileFailed";
/// Load balancer could not be created
pub const LOAD_BALANCER_CREATE_FAILED_REASON: &str = "LoadBalancerCreateFailed";
/// Load balancer could not be updated
pub const LOAD_BALANCER_UPDATE_FAILED_REASON: &str = "LoadBalancerUpdateFailed";
/// Placement groups could not be reconciled
pub const PLACEMENT_GROUPS_SYNC_FAILED_REASON: &str = "PlacementGroupsSyncFailed";
/// Referenced Secret is missing or lacks the token key
pub const HETZNER_SECRET_UNREACHABLE_REASON: &str = "HetznerSecretUnreachable";
/// Token was rejected by the Hetzner API
pub const HCLOUD_CREDENTIALS_INVALID_REASON: &str = "HCloudCredentialsInvalid";
/// Summary reason while some aggregated condition is not reported yet
pub const WAITING_FOR_CONDITIONS_REASON: &str = "WaitingForConditions";

/// Condition status following Kubernetes conventions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not determined yet. Also how consumers treat an absent condition.
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// How bad a False condition is (cluster-api convention)
///
/// Only meaningful when the status is False. Ordered from least to most severe so
/// `max()` picks the worst one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConditionSeverity {
    /// Informational, e.g. an operation in progress
    Info,
    /// Degraded but may recover without intervention
    Warning,
    /// Needs user attention
    Error,
}

/// A typed, timestamped observation about a resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, unique within one resource (e.g. "Ready")
    #[serde(rename = "type")]
    pub type_: String,

    /// True, False or Unknown
    pub status: ConditionStatus,

    /// Severity of a False condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "severity_schema")]
    pub severity: Option<ConditionSeverity>,

    /// Last time `status` changed
    pub last_transition_time: DateTime<Utc>,

    /// CamelCase machine-readable reason for the last status
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human readable detail
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    /// Create a condition observed at `now` with empty reason and message
    pub fn new(type_: impl Into<String>, status: ConditionStatus, now: DateTime<Utc>) -> Self {
        Self {
            type_: type_.into(),
            status,
            severity: None,
            last_transition_time: now,
            reason: String::new(),
            message: String::new(),
        }
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the severity. Ignored for True conditions.
    pub fn with_severity(mut self, severity: ConditionSeverity) -> Self {
        if self.status != ConditionStatus::True {
            self.severity = Some(severity);
        }
        self
    }

    /// True if this condition has the given type
    pub fn is(&self, type_: &str) -> bool {
        self.type_ == type_
    }
}

fn severity_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "description": "Severity of a False condition",
        "type": "string",
        "enum": ["Info", "Warning", "Error"],
        "nullable": true,
    })
}

/// Schema for a `conditions` list: a list-map keyed on `type`
///
/// Lets the API server reject a second entry of the same type and merge
/// conditions by type on server-side apply.
pub fn conditions_schema(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "description": "Reconciliation progress, at most one entry per type",
        "type": "array",
        "x-kubernetes-list-type": "map",
        "x-kubernetes-list-map-keys": ["type"],
        "items": {
            "type": "object",
            "properties": {
                "type": { "type": "string", "minLength": 1 },
                "status": { "type": "string", "enum": ["True", "False", "Unknown"] },
                "severity": { "type": "string", "enum": ["Info", "Warning", "Error"] },
                "lastTransitionTime": { "type": "string", "format": "date-time" },
                "reason": { "type": "string" },
                "message": { "type": "string" }
            },
            "required": ["type", "status", "lastTransitionTime"],
        },
    })
}

/// A resource that exposes a list of conditions
///
/// `set_conditions` is a plain full replace: it must not merge, dedupe or touch
/// timestamps. Callers that pass a precomputed list rely on that.
pub trait HasConditions {
    /// Current conditions in insertion order. Empty if none were set.
    fn conditions(&self) -> &[Condition];

    /// Replace the whole condition list
    fn set_conditions(&mut self, conditions: Vec<Condition>);
}

/// Find a condition by type
pub fn get_condition<'a, T: HasConditions + ?Sized>(obj: &'a T, type_: &str) -> Option<&'a Condition> {
    obj.conditions().iter().find(|c| c.is(type_))
}

/// Status of a condition; absent conditions read as Unknown
pub fn condition_status<T: HasConditions + ?Sized>(obj: &T, type_: &str) -> ConditionStatus {
    get_condition(obj, type_).map_or(ConditionStatus::Unknown, |c| c.status)
}

/// Check if a condition is present and True
pub fn is_true<T: HasConditions + ?Sized>(obj: &T, type_: &str) -> bool {
    condition_status(obj, type_) == ConditionStatus::True
}

/// Check if a condition is present and False
pub fn is_false<T: HasConditions + ?Sized>(obj: &T, type_: &str) -> bool {
    condition_status(obj, type_) == ConditionStatus::False
}

/// Upsert a condition by type
///
/// - no condition of that type yet: appended at the end
/// - same status as the existing one: replaced in place, keeping the existing
///   `last_transition_time`
/// - different status: replaced in place with the new condition's timestamp
///
/// The incoming condition's `last_transition_time` is taken as "now".
///
/// Returns true if the status transitioned (including first appearance).
pub fn set_condition<T: HasConditions + ?Sized>(obj: &mut T, mut condition: Condition) -> bool {
    let mut conditions = obj.conditions().to_vec();

    let transitioned = match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            let changed = existing.status != condition.status;
            if changed {
                debug!(
                    condition = %condition.type_,
                    from = %existing.status,
                    to = %condition.status,
                    reason = %condition.reason,
                    "Condition transitioned"
                );
            } else {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            changed
        }
        None => {
            debug!(
                condition = %condition.type_,
                status = %condition.status,
                reason = %condition.reason,
                "Condition added"
            );
            conditions.push(condition);
            true
        }
    };

    obj.set_conditions(conditions);
    transitioned
}

/// Set a condition to True with no reason
pub fn mark_true<T: HasConditions + ?Sized>(obj: &mut T, type_: &str, now: DateTime<Utc>) -> bool {
    set_condition(obj, Condition::new(type_, ConditionStatus::True, now))
}

/// Set a condition to False
pub fn mark_false<T: HasConditions + ?Sized>(
    obj: &mut T,
    type_: &str,
    reason: &str,
    severity: ConditionSeverity,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    set_condition(
        obj,
        Condition::new(type_, ConditionStatus::False, now)
            .with_reason(reason)
            .with_severity(severity)
            .with_message(message),
    )
}

/// Set a condition to Unknown
pub fn mark_unknown<T: HasConditions + ?Sized>(
    obj: &mut T,
    type_: &str,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    set_condition(
        obj,
        Condition::new(type_, ConditionStatus::Unknown, now)
            .with_reason(reason)
            .with_message(message),
    )
}

/// Remove a condition by type. Order of the others is kept.
pub fn delete_condition<T: HasConditions + ?Sized>(obj: &mut T, type_: &str) -> bool {
    let before = obj.conditions().len();
    let conditions: Vec<Condition> = obj
        .conditions()
        .iter()
        .filter(|c| !c.is(type_))
        .cloned()
        .collect();
    let removed = conditions.len() != before;
    if removed {
        obj.set_conditions(conditions);
    }
    removed
}

/// Aggregate `types` into a Ready condition observed at `now`
///
/// - any False: Ready is False, carrying reason, severity and message of the most
///   severe False condition (first in `types` order on ties)
/// - all present and True: Ready is True
/// - otherwise Unknown, naming the first condition not reported yet
///
/// Works on any resource kind implementing [`HasConditions`].
pub fn summarize<T: HasConditions + ?Sized>(obj: &T, types: &[&str], now: DateTime<Utc>) -> Condition {
    let mut worst: Option<&Condition> = None;
    for type_ in types {
        if let Some(c) = get_condition(obj, type_).filter(|c| c.status == ConditionStatus::False) {
            worst = match worst {
                Some(w) if w.severity >= c.severity => Some(w),
                _ => Some(c),
            };
        }
    }

    if let Some(failed) = worst {
        let mut ready = Condition::new(READY_CONDITION, ConditionStatus::False, now)
            .with_reason(failed.reason.clone())
            .with_message(failed.message.clone());
        ready.severity = failed.severity;
        return ready;
    }

    match types.iter().find(|t| !is_true(obj, t)) {
        None => Condition::new(READY_CONDITION, ConditionStatus::True, now),
        Some(pending) => Condition::new(READY_CONDITION, ConditionStatus::Unknown, now)
            .with_reason(WAITING_FOR_CONDITIONS_REASON)
            .with_message(format!("waiting for {pending}")),
    }
}

/// Recompute Ready from `types` and upsert it
///
/// Returns the resulting Ready status.
pub fn set_ready_summary<T: HasConditions + ?Sized>(
    obj: &mut T,
    types: &[&str],
    now: DateTime<Utc>,
) -> ConditionStatus {
    let ready = summarize(obj, types, now);
    let status = ready.status;
    set_condition(obj, ready);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Minimal second kind to exercise the capability independently of HetznerCluster
    #[derive(Debug, Default)]
    struct Machine {
        conditions: Vec<Condition>,
    }

    impl HasConditions for Machine {
        fn conditions(&self) -> &[Condition] {
            &self.conditions
        }

        fn set_conditions(&mut self, conditions: Vec<Condition>) {
            self.conditions = conditions;
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()
    }

    fn types(obj: &Machine) -> Vec<&str> {
        obj.conditions().iter().map(|c| c.type_.as_str()).collect()
    }

    #[test]
    fn test_set_condition_adds_new() {
        let mut machine = Machine::default();
        assert!(mark_true(&mut machine, READY_CONDITION, at(0)));

        assert_eq!(machine.conditions().len(), 1);
        assert!(is_true(&machine, READY_CONDITION));
        assert_eq!(machine.conditions()[0].last_transition_time, at(0));
    }

    #[test]
    fn test_same_upsert_twice_keeps_first_timestamp() {
        let mut machine = Machine::default();
        let condition = |now| {
            Condition::new(READY_CONDITION, ConditionStatus::False, now)
                .with_reason("Provisioning")
                .with_message("creating load balancer")
        };

        assert!(set_condition(&mut machine, condition(at(0))));
        assert!(!set_condition(&mut machine, condition(at(5))));

        assert_eq!(machine.conditions().len(), 1);
        assert_eq!(machine.conditions()[0].last_transition_time, at(0));
    }

    #[test]
    fn test_status_change_bumps_timestamp() {
        let mut machine = Machine::default();
        mark_false(&mut machine, READY_CONDITION, "Provisioning", ConditionSeverity::Info, "", at(0));
        mark_true(&mut machine, READY_CONDITION, at(3));

        let ready = get_condition(&machine, READY_CONDITION).unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert_eq!(ready.last_transition_time, at(3));
        assert_eq!(ready.severity, None);
        assert!(ready.reason.is_empty());
    }

    #[test]
    fn test_reason_change_without_status_change_keeps_timestamp() {
        let mut machine = Machine::default();
        mark_false(&mut machine, READY_CONDITION, "Provisioning", ConditionSeverity::Info, "a", at(0));
        mark_false(&mut machine, READY_CONDITION, "LoadBalancerCreateFailed", ConditionSeverity::Error, "b", at(7));

        let ready = get_condition(&machine, READY_CONDITION).unwrap();
        assert_eq!(ready.last_transition_time, at(0));
        assert_eq!(ready.reason, "LoadBalancerCreateFailed");
        assert_eq!(ready.message, "b");
        assert_eq!(ready.severity, Some(ConditionSeverity::Error));
    }

    #[test]
    fn test_at_most_one_condition_per_type() {
        let mut machine = Machine::default();
        let statuses = [
            ConditionStatus::Unknown,
            ConditionStatus::True,
            ConditionStatus::False,
            ConditionStatus::False,
            ConditionStatus::True,
        ];
        for (i, status) in statuses.into_iter().enumerate() {
            set_condition(
                &mut machine,
                Condition::new(NETWORK_ATTACHED_CONDITION, status, at(i as u32)).with_reason(format!("R{i}")),
            );
        }

        let count = machine.conditions().iter().filter(|c| c.is(NETWORK_ATTACHED_CONDITION)).count();
        assert_eq!(count, 1);
        assert_eq!(get_condition(&machine, NETWORK_ATTACHED_CONDITION).unwrap().reason, "R4");
    }

    #[test]
    fn test_in_place_replace_preserves_order() {
        let mut machine = Machine::default();
        mark_true(&mut machine, "A", at(0));
        mark_true(&mut machine, "B", at(1));
        mark_true(&mut machine, "A", at(2));
        assert_eq!(types(&machine), vec!["A", "B"]);

        mark_false(&mut machine, "A", "Broken", ConditionSeverity::Warning, "", at(3));
        assert_eq!(types(&machine), vec!["A", "B"]);
    }

    #[test]
    fn test_set_conditions_is_full_replace() {
        let mut machine = Machine::default();
        mark_true(&mut machine, "A", at(0));

        let duplicated = vec![
            Condition::new("B", ConditionStatus::True, at(1)),
            Condition::new("B", ConditionStatus::False, at(2)),
        ];
        machine.set_conditions(duplicated.clone());
        assert_eq!(machine.conditions(), duplicated.as_slice());
    }

    #[test]
    fn test_absent_condition_reads_unknown() {
        let machine = Machine::default();
        assert_eq!(condition_status(&machine, READY_CONDITION), ConditionStatus::Unknown);
        assert!(!is_true(&machine, READY_CONDITION));
        assert!(!is_false(&machine, READY_CONDITION));
    }

    #[test]
    fn test_delete_condition() {
        let mut machine = Machine::default();
        mark_true(&mut machine, "A", at(0));
        mark_true(&mut machine, "B", at(0));
        mark_true(&mut machine, "C", at(0));

        assert!(delete_condition(&mut machine, "B"));
        assert!(!delete_condition(&mut machine, "B"));
        assert_eq!(types(&machine), vec!["A", "C"]);
    }

    #[test]
    fn test_severity_ignored_on_true() {
        let condition = Condition::new("A", ConditionStatus::True, at(0)).with_severity(ConditionSeverity::Error);
        assert_eq!(condition.severity, None);
    }

    #[test]
    fn test_summary_all_true() {
        let mut machine = Machine::default();
        mark_true(&mut machine, NETWORK_ATTACHED_CONDITION, at(0));
        mark_true(&mut machine, LOAD_BALANCER_ATTACHED_CONDITION, at(0));

        let status = set_ready_summary(
            &mut machine,
            &[NETWORK_ATTACHED_CONDITION, LOAD_BALANCER_ATTACHED_CONDITION],
            at(1),
        );
        assert_eq!(status, ConditionStatus::True);
        assert!(is_true(&machine, READY_CONDITION));
    }

    #[test]
    fn test_summary_picks_most_severe_false() {
        let mut machine = Machine::default();
        mark_false(&mut machine, NETWORK_ATTACHED_CONDITION, "Slow", ConditionSeverity::Info, "slow", at(0));
        mark_false(
            &mut machine,
            LOAD_BALANCER_ATTACHED_CONDITION,
            LOAD_BALANCER_CREATE_FAILED_REASON,
            ConditionSeverity::Error,
            "quota exceeded",
            at(0),
        );

        let ready = summarize(
            &machine,
            &[NETWORK_ATTACHED_CONDITION, LOAD_BALANCER_ATTACHED_CONDITION],
            at(1),
        );
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason, LOAD_BALANCER_CREATE_FAILED_REASON);
        assert_eq!(ready.severity, Some(ConditionSeverity::Error));
        assert_eq!(ready.message, "quota exceeded");
    }

    #[test]
    fn test_summary_waits_for_missing() {
        let mut machine = Machine::default();
        mark_true(&mut machine, NETWORK_ATTACHED_CONDITION, at(0));

        let ready = summarize(
            &machine,
            &[NETWORK_ATTACHED_CONDITION, PLACEMENT_GROUPS_SYNCED_CONDITION],
            at(1),
        );
        assert_eq!(ready.status, ConditionStatus::Unknown);
        assert_eq!(ready.reason, WAITING_FOR_CONDITIONS_REASON);
        assert!(ready.message.contains(PLACEMENT_GROUPS_SYNCED_CONDITION));
    }

    #[test]
    fn test_works_through_trait_object() {
        let mut machine = Machine::default();
        let obj: &mut dyn HasConditions = &mut machine;
        mark_true(obj, READY_CONDITION, at(0));
        assert!(is_true(obj, READY_CONDITION));
    }

    #[test]
    fn test_condition_wire_format() {
        let condition = Condition::new(READY_CONDITION, ConditionStatus::False, at(0))
            .with_reason("Provisioning")
            .with_severity(ConditionSeverity::Info);
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "Ready",
                "status": "False",
                "severity": "Info",
                "lastTransitionTime": "2024-01-01T00:00:00Z",
                "reason": "Provisioning"
            })
        );
    }

    #[test]
    fn test_conditions_schema_is_list_map_by_type() {
        let schema = conditions_schema(&mut SchemaGenerator::default());
        let value = schema.as_value();
        assert_eq!(value["type"], "array");
        assert_eq!(value["x-kubernetes-list-type"], "map");
        assert_eq!(value["x-kubernetes-list-map-keys"], serde_json::json!(["type"]));
        assert_eq!(value["items"]["properties"]["severity"]["type"], "string");
    }

    #[test]
    fn test_severity_schema_has_type() {
        let schema = schemars::schema_for!(Condition);
        let severity = &schema.as_value()["properties"]["severity"];
        assert_eq!(severity["type"], "string");
        assert_eq!(severity["enum"], serde_json::json!(["Info", "Warning", "Error"]));
        assert!(severity.get("anyOf").is_none());
    }
}
