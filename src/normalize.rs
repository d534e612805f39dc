//! Field-level type fixups for responses whose JSON types drift between
//! server versions.
//!
//! The fixups live in one declarative table ([`DEFAULT_RULES`]). A rule names
//! the commands it applies to, a path into the unwrapped payload and the
//! coercion to run there. Paths are dot separated; `*` walks every element
//! of an array. Missing fields and `null` are left alone, while a present
//! value that cannot be converted is a hard decode error.

use crate::error::{KcpsError, Result};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

/// Offset the control plane reports VM creation times in.
const SERVICE_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// A type fix applied to a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `"42"` becomes `42`. Numbers pass through unchanged.
    IntFromString,
    /// Epoch milliseconds become an ISO-8601 timestamp at the service
    /// offset. Strings pass through unchanged.
    EpochMillisToIso8601,
}

impl Coercion {
    fn apply(self, value: &mut Value, path: &str) -> Result<()> {
        let replacement = match (self, &*value) {
            (_, Value::Null) => None,
            (Coercion::IntFromString, Value::Number(_)) => None,
            (Coercion::IntFromString, Value::String(s)) => {
                let parsed: i64 = s.parse().map_err(|e| {
                    KcpsError::Decode(format!("field {path}: cannot convert {s:?} to integer: {e}"))
                })?;
                Some(Value::from(parsed))
            }
            (Coercion::EpochMillisToIso8601, Value::String(_)) => None,
            (Coercion::EpochMillisToIso8601, Value::Number(n)) => {
                let millis = n.as_f64().ok_or_else(|| {
                    KcpsError::Decode(format!("field {path}: {n} is not a timestamp"))
                })?;
                Some(Value::String(format_epoch_millis(millis, path)?))
            }
            (_, other) => {
                return Err(KcpsError::Decode(format!(
                    "field {path}: unexpected value {other} for {self:?}"
                )));
            }
        };
        if let Some(new_value) = replacement {
            *value = new_value;
        }
        Ok(())
    }
}

fn format_epoch_millis(millis: f64, path: &str) -> Result<String> {
    let secs = (millis as i64) / 1000;
    let offset = FixedOffset::east_opt(SERVICE_UTC_OFFSET_SECS)
        .ok_or_else(|| KcpsError::decode("invalid service offset"))?;
    let utc = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        KcpsError::Decode(format!("field {path}: timestamp {millis} out of range"))
    })?;
    Ok(utc
        .with_timezone(&offset)
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string())
}

/// One entry of the fixup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Commands (case-insensitive) whose payload this rule touches.
    pub commands: &'static [&'static str],
    /// Dot-separated path into the unwrapped payload; `*` is any array element.
    pub path: &'static str,
    pub coercion: Coercion,
}

const FIREWALL_COMMANDS: &[&str] = &["listFirewallRules", "createFirewallRule", "deleteFirewallRule"];
const PREMIUM_HOST_COMMANDS: &[&str] = &["listPremiumHosts", "addPremiumHosts"];
const PREMIUM_VM_COMMANDS: &[&str] = &["listPremiumVirtualMachines"];

const fn rule(commands: &'static [&'static str], path: &'static str, coercion: Coercion) -> Rule {
    Rule {
        commands,
        path,
        coercion,
    }
}

/// Known schema inconsistencies.
pub const DEFAULT_RULES: &[Rule] = &[
    rule(FIREWALL_COMMANDS, "startport", Coercion::IntFromString),
    rule(FIREWALL_COMMANDS, "endport", Coercion::IntFromString),
    rule(FIREWALL_COMMANDS, "firewallrule.*.startport", Coercion::IntFromString),
    rule(FIREWALL_COMMANDS, "firewallrule.*.endport", Coercion::IntFromString),
    rule(PREMIUM_HOST_COMMANDS, "host.*.cpunumber", Coercion::IntFromString),
    rule(PREMIUM_HOST_COMMANDS, "host.*.cpuspeed", Coercion::IntFromString),
    rule(PREMIUM_HOST_COMMANDS, "host.*.memoryallocated", Coercion::IntFromString),
    rule(PREMIUM_HOST_COMMANDS, "host.*.memorytotal", Coercion::IntFromString),
    rule(PREMIUM_HOST_COMMANDS, "host.*.memoryused", Coercion::IntFromString),
    rule(PREMIUM_VM_COMMANDS, "virtualmachine.*.rootdeviceid", Coercion::IntFromString),
    rule(PREMIUM_VM_COMMANDS, "virtualmachine.*.created", Coercion::EpochMillisToIso8601),
];

/// Applies the fixup table to unwrapped payloads.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<Rule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }
}

impl Normalizer {
    /// A normalizer with no rules at all.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule on top of the current table.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Apply every rule registered for `command` to `payload`.
    pub fn normalize(&self, command: &str, mut payload: Value) -> Result<Value> {
        for rule in self.rules.iter().filter(|r| {
            r.commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(command))
        }) {
            let segments: Vec<&str> = rule.path.split('.').collect();
            apply_at(&mut payload, &segments, rule.path, rule.coercion)?;
        }
        Ok(payload)
    }
}

fn apply_at(value: &mut Value, segments: &[&str], path: &str, coercion: Coercion) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        return coercion.apply(value, path);
    };
    match (*head, value) {
        ("*", Value::Array(items)) => {
            for item in items {
                apply_at(item, rest, path, coercion)?;
            }
            Ok(())
        }
        (key, Value::Object(map)) => match map.get_mut(key) {
            Some(child) => apply_at(child, rest, path, coercion),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}
