//! Key and value normalisation for vendor JSON.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::sentinel::MISSING;

/// Fields of a monitor record that must always be lists.
const LIST_FIELDS: [&str; 4] = [
    "children_ids",
    "notification_id_list",
    "tags",
    "kafka_producer_brokers",
];

fn word_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("static regex"))
}

fn lower_upper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("static regex"))
}

/// Convert a camelCase key to snake_case (`notificationIDList` -> `notification_id_list`).
///
/// Already snake_cased keys are returned unchanged.
pub fn camel_to_snake(name: &str) -> String {
    let step = word_boundary().replace_all(name, "${1}_${2}");
    lower_upper().replace_all(&step, "${1}_${2}").to_lowercase()
}

/// Recursively replace `null` and empty strings with the missing placeholder.
///
/// `false`, `0` and empty collections are real values and are kept.
pub fn clean_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::String(MISSING.to_string()),
        Value::String(s) if s.is_empty() => Value::String(MISSING.to_string()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), clean_value(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clean_value).collect()),
        other => other.clone(),
    }
}

/// Snake-case the top-level keys of an object and clean every value.
pub fn normalize_object(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (camel_to_snake(k), clean_value(v)))
        .collect()
}

/// Truthiness of an arbitrary JSON value.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Normalise a monitor record for the monitor CRUD endpoints.
///
/// Keys are snake_cased and values cleaned. `active`, `force_inactive` and
/// `maintenance` become booleans and `status` mirrors `active` as 1/0.
pub fn normalize_monitor(monitor: &Map<String, Value>) -> Map<String, Value> {
    let mut out = normalize_object(monitor);

    let flag = |key: &str| {
        monitor
            .get(key)
            .or_else(|| monitor.get(&camel_to_snake(key)))
            .map_or(false, truthy)
    };
    let active = flag("active");
    out.insert("active".to_string(), Value::Bool(active));
    out.insert("force_inactive".to_string(), Value::Bool(flag("forceInactive")));
    out.insert("maintenance".to_string(), Value::Bool(flag("maintenance")));
    out.insert("status".to_string(), Value::from(if active { 1 } else { 0 }));

    for field in LIST_FIELDS {
        if let Some(value) = out.get_mut(field) {
            if !value.is_array() {
                *value = Value::Array(Vec::new());
            }
        }
    }

    out
}
