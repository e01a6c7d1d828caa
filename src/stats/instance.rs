//! Uptime Kuma instance information.

use serde_json::{Map, Value};

use super::normalize::normalize_object;
use super::sentinel::{round_to, MISSING};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snake-cased, cleaned copy of the vendor's instance info.
///
/// When both `mem_total` and `mem_used` are present a
/// `memory_usage_percent` field is derived from them.
pub fn transform_info(info: &Map<String, Value>) -> Map<String, Value> {
    let mut out = normalize_object(info);

    let memory = match (out.get("mem_total"), out.get("mem_used")) {
        (Some(total), Some(used)) => Some(match (used.as_f64(), total.as_f64()) {
            (Some(used), Some(total)) if total != 0.0 => {
                Value::from(round_to(used / total * 100.0, 2))
            }
            _ => Value::String(MISSING.to_string()),
        }),
        _ => None,
    };
    if let Some(percent) = memory {
        out.insert("memory_usage_percent".to_string(), percent);
    }

    out
}

/// Database size in GiB from the vendor's `{"size": bytes}` object.
///
/// Anything that is not an object with a numeric `size` counts as 0.
pub fn database_size_gb(database_size: &Value) -> f64 {
    database_size
        .get("size")
        .and_then(Value::as_f64)
        .map(|bytes| round_to(bytes / GIB, 2))
        .unwrap_or(0.0)
}

/// Instance info enriched with the database size, as reported for the fleet.
pub fn instance_summary(info: &Map<String, Value>, database_size: &Value) -> Map<String, Value> {
    let mut merged = info.clone();
    merged.insert("database_size".to_string(), database_size.clone());
    merged.insert(
        "database_size_gb".to_string(),
        Value::from(database_size_gb(database_size)),
    );
    transform_info(&merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_memory_usage() {
        let out = transform_info(&obj(json!({
            "version": "1.23.0",
            "latestVersion": null,
            "memTotal": 2048,
            "memUsed": 512
        })));
        assert_eq!(out["version"], json!("1.23.0"));
        assert_eq!(out["latest_version"], json!("-"));
        assert_eq!(out["memory_usage_percent"], json!(25.0));
    }

    #[test]
    fn test_memory_usage_degenerate() {
        let out = transform_info(&obj(json!({"memTotal": 0, "memUsed": 10})));
        assert_eq!(out["memory_usage_percent"], json!("-"));

        let out = transform_info(&obj(json!({"memTotal": null, "memUsed": 10})));
        assert_eq!(out["memory_usage_percent"], json!("-"));

        let out = transform_info(&obj(json!({"memUsed": 10})));
        assert!(!out.contains_key("memory_usage_percent"));
    }

    #[test]
    fn test_empty_info() {
        assert!(transform_info(&Map::new()).is_empty());
    }

    #[test]
    fn test_database_size() {
        assert_eq!(database_size_gb(&json!({"size": 3221225472u64})), 3.0);
        assert_eq!(database_size_gb(&json!({"size": "big"})), 0.0);
        assert_eq!(database_size_gb(&json!(12)), 0.0);

        let out = instance_summary(&Map::new(), &json!({"size": 1073741824u64}));
        assert_eq!(out["database_size"], json!({"size": 1073741824u64}));
        assert_eq!(out["database_size_gb"], json!(1.0));
    }
}
