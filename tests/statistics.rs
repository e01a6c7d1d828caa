use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use servicemesh::stats::{FleetInput, FleetStatistics, MonitorBundle, MISSING};
use std::collections::BTreeMap;

#[derive(Deserialize)]
struct Fixture {
    info: Map<String, Value>,
    database_size: Value,
    monitors: BTreeMap<i64, MonitorBundle>,
}

fn fleet() -> Value {
    let fixture: Fixture =
        serde_json::from_str(include_str!("fixtures/fleet.json")).expect("valid fixture");
    let input = FleetInput {
        info: fixture.info,
        database_size: fixture.database_size,
        monitors: fixture.monitors,
    };
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    serde_json::to_value(FleetStatistics::build(&input, now)).unwrap()
}

fn assert_no_nulls(value: &Value, path: &str) {
    match value {
        Value::Null => panic!("null at {}", path),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                assert_no_nulls(item, &format!("{}[{}]", path, i));
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                assert_no_nulls(v, &format!("{}.{}", path, k));
            }
        }
        _ => {}
    }
}

#[test]
fn fleet_report_has_no_null_leaves() {
    assert_no_nulls(&fleet(), "$");
}

#[test]
fn fleet_partitions_monitors() {
    let stats = fleet();
    assert_eq!(stats["monitors_count"], 6);
    assert_eq!(stats["up_monitors_count"], 3);
    assert_eq!(stats["down_monitors_count"], 1);
    assert_eq!(stats["maintenance_monitors_count"], 2);
    assert_eq!(stats["up_percentage"], 75.0);

    let down = &stats["down_monitors"][0];
    assert_eq!(down["name"], "Backup host");
    assert_eq!(down["url"], MISSING);
    assert_eq!(down["last_error"], "Request timed out");
    assert_eq!(down["down_since"], "2024-05-01 10:55:00");
}

#[test]
fn fleet_monitors_sorted_by_name() {
    let stats = fleet();
    let names: Vec<&str> = stats["monitors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["API gateway", "Backup host", "billing", "dns", "Legacy CRM", "website"]
    );
}

#[test]
fn fleet_types_and_instance_info() {
    let stats = fleet();
    assert_eq!(
        stats["monitor_types"],
        serde_json::json!(["dns", "http", "keyword", "ping"])
    );
    assert_eq!(stats["monitors_by_type"]["http"], 3);

    let info = &stats["uptime_kuma_info"];
    assert_eq!(info["latest_version"], "1.23.16");
    assert_eq!(info["primary_base_url"], MISSING);
    assert_eq!(info["database_size_gb"], 2.0);
    assert_eq!(info["memory_usage_percent"], 25.0);
    assert_eq!(stats["timestamp"], "2024-05-01T12:00:00Z");
}

#[test]
fn fleet_monitor_details() {
    let stats = fleet();
    let website = stats["monitors"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == 1)
        .unwrap()
        .clone();

    assert_eq!(website["avg_ping_calculated"], 120.0);
    assert_eq!(website["uptime"]["24h_percent"], 99.9);
    assert_eq!(website["uptime"]["24h_quality"], "excellent");
    assert_eq!(website["cert_info"]["subject_cn"], "example.com");
    assert_eq!(website["logs"][0]["time"], "2024-05-01 11:59:00");
    assert_eq!(website["logs"][2]["time"], "2024-04-30 08:00:00");
}

#[test]
fn fleet_averages_exclude_maintenance() {
    let stats = fleet();
    // website 96.3, API gateway 96.5; Legacy CRM is in maintenance
    assert_eq!(stats["avg_health_score"], 96.4);
    assert_eq!(stats["avg_response_time"], 82.75);
}
