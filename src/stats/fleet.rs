//! Fleet-wide statistics across every monitor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::heartbeat::Quality;
use super::instance::instance_summary;
use super::monitor::MonitorStatistics;
use super::raw::MonitorBundle;
use super::sentinel::{or_dash, round_to, MISSING};

/// Everything fetched from Uptime Kuma for one fleet report.
#[derive(Debug, Clone, Default)]
pub struct FleetInput {
    pub info: Map<String, Value>,
    pub database_size: Value,
    /// Monitor bundles keyed by monitor id.
    pub monitors: BTreeMap<i64, MonitorBundle>,
}

/// Identity fields shared by every partition entry.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub id: i64,
    #[serde(serialize_with = "or_dash")]
    pub name: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub url: Option<String>,
    pub status: u8,
    pub active: bool,
    #[serde(rename = "type", serialize_with = "or_dash")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpMonitor {
    #[serde(flatten)]
    pub summary: MonitorSummary,
    #[serde(serialize_with = "or_dash")]
    pub avg_ping: Option<f64>,
    #[serde(serialize_with = "or_dash")]
    pub ping_quality: Option<Quality>,
    #[serde(serialize_with = "or_dash")]
    pub uptime_24h: Option<f64>,
    #[serde(serialize_with = "or_dash")]
    pub health_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownMonitor {
    #[serde(flatten)]
    pub summary: MonitorSummary,
    #[serde(serialize_with = "or_dash")]
    pub last_error: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub down_since: Option<String>,
}

/// Fleet report.
#[derive(Debug, Clone, Serialize)]
pub struct FleetStatistics {
    pub uptime_kuma_info: Map<String, Value>,
    pub monitors: Vec<MonitorStatistics>,
    pub monitors_count: usize,
    pub up_monitors: Vec<UpMonitor>,
    pub down_monitors: Vec<DownMonitor>,
    pub maintenance_monitors: Vec<MonitorSummary>,
    pub up_monitors_count: usize,
    pub down_monitors_count: usize,
    pub maintenance_monitors_count: usize,
    pub up_percentage: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "or_dash")]
    pub avg_health_score: Option<f64>,
    pub monitor_types: Vec<String>,
    pub monitors_by_type: BTreeMap<String, usize>,
    #[serde(serialize_with = "or_dash")]
    pub avg_response_time: Option<f64>,
}

impl FleetStatistics {
    /// Aggregate every monitor. `now` stamps the report.
    pub fn build(input: &FleetInput, now: DateTime<Utc>) -> Self {
        let mut monitors: Vec<MonitorStatistics> = input
            .monitors
            .iter()
            .map(|(id, bundle)| {
                let mut stats = MonitorStatistics::from_bundle(bundle);
                stats.id = Some(*id);
                stats
            })
            .collect();
        monitors.sort_by_cached_key(|m| m.name.as_deref().unwrap_or(MISSING).to_lowercase());

        let mut up_monitors = Vec::new();
        let mut down_monitors = Vec::new();
        let mut maintenance_monitors = Vec::new();
        for stats in &monitors {
            let summary = summarize(stats);
            if stats.maintenance {
                maintenance_monitors.push(summary);
            } else if stats.active {
                up_monitors.push(UpMonitor {
                    summary,
                    avg_ping: stats.avg_ping_calculated,
                    ping_quality: stats.ping_quality,
                    uptime_24h: stats.uptime.percent("24"),
                    health_score: stats.health_score,
                });
            } else {
                let latest = stats.important_heartbeats.first();
                down_monitors.push(DownMonitor {
                    summary,
                    last_error: latest.and_then(|hb| hb.msg.clone()),
                    down_since: latest.and_then(|hb| hb.time.clone()),
                });
            }
        }

        let monitored = up_monitors.len() + down_monitors.len();
        let up_percentage = if monitored > 0 {
            round_to(up_monitors.len() as f64 / monitored as f64 * 100.0, 2)
        } else {
            0.0
        };

        let in_service = || monitors.iter().filter(|m| !m.maintenance);
        let avg_health_score =
            average(in_service().filter_map(|m| m.health_score)).map(|v| round_to(v, 1));
        let avg_response_time =
            average(in_service().filter_map(|m| m.avg_ping_calculated)).map(|v| round_to(v, 2));

        let monitor_types: BTreeSet<String> =
            monitors.iter().filter_map(|m| m.kind.clone()).collect();
        let mut monitors_by_type = BTreeMap::new();
        for kind in monitors.iter().filter_map(|m| m.kind.clone()) {
            *monitors_by_type.entry(kind).or_insert(0) += 1;
        }

        Self {
            uptime_kuma_info: instance_summary(&input.info, &input.database_size),
            monitors_count: monitors.len(),
            up_monitors_count: up_monitors.len(),
            down_monitors_count: down_monitors.len(),
            maintenance_monitors_count: maintenance_monitors.len(),
            monitors,
            up_monitors,
            down_monitors,
            maintenance_monitors,
            up_percentage,
            timestamp: now,
            avg_health_score,
            monitor_types: monitor_types.into_iter().collect(),
            monitors_by_type,
            avg_response_time,
        }
    }
}

fn summarize(stats: &MonitorStatistics) -> MonitorSummary {
    MonitorSummary {
        id: stats.id.unwrap_or_default(),
        name: stats.name.clone(),
        url: stats.url.clone(),
        status: stats.status,
        active: stats.active,
        kind: stats.kind.clone(),
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn monitor(name: &str, active: bool, maintenance: bool) -> MonitorBundle {
        serde_json::from_value(json!({
            "monitor": {"name": name, "type": "http", "active": active, "maintenance": maintenance}
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_partition_and_percentage() {
        let mut input = FleetInput::default();
        let fleet = [
            ("a", true, false),
            ("b", true, false),
            ("c", true, false),
            ("d", false, false),
            ("e", true, true),
            ("f", false, true),
        ];
        for (i, (name, active, maintenance)) in fleet.iter().enumerate() {
            input
                .monitors
                .insert(i as i64 + 1, monitor(name, *active, *maintenance));
        }

        let stats = FleetStatistics::build(&input, now());
        assert_eq!(stats.monitors_count, 6);
        assert_eq!(stats.up_monitors_count, 3);
        assert_eq!(stats.down_monitors_count, 1);
        assert_eq!(stats.maintenance_monitors_count, 2);
        assert_eq!(stats.up_percentage, 75.0);
    }

    #[test]
    fn test_empty_fleet() {
        let stats = FleetStatistics::build(&FleetInput::default(), now());
        assert_eq!(stats.up_percentage, 0.0);
        assert_eq!(stats.monitors_count, 0);
        let out = serde_json::to_value(&stats).unwrap();
        assert_eq!(out["avg_health_score"], json!("-"));
        assert_eq!(out["avg_response_time"], json!("-"));
        assert_eq!(out["uptime_kuma_info"]["database_size_gb"], json!(0.0));
        assert_eq!(out["timestamp"], json!("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn test_all_in_maintenance() {
        let mut input = FleetInput::default();
        input.monitors.insert(1, monitor("a", true, true));
        let stats = FleetStatistics::build(&input, now());
        assert_eq!(stats.up_percentage, 0.0);
        assert_eq!(stats.maintenance_monitors_count, 1);
    }

    #[test]
    fn test_sorted_by_name_with_forced_ids() {
        let mut input = FleetInput::default();
        input.monitors.insert(7, serde_json::from_value(json!({
            "monitor": {"id": "99", "name": "beta", "type": "ping", "active": true}
        })).unwrap());
        input.monitors.insert(8, monitor("Alpha", true, false));
        let stats = FleetStatistics::build(&input, now());
        let names: Vec<_> = stats.monitors.iter().map(|m| m.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
        assert_eq!(stats.monitors[1].id, Some(7));
        assert_eq!(stats.monitor_types, vec!["http", "ping"]);
        assert_eq!(stats.monitors_by_type["http"], 1);
    }

    #[test]
    fn test_untyped_monitor_not_counted_as_type() {
        let mut input = FleetInput::default();
        input.monitors.insert(1, monitor("web", true, false));
        input.monitors.insert(2, serde_json::from_value(json!({
            "monitor": {"name": "mystery", "active": true}
        })).unwrap());

        let stats = FleetStatistics::build(&input, now());
        assert_eq!(stats.monitors_count, 2);
        assert_eq!(stats.monitor_types, vec!["http"]);
        assert_eq!(stats.monitors_by_type.len(), 1);
        assert_eq!(stats.monitors_by_type["http"], 1);
    }

    #[test]
    fn test_averages_skip_maintenance() {
        let bundle = |name: &str, maintenance: bool, uptime: f64, ping: i64| -> MonitorBundle {
            serde_json::from_value(json!({
                "monitor": {"name": name, "type": "http", "active": true, "maintenance": maintenance},
                "uptime": {"24": uptime},
                "heartbeats": [{"status": 1, "time": "2024-05-01 11:00:00", "ping": ping}]
            }))
            .unwrap()
        };
        let mut input = FleetInput::default();
        input.monitors.insert(1, bundle("a", false, 1.0, 100));
        input.monitors.insert(2, bundle("b", false, 0.9, 133));
        input.monitors.insert(3, bundle("c", false, 1.0, 11));
        input.monitors.insert(4, bundle("d", true, 0.5, 900));

        let stats = FleetStatistics::build(&input, now());
        // 97.0, 89.0 and 99.7
        assert_eq!(stats.avg_health_score, Some(95.2));
        assert_eq!(stats.avg_response_time, Some(81.33));
    }

    #[test]
    fn test_down_monitor_details() {
        let mut input = FleetInput::default();
        input.monitors.insert(1, serde_json::from_value(json!({
            "monitor": {"name": "db", "active": false},
            "important_heartbeats": [
                {"status": 0, "time": "2024-05-01 11:00:00", "msg": "connection refused"},
                {"status": 1, "time": "2024-04-30 11:00:00", "msg": "up"}
            ]
        })).unwrap());
        input.monitors.insert(2, monitor("quiet", false, false));

        let out = serde_json::to_value(FleetStatistics::build(&input, now())).unwrap();
        let down = out["down_monitors"].as_array().unwrap();
        assert_eq!(down[0]["last_error"], json!("connection refused"));
        assert_eq!(down[0]["down_since"], json!("2024-05-01 11:00:00"));
        assert_eq!(down[0]["id"], json!(1));
        assert_eq!(down[1]["last_error"], json!("-"));
        assert_eq!(down[1]["down_since"], json!("-"));
        assert_eq!(down[1]["type"], json!("http"));
    }
}
