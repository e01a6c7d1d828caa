//! Per-monitor statistics.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Number, Value};

use super::certificate::CertificateInfo;
use super::heartbeat::{Heartbeat, Quality};
use super::normalize::clean_value;
use super::raw::{MonitorBundle, RawHeartbeat};
use super::sentinel::{or_dash, round_to, MISSING};
use super::uptime::UptimeSummary;

/// Number of regular heartbeats reported per monitor.
pub const RECENT_HEARTBEATS: usize = 10;
/// Number of important heartbeats reported per monitor.
pub const IMPORTANT_HEARTBEATS: usize = 25;

const UNKNOWN_MONITOR: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    Up,
    Down,
}

/// One line of the merged, newest-first activity log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub name: String,
    pub status: LogStatus,
    #[serde(serialize_with = "or_dash")]
    pub time: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub message: Option<String>,
}

/// Aggregate view of a single monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatistics {
    #[serde(serialize_with = "or_dash")]
    pub id: Option<i64>,
    #[serde(serialize_with = "or_dash")]
    pub name: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub url: Option<String>,
    #[serde(rename = "type", serialize_with = "or_dash")]
    pub kind: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub description: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub method: Option<String>,
    pub status: u8,
    pub active: bool,
    pub maintenance: bool,
    #[serde(serialize_with = "or_dash")]
    pub interval: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub timeout: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub avg_ping: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub avg_ping_calculated: Option<f64>,
    pub uptime: UptimeSummary,
    pub cert_info: CertificateInfo,
    pub recent_heartbeats: Vec<Heartbeat>,
    pub heartbeats_count: usize,
    pub important_heartbeats: Vec<Heartbeat>,
    pub important_heartbeats_count: usize,
    pub tags: Value,
    pub notification_ids: Value,
    #[serde(serialize_with = "or_dash")]
    pub weight: Option<Number>,
    pub accepted_statuscodes: Value,
    #[serde(serialize_with = "or_dash")]
    pub maxredirects: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub dns_resolve_type: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub dns_resolve_server: Option<String>,
    pub status_changes_count: usize,
    #[serde(serialize_with = "or_dash")]
    pub last_status_change: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub ping_stability: Option<f64>,
    pub logs: Vec<LogEntry>,
    #[serde(serialize_with = "or_dash")]
    pub ping_quality: Option<Quality>,
    #[serde(serialize_with = "or_dash")]
    pub health_score: Option<f64>,
}

impl MonitorStatistics {
    /// Build the statistics for one monitor. Never fails: whatever cannot be
    /// derived from the bundle is reported as missing.
    pub fn from_bundle(bundle: &MonitorBundle) -> Self {
        let monitor = &bundle.monitor;
        let heartbeats = &bundle.heartbeats;
        let important = &bundle.important_heartbeats;

        let pings: Vec<f64> = heartbeats
            .iter()
            .chain(important.iter())
            .filter_map(RawHeartbeat::ping_ms)
            .collect();
        let avg_ping_calculated = mean(&pings);

        let uptime = UptimeSummary::from_ratios(&bundle.uptime);
        let health_score = health_score(uptime.percent("24"), avg_ping_calculated);

        let name = monitor.name.as_deref().unwrap_or(UNKNOWN_MONITOR);

        Self {
            id: monitor.id,
            name: monitor.name.clone(),
            url: monitor.url.clone(),
            kind: monitor.kind.clone(),
            description: monitor.description.clone(),
            method: monitor.method.clone(),
            status: u8::from(monitor.active),
            active: monitor.active,
            maintenance: monitor.maintenance,
            interval: monitor.interval.clone(),
            timeout: monitor.timeout.clone(),
            avg_ping: bundle.avg_ping.clone(),
            avg_ping_calculated,
            uptime,
            cert_info: CertificateInfo::from_raw(bundle.cert_info.as_ref()),
            recent_heartbeats: heartbeats
                .iter()
                .take(RECENT_HEARTBEATS)
                .map(Heartbeat::from)
                .collect(),
            heartbeats_count: heartbeats.len(),
            important_heartbeats: important
                .iter()
                .take(IMPORTANT_HEARTBEATS)
                .map(Heartbeat::from)
                .collect(),
            important_heartbeats_count: important.len(),
            tags: clean_value(&monitor.tags),
            notification_ids: clean_value(&monitor.notification_ids),
            weight: monitor.weight.clone(),
            accepted_statuscodes: clean_value(&monitor.accepted_statuscodes),
            maxredirects: monitor.maxredirects.clone(),
            dns_resolve_type: monitor.dns_resolve_type.clone(),
            dns_resolve_server: monitor.dns_resolve_server.clone(),
            status_changes_count: status_changes(heartbeats),
            last_status_change: heartbeats
                .iter()
                .find(|hb| hb.important)
                .and_then(|hb| hb.time.clone()),
            ping_stability: sample_stdev(&pings).map(|sd| round_to(sd, 2)),
            logs: build_logs(name, heartbeats, important),
            ping_quality: avg_ping_calculated.map(Quality::from_ping),
            health_score,
        }
    }
}

/// Weighted health score: 70% 24h uptime percentage, 30% ping score
/// (100 minus a tenth of the average ping, floored at 0), one decimal.
pub fn health_score(uptime_24h_percent: Option<f64>, avg_ping: Option<f64>) -> Option<f64> {
    let uptime = uptime_24h_percent?;
    let ping = avg_ping?;
    let ping_score = (100.0 - ping / 10.0).max(0.0);
    Some(round_to(uptime * 0.7 + ping_score * 0.3, 1))
}

/// Number of adjacent status transitions, in list order.
pub fn status_changes(heartbeats: &[RawHeartbeat]) -> usize {
    heartbeats
        .windows(2)
        .filter(|pair| pair[0].status != pair[1].status)
        .count()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// A parsed heartbeat time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTime {
    /// No offset given.
    Local(NaiveDateTime),
    /// Carried an offset; held as UTC.
    Offset(NaiveDateTime),
}

impl HeartbeatTime {
    fn instant(self) -> NaiveDateTime {
        match self {
            Self::Local(t) | Self::Offset(t) => t,
        }
    }
}

/// Parse the timestamp formats Uptime Kuma emits.
pub fn parse_heartbeat_time(s: &str) -> Option<HeartbeatTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(HeartbeatTime::Offset(dt.naive_utc()));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(HeartbeatTime::Offset(dt.naive_utc()));
        }
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(HeartbeatTime::Local(dt));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(HeartbeatTime::Local)
}

/// Order heartbeats newest first.
///
/// Entries without a time sort as the oldest local time. Offset and local
/// times do not order against each other, so if both kinds are present, or
/// any present time fails to parse, the whole list falls back to descending
/// order of the raw strings.
pub fn sort_newest_first(entries: &mut Vec<&RawHeartbeat>) {
    let keys: Option<Vec<HeartbeatTime>> = entries
        .iter()
        .map(|hb| match hb.time.as_deref() {
            None | Some(MISSING) => Some(HeartbeatTime::Local(NaiveDateTime::MIN)),
            Some(raw) => parse_heartbeat_time(raw),
        })
        .collect();
    let keys = keys.filter(|keys| {
        let offsets = keys
            .iter()
            .filter(|k| matches!(k, HeartbeatTime::Offset(_)))
            .count();
        offsets == 0 || offsets == keys.len()
    });

    match keys {
        Some(keys) => {
            let mut keyed: Vec<(NaiveDateTime, &RawHeartbeat)> = keys
                .into_iter()
                .map(HeartbeatTime::instant)
                .zip(entries.iter().copied())
                .collect();
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
            *entries = keyed.into_iter().map(|(_, hb)| hb).collect();
        }
        None => {
            entries.sort_by(|a, b| {
                let a = a.time.as_deref().unwrap_or("");
                let b = b.time.as_deref().unwrap_or("");
                b.cmp(a)
            });
        }
    }
}

fn build_logs(name: &str, heartbeats: &[RawHeartbeat], important: &[RawHeartbeat]) -> Vec<LogEntry> {
    let mut merged: Vec<&RawHeartbeat> = heartbeats.iter().chain(important.iter()).collect();
    sort_newest_first(&mut merged);

    merged
        .into_iter()
        .map(|hb| LogEntry {
            name: name.to_string(),
            status: if hb.status == Some(1) {
                LogStatus::Up
            } else {
                LogStatus::Down
            },
            time: hb.time.clone(),
            message: hb.msg.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heartbeats(value: Value) -> Vec<RawHeartbeat> {
        serde_json::from_value(value).unwrap()
    }

    fn bundle(value: Value) -> MonitorBundle {
        serde_json::from_value(value).unwrap()
    }

    fn assert_no_nulls(value: &Value) {
        match value {
            Value::Null => panic!("null leaf in output"),
            Value::Array(items) => items.iter().for_each(assert_no_nulls),
            Value::Object(map) => map.values().for_each(assert_no_nulls),
            _ => {}
        }
    }

    #[test]
    fn test_health_score() {
        assert_eq!(health_score(Some(100.0), Some(50.0)), Some(98.5));
        assert_eq!(health_score(Some(90.0), Some(2000.0)), Some(63.0));
        assert_eq!(health_score(None, Some(50.0)), None);
        assert_eq!(health_score(Some(100.0), None), None);
    }

    #[test]
    fn test_status_changes() {
        let hbs = heartbeats(json!([
            {"status": 1}, {"status": 1}, {"status": 0}, {"status": 0}, {"status": 1}
        ]));
        assert_eq!(status_changes(&hbs), 2);
        assert_eq!(status_changes(&[]), 0);
    }

    #[test]
    fn test_sort_valid_timestamps() {
        let hbs = heartbeats(json!([
            {"time": "2024-05-01 10:00:00"},
            {"time": "2024-05-03T08:00:00"},
            {"time": null},
            {"time": "2024-05-02 12:30:00.250"}
        ]));
        let mut refs: Vec<&RawHeartbeat> = hbs.iter().collect();
        sort_newest_first(&mut refs);
        let times: Vec<Option<&str>> = refs.iter().map(|hb| hb.time.as_deref()).collect();
        assert_eq!(
            times,
            vec![
                Some("2024-05-03T08:00:00"),
                Some("2024-05-02 12:30:00.250"),
                Some("2024-05-01 10:00:00"),
                None,
            ]
        );
    }

    #[test]
    fn test_sort_falls_back_to_lexical() {
        let hbs = heartbeats(json!([
            {"time": "2024-05-01 10:00:00"},
            {"time": "garbage"},
            {"time": "2024-05-03 10:00:00"}
        ]));
        let mut refs: Vec<&RawHeartbeat> = hbs.iter().collect();
        sort_newest_first(&mut refs);
        let times: Vec<&str> = refs.iter().filter_map(|hb| hb.time.as_deref()).collect();
        assert_eq!(times, vec!["garbage", "2024-05-03 10:00:00", "2024-05-01 10:00:00"]);
    }

    #[test]
    fn test_sort_offset_times_by_instant() {
        let hbs = heartbeats(json!([
            {"time": "2024-05-01T10:00:00+02:00"},
            {"time": "2024-05-01T09:00:00+00:00"},
            {"time": "2024-05-01T07:30:00Z"}
        ]));
        let mut refs: Vec<&RawHeartbeat> = hbs.iter().collect();
        sort_newest_first(&mut refs);
        let times: Vec<&str> = refs.iter().filter_map(|hb| hb.time.as_deref()).collect();
        assert_eq!(
            times,
            vec!["2024-05-01T09:00:00+00:00", "2024-05-01T10:00:00+02:00", "2024-05-01T07:30:00Z"]
        );
    }

    #[test]
    fn test_sort_mixed_offsets_falls_back_to_lexical() {
        let hbs = heartbeats(json!([
            {"time": "2024-05-01 09:00:00"},
            {"time": "2024-05-01 10:00:00+02:00"}
        ]));
        let mut refs: Vec<&RawHeartbeat> = hbs.iter().collect();
        sort_newest_first(&mut refs);
        let times: Vec<&str> = refs.iter().filter_map(|hb| hb.time.as_deref()).collect();
        assert_eq!(times, vec!["2024-05-01 10:00:00+02:00", "2024-05-01 09:00:00"]);
    }

    #[test]
    fn test_full_monitor() {
        let stats = MonitorStatistics::from_bundle(&bundle(json!({
            "monitor": {
                "id": 3,
                "name": "API",
                "url": "https://api.example.com",
                "type": "http",
                "active": 1,
                "maintenance": 0,
                "interval": 60,
                "notificationIDList": {"1": true},
                "accepted_statuscodes": ["200-299"]
            },
            "heartbeats": [
                {"status": 1, "time": "2024-05-01 10:02:00", "ping": 40, "msg": "OK"},
                {"status": 0, "time": "2024-05-01 10:01:00", "ping": null, "important": true, "msg": "timeout"},
                {"status": 1, "time": "2024-05-01 10:00:00", "ping": 60}
            ],
            "important_heartbeats": [
                {"status": 0, "time": "2024-05-01 10:01:00", "important": true, "msg": "timeout"}
            ],
            "uptime": {"24": 1.0, "720": 0.98},
            "avg_ping": 48.5
        })));

        assert_eq!(stats.status, 1);
        assert_eq!(stats.avg_ping_calculated, Some(50.0));
        assert_eq!(stats.ping_quality, Some(Quality::Excellent));
        assert_eq!(stats.ping_stability, Some(14.14));
        assert_eq!(stats.health_score, Some(98.5));
        assert_eq!(stats.status_changes_count, 2);
        assert_eq!(stats.last_status_change.as_deref(), Some("2024-05-01 10:01:00"));
        assert_eq!(stats.heartbeats_count, 3);
        assert_eq!(stats.important_heartbeats_count, 1);
        assert_eq!(stats.logs.len(), 4);
        assert_eq!(stats.logs[0].status, LogStatus::Up);
        assert_eq!(stats.logs[0].name, "API");

        let out = serde_json::to_value(&stats).unwrap();
        assert_no_nulls(&out);
        assert_eq!(out["type"], json!("http"));
        assert_eq!(out["avg_ping"], json!(48.5));
        assert_eq!(out["uptime"]["720h_quality"], json!("fair"));
        assert_eq!(out["notification_ids"], json!({"1": true}));
        assert_eq!(out["description"], json!("-"));
        assert_eq!(out["cert_info"]["expiry_status"], json!("-"));
    }

    #[test]
    fn test_caps_heartbeat_lists() {
        let many: Vec<Value> = (0..40)
            .map(|i| json!({"status": 1, "time": format!("2024-05-01 10:{:02}:00", i), "ping": 10}))
            .collect();
        let stats = MonitorStatistics::from_bundle(&bundle(json!({
            "monitor": {"name": "m"},
            "heartbeats": many.clone(),
            "important_heartbeats": many
        })));
        assert_eq!(stats.recent_heartbeats.len(), RECENT_HEARTBEATS);
        assert_eq!(stats.important_heartbeats.len(), IMPORTANT_HEARTBEATS);
        assert_eq!(stats.heartbeats_count, 40);
        assert_eq!(stats.important_heartbeats_count, 40);
        assert_eq!(stats.logs.len(), 80);
    }

    #[test]
    fn test_no_valid_pings() {
        let stats = MonitorStatistics::from_bundle(&bundle(json!({
            "monitor": {},
            "heartbeats": [{"status": 0, "ping": null}, {"status": 0}],
            "uptime": {"24": 1.0}
        })));
        let out = serde_json::to_value(&stats).unwrap();
        assert_no_nulls(&out);
        assert_eq!(out["avg_ping_calculated"], json!("-"));
        assert_eq!(out["ping_quality"], json!("-"));
        assert_eq!(out["ping_stability"], json!("-"));
        assert_eq!(out["health_score"], json!("-"));
        assert_eq!(out["name"], json!("-"));
        assert_eq!(out["logs"][0]["name"], json!("Unknown"));
        assert_eq!(out["logs"][0]["status"], json!("DOWN"));
    }

    #[test]
    fn test_single_ping_has_no_stability() {
        let stats = MonitorStatistics::from_bundle(&bundle(json!({
            "heartbeats": [{"status": 1, "ping": 700}]
        })));
        assert_eq!(stats.avg_ping_calculated, Some(700.0));
        assert_eq!(stats.ping_quality, Some(Quality::Poor));
        assert_eq!(stats.ping_stability, None);
    }
}
