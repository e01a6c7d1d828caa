//! Heartbeat flattening and ping classification.

use serde::Serialize;
use serde_json::Number;

use super::raw::RawHeartbeat;
use super::sentinel::or_dash;

/// Qualitative tier for a ping or an uptime percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Quality {
    /// Ping tiers in milliseconds: <100, <300, <600, otherwise poor.
    pub fn from_ping(ms: f64) -> Self {
        if ms < 100.0 {
            Quality::Excellent
        } else if ms < 300.0 {
            Quality::Good
        } else if ms < 600.0 {
            Quality::Fair
        } else {
            Quality::Poor
        }
    }

    /// Uptime tiers in percent: >=99.9, >=99.0, >=95.0, otherwise poor.
    pub fn from_uptime(percent: f64) -> Self {
        if percent >= 99.9 {
            Quality::Excellent
        } else if percent >= 99.0 {
            Quality::Good
        } else if percent >= 95.0 {
            Quality::Fair
        } else {
            Quality::Poor
        }
    }
}

/// Flat heartbeat record.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    #[serde(serialize_with = "or_dash")]
    pub id: Option<i64>,
    #[serde(serialize_with = "or_dash")]
    pub monitor_id: Option<i64>,
    #[serde(serialize_with = "or_dash")]
    pub status: Option<i64>,
    #[serde(serialize_with = "or_dash")]
    pub time: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub msg: Option<String>,
    #[serde(serialize_with = "or_dash")]
    pub ping: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub duration: Option<Number>,
    pub important: bool,
    #[serde(serialize_with = "or_dash")]
    pub down_count: Option<Number>,
    #[serde(serialize_with = "or_dash")]
    pub ping_quality: Option<Quality>,
}

impl From<&RawHeartbeat> for Heartbeat {
    fn from(raw: &RawHeartbeat) -> Self {
        Self {
            id: raw.id,
            monitor_id: raw.monitor_id.or(raw.monitor_id_legacy),
            status: raw.status,
            time: raw.time.clone(),
            msg: raw.msg.clone(),
            ping: raw.ping.clone(),
            duration: raw.duration.clone(),
            important: raw.important,
            down_count: raw.down_count.clone(),
            ping_quality: raw.ping_ms().map(Quality::from_ping),
        }
    }
}
