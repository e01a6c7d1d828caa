//! Typed views of raw Uptime Kuma payloads.
//!
//! Upstream fields are loosely typed (ids arrive as strings or numbers,
//! flags as booleans or integers, empty strings stand in for "unset"), so
//! every field deserialises leniently into an `Option` and never fails on a
//! surprising type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

use super::normalize::truthy;

// ============================================================================
// Lenient field deserializers
// ============================================================================

/// Integer from a number, a numeric string or a boolean.
pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(b)),
        _ => None,
    })
}

/// Any JSON number, kept as-is so integers stay integers on output.
pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Number>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => Some(n),
        _ => None,
    })
}

/// Non-empty text; scalars are stringified, empty strings are missing.
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Truthiness flag; missing and null are false.
pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(truthy(&Value::deserialize(d)?))
}

/// A boolean that may be absent.
pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    })
}

/// A nested object. Anything else, or an object that does not fit, is missing.
pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

/// Like [`object`], collapsing to the type's default.
pub fn object_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(object(d)?.unwrap_or_default())
}

/// A list of objects. A non-list is empty; elements that are not objects are skipped.
pub fn objects<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Uptime ratios keyed by window label; non-numeric ratios are missing.
pub fn ratios<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, Option<f64>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(raw) => raw
            .into_iter()
            .map(|(label, value)| (label, value.as_f64()))
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn zero() -> Option<Number> {
    Some(Number::from(0))
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

// ============================================================================
// Payload shapes
// ============================================================================

/// A monitor as returned by Uptime Kuma.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMonitor {
    #[serde(default, deserialize_with = "integer")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub url: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub active: bool,
    #[serde(default, deserialize_with = "flag")]
    pub maintenance: bool,
    #[serde(default, deserialize_with = "number")]
    pub interval: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub timeout: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub weight: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub maxredirects: Option<Number>,
    #[serde(default, deserialize_with = "text")]
    pub dns_resolve_type: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub dns_resolve_server: Option<String>,
    #[serde(default = "empty_list")]
    pub tags: Value,
    #[serde(default = "empty_list", rename = "notificationIDList")]
    pub notification_ids: Value,
    #[serde(default = "empty_list")]
    pub accepted_statuscodes: Value,
}

impl Default for RawMonitor {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            url: None,
            kind: None,
            description: None,
            method: None,
            active: false,
            maintenance: false,
            interval: None,
            timeout: None,
            weight: None,
            maxredirects: None,
            dns_resolve_type: None,
            dns_resolve_server: None,
            tags: empty_list(),
            notification_ids: empty_list(),
            accepted_statuscodes: empty_list(),
        }
    }
}

/// One heartbeat record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHeartbeat {
    #[serde(default, deserialize_with = "integer")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub monitor_id: Option<i64>,
    #[serde(default, rename = "monitorID", deserialize_with = "integer")]
    pub monitor_id_legacy: Option<i64>,
    #[serde(default, deserialize_with = "integer")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "text")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub msg: Option<String>,
    #[serde(default, deserialize_with = "number")]
    pub ping: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub duration: Option<Number>,
    #[serde(default, deserialize_with = "flag")]
    pub important: bool,
    #[serde(default = "zero", deserialize_with = "number")]
    pub down_count: Option<Number>,
}

impl Default for RawHeartbeat {
    fn default() -> Self {
        Self {
            id: None,
            monitor_id: None,
            monitor_id_legacy: None,
            status: None,
            time: None,
            msg: None,
            ping: None,
            duration: None,
            important: false,
            down_count: zero(),
        }
    }
}

impl RawHeartbeat {
    /// Ping in milliseconds when it is numeric.
    pub fn ping_ms(&self) -> Option<f64> {
        self.ping.as_ref().and_then(Number::as_f64)
    }
}

/// Subject or issuer distinguished-name fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNames {
    #[serde(default, rename = "CN", deserialize_with = "text")]
    pub common_name: Option<String>,
    #[serde(default, rename = "C", deserialize_with = "text")]
    pub country: Option<String>,
    #[serde(default, rename = "ST", deserialize_with = "text")]
    pub state: Option<String>,
    #[serde(default, rename = "L", deserialize_with = "text")]
    pub locality: Option<String>,
    #[serde(default, rename = "O", deserialize_with = "text")]
    pub organization: Option<String>,
}

/// The nested `certInfo` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCertDetails {
    #[serde(default, deserialize_with = "object_or_default")]
    pub subject: RawNames,
    #[serde(default, deserialize_with = "object_or_default")]
    pub issuer: RawNames,
    #[serde(default, deserialize_with = "text")]
    pub subjectaltname: Option<String>,
    #[serde(default, rename = "infoAccess")]
    pub info_access: Value,
    #[serde(default, deserialize_with = "text")]
    pub fingerprint: Option<String>,
    #[serde(default, rename = "serialNumber", deserialize_with = "text")]
    pub serial_number: Option<String>,
    #[serde(default, rename = "signatureAlgorithm", deserialize_with = "text")]
    pub signature_algorithm: Option<String>,
}

/// TLS certificate information for one monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCertInfo {
    #[serde(default, deserialize_with = "boolean")]
    pub valid: Option<bool>,
    #[serde(default, rename = "certInfo", deserialize_with = "object_or_default")]
    pub details: RawCertDetails,
    #[serde(default, alias = "validFrom", deserialize_with = "text")]
    pub valid_from: Option<String>,
    #[serde(default, alias = "validTo", deserialize_with = "text")]
    pub valid_to: Option<String>,
    #[serde(default, alias = "daysRemaining", deserialize_with = "number")]
    pub days_remaining: Option<Number>,
}

/// Everything the upstream knows about one monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorBundle {
    #[serde(default, deserialize_with = "object_or_default")]
    pub monitor: RawMonitor,
    #[serde(default, deserialize_with = "objects")]
    pub heartbeats: Vec<RawHeartbeat>,
    #[serde(default, deserialize_with = "objects")]
    pub important_heartbeats: Vec<RawHeartbeat>,
    #[serde(default, deserialize_with = "ratios")]
    pub uptime: BTreeMap<String, Option<f64>>,
    #[serde(default, deserialize_with = "object")]
    pub cert_info: Option<RawCertInfo>,
    #[serde(default, deserialize_with = "number")]
    pub avg_ping: Option<Number>,
}
