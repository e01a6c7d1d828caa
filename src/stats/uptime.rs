//! Uptime ratio windows.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

use super::heartbeat::Quality;
use super::sentinel::{round_to, Dashed};

/// One uptime window, e.g. the last 24 hours.
#[derive(Debug, Clone, PartialEq)]
pub struct UptimeWindow {
    /// Window length in hours, as labelled upstream ("24", "720").
    pub label: String,
    pub ratio: Option<f64>,
    pub percent: Option<f64>,
    pub quality: Option<Quality>,
}

impl UptimeWindow {
    pub fn new(label: &str, ratio: Option<f64>) -> Self {
        let percent = ratio.map(|r| round_to(r * 100.0, 2));
        Self {
            label: label.to_string(),
            ratio,
            percent,
            quality: percent.map(Quality::from_uptime),
        }
    }
}

/// All uptime windows of a monitor.
///
/// Serialises flat: `{"24h": .., "24h_percent": .., "24h_quality": ..}` per window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UptimeSummary {
    pub windows: Vec<UptimeWindow>,
}

impl UptimeSummary {
    pub fn from_ratios(ratios: &BTreeMap<String, Option<f64>>) -> Self {
        Self {
            windows: ratios
                .iter()
                .map(|(label, ratio)| UptimeWindow::new(label, *ratio))
                .collect(),
        }
    }

    /// Percentage for a window label, when known.
    pub fn percent(&self, label: &str) -> Option<f64> {
        self.windows
            .iter()
            .find(|w| w.label == label)
            .and_then(|w| w.percent)
    }
}

impl Serialize for UptimeSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.windows.len() * 3))?;
        for window in &self.windows {
            map.serialize_entry(&format!("{}h", window.label), &Dashed(&window.ratio))?;
            map.serialize_entry(&format!("{}h_percent", window.label), &Dashed(&window.percent))?;
            map.serialize_entry(&format!("{}h_quality", window.label), &Dashed(&window.quality))?;
        }
        map.end()
    }
}
