//! Telemetry data model shared by the transport, the analytics deriver and the copilot.
//!
//! Field names follow the backend's JSON schema (`energy_kwh`, `created_at`, ...),
//! so these types deserialize straight from `/metrics`, `/alerts`,
//! `/sustainability-score` and the `/ws/metrics` push frames.
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{GreenHealthError, Result};

/// Department names served by the reference backend. Informational only; samples from
/// other departments are accepted.
pub const KNOWN_DEPARTMENTS: [&str; 6] =
    ["ER", "ICU", "Oncology", "Pediatrics", "Radiology", "Admin"];

/// One department's readings at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub department: String,
    pub energy_kwh: f64,
    pub medical_waste_kg: f64,
    pub paper_kg: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        department: impl Into<String>,
        energy_kwh: f64,
        medical_waste_kg: f64,
        paper_kg: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            department: department.into(),
            energy_kwh,
            medical_waste_kg,
            paper_kg,
            timestamp,
        }
    }

    /// Reject samples that break the model invariants: empty department, negative or
    /// non-finite readings.
    pub fn validate(&self) -> Result<()> {
        if self.department.trim().is_empty() {
            return Err(GreenHealthError::MalformedPayload(
                "metric sample has an empty department".into(),
            ));
        }
        for (field, value) in [
            ("energy_kwh", self.energy_kwh),
            ("medical_waste_kg", self.medical_waste_kg),
            ("paper_kg", self.paper_kg),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GreenHealthError::MalformedPayload(format!(
                    "{} for {} is not a non-negative number: {}",
                    field, self.department, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Threshold alert raised by the backend. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// Anomaly kind, e.g. `energy_anomaly`
    #[serde(rename = "type")]
    pub kind: String,
    pub department: String,
    pub severity: Severity,
    pub message: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Alerts keyed by id, kept in arrival order.
///
/// Built fresh from every `/alerts` response; there is no incremental merge. A repeated
/// id inside one response replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Alert>", into = "Vec<Alert>")]
pub struct AlertSet {
    alerts: Vec<Alert>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alert> {
        self.alerts.iter()
    }

    pub fn as_slice(&self) -> &[Alert] {
        &self.alerts
    }
}

impl FromIterator<Alert> for AlertSet {
    fn from_iter<I: IntoIterator<Item = Alert>>(iter: I) -> Self {
        let mut alerts: Vec<Alert> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for alert in iter {
            match index.get(&alert.id) {
                Some(&pos) => alerts[pos] = alert,
                None => {
                    index.insert(alert.id.clone(), alerts.len());
                    alerts.push(alert);
                }
            }
        }
        Self { alerts }
    }
}

impl From<Vec<Alert>> for AlertSet {
    fn from(alerts: Vec<Alert>) -> Self {
        alerts.into_iter().collect()
    }
}

impl From<AlertSet> for Vec<Alert> {
    fn from(set: AlertSet) -> Self {
        set.alerts
    }
}

impl<'a> IntoIterator for &'a AlertSet {
    type Item = &'a Alert;
    type IntoIter = std::slice::Iter<'a, Alert>;

    fn into_iter(self) -> Self::IntoIter {
        self.alerts.iter()
    }
}

/// Per-department component scores reported next to the overall score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentScore {
    pub energy_score: f64,
    pub waste_score: f64,
    pub paper_score: f64,
    pub department_score: f64,
}

/// Body of `/sustainability-score`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub breakdown: BTreeMap<String, DepartmentScore>,
}

impl ScoreReport {
    pub fn new(overall_score: f64) -> Self {
        Self {
            overall_score,
            breakdown: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a copilot conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Number of supporting sources; always 0 for user messages
    pub source_count: usize,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            source_count: 0,
        }
    }

    pub fn assistant(content: impl Into<String>, source_count: usize) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            source_count,
        }
    }

    /// `HH:MM` in the local timezone
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (`2024-05-01T10:00:00.123456`, or with a space
/// separator as `str(datetime)` prints it), the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}
