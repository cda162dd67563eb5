// Wire envelopes for the telemetry endpoints
//
// Missing or null top-level fields fall back to empty/zero.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::model::{Alert, AlertSet, DepartmentScore, MetricSample, ScoreReport};
use crate::{GreenHealthError, Result};

#[derive(Debug, Deserialize)]
pub(crate) struct MetricsEnvelope {
    #[serde(default)]
    metrics: Option<Vec<MetricSample>>,
}

impl MetricsEnvelope {
    pub(crate) fn into_metrics(self) -> Result<Vec<MetricSample>> {
        let metrics = self.metrics.unwrap_or_default();
        validate_metrics(&metrics)?;
        Ok(metrics)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertsEnvelope {
    #[serde(default)]
    alerts: Option<Vec<Alert>>,
}

impl AlertsEnvelope {
    pub(crate) fn into_alerts(self) -> AlertSet {
        self.alerts.unwrap_or_default().into()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreEnvelope {
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    breakdown: Option<BTreeMap<String, DepartmentScore>>,
}

impl ScoreEnvelope {
    pub(crate) fn into_report(self) -> ScoreReport {
        ScoreReport {
            overall_score: self.overall_score.unwrap_or(0.0),
            breakdown: self.breakdown.unwrap_or_default(),
        }
    }
}

/// Push frames must carry a `metrics` field; anything else is discarded by the caller.
#[derive(Debug, Deserialize)]
struct PushFrame {
    #[serde(default)]
    metrics: Option<Vec<MetricSample>>,
}

pub(crate) fn parse_push_frame(text: &str) -> Result<Vec<MetricSample>> {
    let frame: PushFrame = serde_json::from_str(text)
        .map_err(|e| GreenHealthError::MalformedPayload(format!("push frame: {e}")))?;
    let metrics = frame.metrics.ok_or_else(|| {
        GreenHealthError::MalformedPayload("push frame has no metrics field".into())
    })?;
    validate_metrics(&metrics)?;
    Ok(metrics)
}

pub(crate) fn validate_metrics(metrics: &[MetricSample]) -> Result<()> {
    metrics.iter().try_for_each(MetricSample::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_frame_requires_metrics_field() {
        assert!(parse_push_frame(r#"{"hello": 1}"#).is_err());
        assert!(parse_push_frame(r#"{"metrics": null}"#).is_err());
        assert!(parse_push_frame("not json").is_err());
        assert!(parse_push_frame("[1, 2]").is_err());
    }

    #[test]
    fn push_frame_accepts_empty_metrics() {
        let metrics = parse_push_frame(r#"{"metrics": []}"#).unwrap();
        assert!(metrics.is_empty());
    }

    #[test]
    fn push_frame_rejects_invalid_sample() {
        let frame = r#"{"metrics": [{"department": "ER", "energy_kwh": -5,
            "medical_waste_kg": 1, "paper_kg": 1, "timestamp": "2024-05-01T10:00:00Z"}]}"#;
        assert!(parse_push_frame(frame).is_err());
    }

    #[test]
    fn envelopes_default_missing_fields() {
        let metrics: MetricsEnvelope = serde_json::from_str(r#"{"metrics": null}"#).unwrap();
        assert!(metrics.into_metrics().unwrap().is_empty());

        let alerts: AlertsEnvelope = serde_json::from_str("{}").unwrap();
        assert!(alerts.into_alerts().is_empty());

        let score: ScoreEnvelope =
            serde_json::from_str(r#"{"overall_score": 81.5, "breakdown": {"ICU":
                {"energy_score": 50.0, "waste_score": 20.0, "paper_score": 85.0,
                 "department_score": 48.25}}}"#)
                .unwrap();
        let report = score.into_report();
        assert_eq!(report.overall_score, 81.5);
        assert_eq!(report.breakdown["ICU"].department_score, 48.25);
    }
}
