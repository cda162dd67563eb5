//! Derived dashboard aggregates.
//!
//! Everything here is a pure function of the metric set, the alert set and the overall
//! score. Nothing blocks, retries or fails: empty input yields empty series and
//! `KpiValue::Unavailable` means.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{AlertSet, MetricSample, Severity};

/// Efficiency scoring contract: `max(FLOOR, BASE - w_e*energy - w_w*waste - w_p*paper)`.
/// Fixed policy, not configuration.
pub const EFFICIENCY_BASE: f64 = 100.0;
pub const ENERGY_WEIGHT: f64 = 0.1;
pub const WASTE_WEIGHT: f64 = 1.2;
pub const PAPER_WEIGHT: f64 = 0.8;
pub const EFFICIENCY_FLOOR: f64 = 0.0;

/// Mean of one metric across the current set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum KpiValue {
    /// No samples; distinct from a real zero
    Unavailable,
    Mean(f64),
}

impl KpiValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            KpiValue::Unavailable => None,
            KpiValue::Mean(v) => Some(*v),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, KpiValue::Mean(_))
    }

    /// `-` when unavailable, otherwise one decimal followed by `unit`
    pub fn display_with_unit(&self, unit: &str) -> String {
        match self {
            KpiValue::Unavailable => "-".to_string(),
            KpiValue::Mean(v) => format!("{:.1} {}", v, unit),
        }
    }
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Unavailable => write!(f, "-"),
            KpiValue::Mean(v) => write!(f, "{:.1}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub energy_kwh: KpiValue,
    pub medical_waste_kg: KpiValue,
    pub paper_kg: KpiValue,
    pub active_alerts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Chart-ready series, ascending by timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub energy_kwh: Vec<SeriesPoint>,
    pub medical_waste_kg: Vec<SeriesPoint>,
    pub paper_kg: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub department: String,
    pub score: f64,
    pub energy_kwh: f64,
    pub medical_waste_kg: f64,
    pub paper_kg: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Everything the dashboard renders, derived in one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub kpis: Kpis,
    pub series: TimeSeries,
    pub leaderboard: Vec<LeaderboardRow>,
    pub severity: SeverityCounts,
    pub normalized_score: f64,
}

impl DashboardView {
    pub fn derive(metrics: &[MetricSample], alerts: &AlertSet, score: f64) -> Self {
        Self {
            kpis: kpis(metrics, alerts),
            series: time_series(metrics),
            leaderboard: leaderboard(metrics),
            severity: severity_counts(alerts),
            normalized_score: normalized_score(score),
        }
    }
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::derive(&[], &AlertSet::default(), 0.0)
    }
}

fn mean(metrics: &[MetricSample], field: impl Fn(&MetricSample) -> f64) -> KpiValue {
    if metrics.is_empty() {
        return KpiValue::Unavailable;
    }
    let total: f64 = metrics.iter().map(field).sum();
    KpiValue::Mean(total / metrics.len() as f64)
}

pub fn kpis(metrics: &[MetricSample], alerts: &AlertSet) -> Kpis {
    Kpis {
        energy_kwh: mean(metrics, |m| m.energy_kwh),
        medical_waste_kg: mean(metrics, |m| m.medical_waste_kg),
        paper_kg: mean(metrics, |m| m.paper_kg),
        active_alerts: alerts.len(),
    }
}

/// Stable sort by timestamp on a copy; the source slice is untouched.
pub fn time_series(metrics: &[MetricSample]) -> TimeSeries {
    let mut sorted: Vec<&MetricSample> = metrics.iter().collect();
    sorted.sort_by_key(|m| m.timestamp);

    TimeSeries {
        energy_kwh: project(&sorted, |m| m.energy_kwh),
        medical_waste_kg: project(&sorted, |m| m.medical_waste_kg),
        paper_kg: project(&sorted, |m| m.paper_kg),
    }
}

fn project(sorted: &[&MetricSample], field: impl Fn(&MetricSample) -> f64) -> Vec<SeriesPoint> {
    sorted
        .iter()
        .map(|m| SeriesPoint {
            timestamp: m.timestamp,
            value: field(m),
        })
        .collect()
}

pub fn efficiency_score(sample: &MetricSample) -> f64 {
    let raw = EFFICIENCY_BASE
        - ENERGY_WEIGHT * sample.energy_kwh
        - WASTE_WEIGHT * sample.medical_waste_kg
        - PAPER_WEIGHT * sample.paper_kg;
    raw.max(EFFICIENCY_FLOOR)
}

/// One row per sample, best first. Ties keep input order.
pub fn leaderboard(metrics: &[MetricSample]) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = metrics
        .iter()
        .map(|m| LeaderboardRow {
            department: m.department.clone(),
            score: efficiency_score(m),
            energy_kwh: m.energy_kwh,
            medical_waste_kg: m.medical_waste_kg,
            paper_kg: m.paper_kg,
        })
        .collect();
    rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    rows
}

/// Clamp to [0, 100]; NaN renders as 0.
pub fn normalized_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

pub fn severity_counts(alerts: &AlertSet) -> SeverityCounts {
    alerts
        .iter()
        .fold(SeverityCounts::default(), |mut acc, alert| {
            match alert.severity {
                Severity::Low => acc.low += 1,
                Severity::Medium => acc.medium += 1,
                Severity::High => acc.high += 1,
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
    }

    fn sample(dept: &str, energy: f64, waste: f64, paper: f64, minute: u32) -> MetricSample {
        MetricSample::new(dept, energy, waste, paper, at(minute))
    }

    #[test]
    fn icu_reference_score_floors_at_zero() {
        let icu = sample("ICU", 500.0, 50.0, 10.0, 0);
        assert_eq!(efficiency_score(&icu), 0.0);
    }

    #[test]
    fn efficiency_score_uses_fixed_weights() {
        let er = sample("ER", 100.0, 10.0, 5.0, 0);
        // 100 - 10 - 12 - 4
        assert!((efficiency_score(&er) - 74.0).abs() < 1e-9);
    }

    #[test]
    fn extreme_energy_never_goes_negative() {
        assert_eq!(efficiency_score(&sample("ER", 10_000.0, 0.0, 0.0, 0)), 0.0);
        assert_eq!(efficiency_score(&sample("ER", f64::MAX, 0.0, 0.0, 0)), 0.0);
    }

    #[test]
    fn score_is_non_increasing_in_each_input() {
        let base = sample("ER", 50.0, 5.0, 5.0, 0);
        let base_score = efficiency_score(&base);
        for step in [0.5, 5.0, 50.0, 500.0] {
            let mut more_energy = base.clone();
            more_energy.energy_kwh += step;
            let mut more_waste = base.clone();
            more_waste.medical_waste_kg += step;
            let mut more_paper = base.clone();
            more_paper.paper_kg += step;

            assert!(efficiency_score(&more_energy) <= base_score);
            assert!(efficiency_score(&more_waste) <= base_score);
            assert!(efficiency_score(&more_paper) <= base_score);
        }
    }

    #[test]
    fn kpis_are_means_or_unavailable() {
        let empty = kpis(&[], &AlertSet::default());
        assert_eq!(empty.energy_kwh, KpiValue::Unavailable);
        assert_eq!(empty.medical_waste_kg, KpiValue::Unavailable);
        assert_eq!(empty.paper_kg, KpiValue::Unavailable);
        assert_eq!(empty.active_alerts, 0);

        let metrics = vec![
            sample("ER", 100.0, 10.0, 2.0, 0),
            sample("ICU", 300.0, 30.0, 4.0, 1),
        ];
        let k = kpis(&metrics, &AlertSet::default());
        assert_eq!(k.energy_kwh, KpiValue::Mean(200.0));
        assert_eq!(k.medical_waste_kg, KpiValue::Mean(20.0));
        assert_eq!(k.paper_kg, KpiValue::Mean(3.0));
    }

    #[test]
    fn kpi_display_matches_cards() {
        assert_eq!(KpiValue::Unavailable.display_with_unit("kWh"), "-");
        assert_eq!(KpiValue::Mean(212.345).display_with_unit("kWh"), "212.3 kWh");
    }

    #[test]
    fn time_series_sorted_without_touching_source() {
        let metrics = vec![
            sample("ICU", 3.0, 0.0, 0.0, 30),
            sample("ER", 1.0, 0.0, 0.0, 10),
            sample("Admin", 2.0, 0.0, 0.0, 20),
        ];
        let series = time_series(&metrics);

        let values: Vec<f64> = series.energy_kwh.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(series
            .energy_kwh
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(metrics[0].department, "ICU");
        assert_eq!(series.paper_kg.len(), 3);
    }

    #[test]
    fn time_series_resort_is_idempotent() {
        let metrics = vec![
            sample("A", 1.0, 0.0, 0.0, 5),
            sample("B", 2.0, 0.0, 0.0, 5),
            sample("C", 3.0, 0.0, 0.0, 1),
        ];
        let once = time_series(&metrics);

        let mut sorted = metrics.clone();
        sorted.sort_by_key(|m| m.timestamp);
        let twice = time_series(&sorted);

        assert_eq!(once, twice);
        // equal timestamps keep input order
        let values: Vec<f64> = once.energy_kwh.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn leaderboard_ranks_descending_with_stable_ties() {
        let metrics = vec![
            sample("ICU", 500.0, 50.0, 10.0, 0),
            sample("ER", 100.0, 10.0, 5.0, 0),
            sample("Admin", 10.0, 0.0, 1.0, 0),
            sample("Oncology", 100.0, 10.0, 5.0, 0),
        ];
        let rows = leaderboard(&metrics);
        let order: Vec<&str> = rows.iter().map(|r| r.department.as_str()).collect();
        assert_eq!(order, vec!["Admin", "ER", "Oncology", "ICU"]);
        assert_eq!(rows[3].score, 0.0);
    }

    #[test]
    fn normalized_score_clamps() {
        assert_eq!(normalized_score(-20.0), 0.0);
        assert_eq!(normalized_score(150.0), 100.0);
        assert_eq!(normalized_score(72.5), 72.5);
        assert_eq!(normalized_score(f64::NAN), 0.0);
    }

    #[test]
    fn default_view_is_degenerate_but_valid() {
        let view = DashboardView::default();
        assert!(!view.kpis.energy_kwh.is_available());
        assert!(view.series.energy_kwh.is_empty());
        assert!(view.leaderboard.is_empty());
        assert_eq!(view.severity, SeverityCounts::default());
        assert_eq!(view.normalized_score, 0.0);
    }
}
