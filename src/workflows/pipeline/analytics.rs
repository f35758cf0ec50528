//! Pipeline-wide summary metrics.
//!
//! The server may hand back a pre-aggregated summary; when it does not (or
//! hands back an empty object) the metrics are reduced locally from the raw
//! lead collection. Malformed numerics never panic: inside the summary they
//! coerce to zero, inside the local average they are excluded so they cannot
//! skew the mean.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::domain::{Lead, LeadStage};

/// Raw aggregate payload from the repository. Every field is optional;
/// aliases cover the field-name drift seen upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    #[serde(default, alias = "total")]
    pub total_leads: Option<f64>,
    #[serde(default, alias = "new_count", alias = "new")]
    pub new_leads: Option<f64>,
    #[serde(default, alias = "tours")]
    pub tours_this_week: Option<f64>,
    #[serde(default, alias = "conversion")]
    pub conversion_rate: Option<f64>,
    #[serde(default, alias = "avg_days")]
    pub avg_days_to_convert: Option<f64>,
}

impl ServerSummary {
    /// An all-absent summary means "no aggregate available", same as none.
    pub fn is_empty(&self) -> bool {
        self.total_leads.is_none()
            && self.new_leads.is_none()
            && self.tours_this_week.is_none()
            && self.conversion_rate.is_none()
            && self.avg_days_to_convert.is_none()
    }
}

/// Board header metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    pub total: u64,
    pub new_count: u64,
    pub tours_this_week: u64,
    /// Whole percentage, rounded.
    pub conversion_rate: u32,
    /// Mean days to convert, one decimal; `"0.0"` when no sample exists.
    pub avg_days_to_convert: String,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            total: 0,
            new_count: 0,
            tours_this_week: 0,
            conversion_rate: 0,
            avg_days_to_convert: "0.0".to_string(),
        }
    }
}

impl PipelineMetrics {
    /// Prefer the server aggregate when it has any populated key, otherwise
    /// reduce locally. `today` anchors the tours-this-week window.
    pub fn compute(leads: &[Lead], summary: Option<&ServerSummary>, today: NaiveDate) -> Self {
        match summary {
            Some(summary) if !summary.is_empty() => Self::from_summary(summary),
            _ => Self::from_leads(leads, today),
        }
    }

    fn from_summary(summary: &ServerSummary) -> Self {
        Self {
            total: coerce_count(summary.total_leads),
            new_count: coerce_count(summary.new_leads),
            tours_this_week: coerce_count(summary.tours_this_week),
            conversion_rate: coerce_count(summary.conversion_rate).min(u64::from(u32::MAX)) as u32,
            avg_days_to_convert: format!("{:.1}", coerce_finite(summary.avg_days_to_convert)),
        }
    }

    fn from_leads(leads: &[Lead], today: NaiveDate) -> Self {
        let total = leads.len() as u64;
        let new_count = leads
            .iter()
            .filter(|lead| lead.stage == LeadStage::New)
            .count() as u64;

        // Start of today through seven days out, both bounds inclusive.
        let window_start = today.and_time(NaiveTime::MIN).and_utc();
        let window_end = window_start + Duration::days(7);
        let tours_this_week = leads
            .iter()
            .filter_map(|lead| lead.tour_date)
            .filter(|tour| *tour >= window_start && *tour <= window_end)
            .count() as u64;

        let converted = leads.iter().filter(|lead| lead.is_converted()).count();
        let conversion_rate = if total == 0 {
            0
        } else {
            (100.0 * converted as f64 / total as f64).round() as u32
        };

        let samples: Vec<f64> = leads
            .iter()
            .filter_map(|lead| {
                lead.days_to_convert
                    .filter(|value| value.is_finite())
                    .or_else(|| lead.days_in_pipeline.map(f64::from))
            })
            .collect();
        let avg_days_to_convert = if samples.is_empty() {
            "0.0".to_string()
        } else {
            format!("{:.1}", samples.iter().sum::<f64>() / samples.len() as f64)
        };

        Self {
            total,
            new_count,
            tours_this_week,
            conversion_rate,
            avg_days_to_convert,
        }
    }
}

fn coerce_finite(value: Option<f64>) -> f64 {
    match value {
        Some(number) if number.is_finite() && number >= 0.0 => number,
        _ => 0.0,
    }
}

fn coerce_count(value: Option<f64>) -> u64 {
    coerce_finite(value).round() as u64
}
