//! Reconstruction of the stage milestones a lead has passed through.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::Lead;
use super::normalize::title_case;

/// A stage-entry milestone for the conversion history strip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub label: String,
    pub date: DateTime<Utc>,
}

/// Chronology of stage entries for one lead.
///
/// An explicit stage-change log wins when the lead carries one; rows missing
/// either a usable label or a date are dropped. Without a log the milestones
/// are synthesized from the per-stage timestamps, and the canonical stage
/// order is preserved no matter which fields are populated.
pub fn conversion_history(lead: &Lead) -> Vec<Milestone> {
    if !lead.stage_history.is_empty() {
        return lead
            .stage_history
            .iter()
            .filter_map(|entry| {
                let label = entry
                    .stage
                    .as_deref()
                    .map(title_case)
                    .filter(|label| !label.is_empty())?;
                let date = entry.changed_at?;
                Some(Milestone { label, date })
            })
            .collect();
    }

    let fallback = [
        ("New", lead.created_at),
        ("Contacted", lead.contacted_at),
        ("Tour Scheduled", lead.tour_scheduled_at.or(lead.tour_date)),
        ("Tour Completed", lead.tour_completed_at),
        ("Applied", lead.applied_at),
        ("Leased", lead.leased_at),
    ];

    fallback
        .into_iter()
        .filter_map(|(label, date)| {
            date.map(|date| Milestone {
                label: label.to_string(),
                date,
            })
        })
        .collect()
}
