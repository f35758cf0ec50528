use super::common::{lead, ts};
use crate::workflows::pipeline::domain::{LeadStage, StageChangeRecord};
use crate::workflows::pipeline::history::conversion_history;

#[test]
fn explicit_stage_history_wins_and_drops_unusable_rows() {
    let mut subject = lead("l-1", LeadStage::Applied);
    subject.created_at = Some(ts("2026-01-01T00:00:00Z"));
    subject.stage_history = vec![
        StageChangeRecord {
            stage: Some("new".to_string()),
            changed_at: Some(ts("2026-01-01T09:00:00Z")),
        },
        StageChangeRecord {
            stage: None,
            changed_at: Some(ts("2026-01-02T09:00:00Z")),
        },
        StageChangeRecord {
            stage: Some("tour_scheduled".to_string()),
            changed_at: None,
        },
        StageChangeRecord {
            stage: Some("applied".to_string()),
            changed_at: Some(ts("2026-01-10T09:00:00Z")),
        },
    ];

    let milestones = conversion_history(&subject);
    assert_eq!(milestones.len(), 2);
    assert_eq!(milestones[0].label, "New");
    assert_eq!(milestones[1].label, "Applied");
}

#[test]
fn fallback_keeps_canonical_order_and_skips_unset_stages() {
    let mut subject = lead("l-2", LeadStage::Leased);
    subject.created_at = Some(ts("2026-01-01T00:00:00Z"));
    subject.leased_at = Some(ts("2026-02-15T00:00:00Z"));

    let milestones = conversion_history(&subject);
    let labels: Vec<&str> = milestones
        .iter()
        .map(|milestone| milestone.label.as_str())
        .collect();
    assert_eq!(labels, vec!["New", "Leased"]);
}

#[test]
fn tour_date_substitutes_for_a_missing_tour_scheduled_stamp() {
    let mut subject = lead("l-3", LeadStage::TourScheduled);
    subject.created_at = Some(ts("2026-01-01T00:00:00Z"));
    subject.tour_date = Some(ts("2026-01-08T14:00:00Z"));

    let milestones = conversion_history(&subject);
    let labels: Vec<&str> = milestones
        .iter()
        .map(|milestone| milestone.label.as_str())
        .collect();
    assert_eq!(labels, vec!["New", "Tour Scheduled"]);
}

#[test]
fn no_usable_data_yields_an_empty_history() {
    let subject = lead("l-4", LeadStage::New);
    assert!(conversion_history(&subject).is_empty());
}

#[test]
fn history_labels_are_title_cased_from_raw_stage_strings() {
    let mut subject = lead("l-5", LeadStage::Contacted);
    subject.stage_history = vec![StageChangeRecord {
        stage: Some("tour_completed".to_string()),
        changed_at: Some(ts("2026-01-05T09:00:00Z")),
    }];

    let milestones = conversion_history(&subject);
    assert_eq!(milestones[0].label, "Tour Completed");
}
