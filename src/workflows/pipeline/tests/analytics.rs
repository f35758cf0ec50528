use super::common::{lead, utc};
use crate::workflows::pipeline::analytics::{PipelineMetrics, ServerSummary};
use crate::workflows::pipeline::domain::LeadStage;
use chrono::NaiveDate;

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid date")
}

#[test]
fn local_fallback_matches_the_reference_collection() {
    let mut fresh = lead("l-new", LeadStage::New);
    fresh.created_at = Some(utc(2026, 2, 8, 9, 0));
    fresh.days_in_pipeline = Some(2);
    let applied = lead("l-applied", LeadStage::Applied);
    let leased = lead("l-leased", LeadStage::Leased);

    let metrics = PipelineMetrics::compute(&[fresh, applied, leased], None, anchor());

    assert_eq!(metrics.total, 3);
    assert_eq!(metrics.new_count, 1);
    assert_eq!(metrics.conversion_rate, 67);
}

#[test]
fn empty_collection_reports_zero_rate_and_average() {
    let metrics = PipelineMetrics::compute(&[], None, anchor());
    assert_eq!(metrics.total, 0);
    assert_eq!(metrics.conversion_rate, 0);
    assert_eq!(metrics.avg_days_to_convert, "0.0");
}

#[test]
fn tour_window_is_inclusive_of_both_bounds() {
    let mut at_start = lead("l-1", LeadStage::TourScheduled);
    at_start.tour_date = Some(utc(2026, 2, 10, 0, 0));
    let mut at_end = lead("l-2", LeadStage::TourScheduled);
    at_end.tour_date = Some(utc(2026, 2, 17, 0, 0));
    let mut before = lead("l-3", LeadStage::TourScheduled);
    before.tour_date = Some(utc(2026, 2, 9, 23, 59));
    let mut after = lead("l-4", LeadStage::TourScheduled);
    after.tour_date = Some(utc(2026, 2, 17, 0, 1));

    let metrics = PipelineMetrics::compute(&[at_start, at_end, before, after], None, anchor());
    assert_eq!(metrics.tours_this_week, 2);
}

#[test]
fn average_excludes_leads_without_a_finite_sample() {
    let mut converted = lead("l-1", LeadStage::Leased);
    converted.days_to_convert = Some(10.0);
    let mut pipelined = lead("l-2", LeadStage::Contacted);
    pipelined.days_in_pipeline = Some(5);
    let blank = lead("l-3", LeadStage::New);

    let metrics = PipelineMetrics::compute(&[converted, pipelined, blank], None, anchor());
    assert_eq!(metrics.avg_days_to_convert, "7.5");
}

#[test]
fn server_summary_wins_when_any_key_is_populated() {
    let leads = vec![lead("l-1", LeadStage::New)];
    let summary = ServerSummary {
        total_leads: Some(40.0),
        new_leads: Some(12.0),
        tours_this_week: Some(5.0),
        conversion_rate: Some(31.0),
        avg_days_to_convert: Some(16.25),
    };

    let metrics = PipelineMetrics::compute(&leads, Some(&summary), anchor());
    assert_eq!(metrics.total, 40);
    assert_eq!(metrics.new_count, 12);
    assert_eq!(metrics.tours_this_week, 5);
    assert_eq!(metrics.conversion_rate, 31);
    assert_eq!(metrics.avg_days_to_convert, "16.2");
}

#[test]
fn empty_summary_object_triggers_local_computation() {
    let summary: ServerSummary =
        serde_json::from_str("{}").expect("empty object is a valid summary");
    assert!(summary.is_empty());

    let leads = vec![lead("l-1", LeadStage::Applied)];
    let metrics = PipelineMetrics::compute(&leads, Some(&summary), anchor());
    assert_eq!(metrics.total, 1);
    assert_eq!(metrics.conversion_rate, 100);
}

#[test]
fn summary_aliases_cover_upstream_field_drift() {
    let summary: ServerSummary = serde_json::from_str(
        r#"{"total": 9, "new_count": 4, "conversion": 22}"#,
    )
    .expect("aliased summary parses");

    assert_eq!(summary.total_leads, Some(9.0));
    assert_eq!(summary.new_leads, Some(4.0));
    assert_eq!(summary.conversion_rate, Some(22.0));
}

#[test]
fn malformed_summary_numbers_coerce_to_zero() {
    let summary = ServerSummary {
        total_leads: Some(f64::NAN),
        new_leads: Some(-3.0),
        tours_this_week: Some(f64::INFINITY),
        conversion_rate: Some(2.0),
        avg_days_to_convert: Some(f64::NEG_INFINITY),
    };

    let metrics = PipelineMetrics::compute(&[], Some(&summary), anchor());
    assert_eq!(metrics.total, 0);
    assert_eq!(metrics.new_count, 0);
    assert_eq!(metrics.tours_this_week, 0);
    assert_eq!(metrics.conversion_rate, 2);
    assert_eq!(metrics.avg_days_to_convert, "0.0");
}
