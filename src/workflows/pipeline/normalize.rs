//! Canonicalization of loosely-shaped repository payloads.
//!
//! The upstream API is not consistent about field names, so every fallback
//! chain lives here instead of being scattered through consumers. Each
//! `lead_from_value` doc line below is the authoritative precedence list for
//! that field.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use super::domain::{Lead, LeadId, LeadSource, LeadStage, Priority, StageChangeRecord};
use super::timeline::normalize_activities;

/// First present, non-empty string under any of `keys`. Bare numbers are
/// accepted and stringified so numeric ids survive.
pub(crate) fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    let object = raw.as_object()?;
    for key in keys {
        match object.get(*key) {
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Some(Value::Number(number)) => return Some(number.to_string()),
            _ => {}
        }
    }
    None
}

/// First finite number under any of `keys`. Strings that parse as finite
/// numbers count; anything else is absent, never zero.
pub(crate) fn first_finite(raw: &Value, keys: &[&str]) -> Option<f64> {
    let object = raw.as_object()?;
    for key in keys {
        let candidate = match object.get(*key) {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(value) = candidate.filter(|value| value.is_finite()) {
            return Some(value);
        }
    }
    None
}

fn first_timestamp(raw: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    first_string(raw, keys).as_deref().and_then(parse_timestamp)
}

/// Accepts RFC 3339, `%Y-%m-%dT%H:%M[:%S]`, and bare `%Y-%m-%d` (midnight).
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    parse_date(trimmed).map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// `snake_or_space cased` -> `Snake Or Space Cased`.
pub(crate) fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the canonical [`Lead`] from a raw JSON object.
///
/// Precedence per field:
/// - id: `id` > `lead_id`
/// - names: `first_name` / `last_name`, else `name` split on the first space
/// - stage: `stage` > `status` (unknown collapses to `new`)
/// - property: `property_id` > `property`; unit: `unit_id` > `unit`
/// - bedrooms: `bedrooms` > `bedrooms_needed`
/// - move-in: `move_in_date` > `desired_move_in` > `move_in`
/// - activities: `activities` > `activity_log`
/// - stage history: `stage_history` > `timeline`
pub fn lead_from_value(raw: &Value) -> Lead {
    let id = first_string(raw, &["id", "lead_id"]).unwrap_or_default();

    let mut first_name = first_string(raw, &["first_name"]).unwrap_or_default();
    let mut last_name = first_string(raw, &["last_name"]).unwrap_or_default();
    if first_name.is_empty() && last_name.is_empty() {
        if let Some(full) = first_string(raw, &["name"]) {
            match full.split_once(' ') {
                Some((first, last)) => {
                    first_name = first.to_string();
                    last_name = last.trim().to_string();
                }
                None => first_name = full,
            }
        }
    }

    let stage = LeadStage::parse(first_string(raw, &["stage", "status"]).as_deref());
    let priority = first_string(raw, &["priority"])
        .as_deref()
        .and_then(Priority::parse);
    let source = first_string(raw, &["source"])
        .as_deref()
        .map(LeadSource::parse);

    let activities = raw
        .get("activities")
        .or_else(|| raw.get("activity_log"))
        .and_then(Value::as_array)
        .map(|entries| normalize_activities(entries))
        .unwrap_or_default();

    let stage_history = raw
        .get("stage_history")
        .or_else(|| raw.get("timeline"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(stage_change_from_value).collect())
        .unwrap_or_default();

    Lead {
        id: LeadId(id),
        first_name,
        last_name,
        email: first_string(raw, &["email"]),
        phone: first_string(raw, &["phone"]),
        stage,
        priority,
        source,
        property_id: first_string(raw, &["property_id", "property"]),
        unit_id: first_string(raw, &["unit_id", "unit"]),
        bedrooms: first_finite(raw, &["bedrooms", "bedrooms_needed"])
            .filter(|value| (0.0..=255.0).contains(value))
            .map(|value| value as u8),
        budget_min: first_finite(raw, &["budget_min"]),
        budget_max: first_finite(raw, &["budget_max"]),
        move_in: first_string(raw, &["move_in_date", "desired_move_in", "move_in"])
            .as_deref()
            .and_then(parse_date),
        days_in_pipeline: first_finite(raw, &["days_in_pipeline"])
            .filter(|value| *value >= 0.0)
            .map(|value| value as u32),
        days_to_convert: first_finite(raw, &["days_to_convert"]),
        tour_date: first_timestamp(raw, &["tour_date"]),
        lost_reason: first_string(raw, &["lost_reason"]),
        assigned_to: first_string(raw, &["assigned_to"]),
        application_id: first_string(raw, &["application_id"]),
        tenant_id: first_string(raw, &["tenant_id"]),
        activities,
        stage_history,
        created_at: first_timestamp(raw, &["created_at"]),
        contacted_at: first_timestamp(raw, &["contacted_at"]),
        tour_scheduled_at: first_timestamp(raw, &["tour_scheduled_at"]),
        tour_completed_at: first_timestamp(raw, &["tour_completed_at"]),
        applied_at: first_timestamp(raw, &["applied_at"]),
        leased_at: first_timestamp(raw, &["leased_at"]),
    }
}

/// Stage label: `stage` > `status`; date: `changed_at` > `timestamp` >
/// `created_at`. Unusable sides stay `None`; the history reconstructor
/// decides what to drop.
fn stage_change_from_value(raw: &Value) -> StageChangeRecord {
    StageChangeRecord {
        stage: first_string(raw, &["stage", "status"]),
        changed_at: first_timestamp(raw, &["changed_at", "timestamp", "created_at"]),
    }
}
