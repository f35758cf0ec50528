//! Activity log normalization.
//!
//! Upstream activity records arrive loosely shaped: the discriminator may
//! live under `type`, `activity_type`, or `action`, and the display text
//! under any of five fields. Everything is collapsed here, once, into the
//! tagged [`Activity`] shape the rest of the pipeline consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{first_string, parse_timestamp};

/// Discriminated activity payload. Email keeps its subject and long-form
/// body apart from the one-line description so the detail view can collapse
/// the body independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    Note,
    Call,
    Email {
        subject: Option<String>,
        body: Option<String>,
    },
    StageChange,
}

impl ActivityKind {
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Call => "call",
            Self::Email { .. } => "email",
            Self::StageChange => "stage_change",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Note => "Note",
            Self::Call => "Call",
            Self::Email { .. } => "Email",
            Self::StageChange => "Stage Change",
        }
    }
}

/// A timestamped annotation on a lead. The timestamp stays optional so a
/// record without one still renders; it sorts as the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(flatten)]
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Activity {
    fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn to_view(&self) -> TimelineEntry {
        let (subject, body) = match &self.kind {
            ActivityKind::Email { subject, body } => (subject.clone(), body.clone()),
            _ => (None, None),
        };
        TimelineEntry {
            id: self.id.clone(),
            kind: self.kind.key(),
            label: self.kind.label(),
            description: self.description.clone(),
            timestamp: self.timestamp,
            subject,
            body,
        }
    }
}

/// Render-ready timeline row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub id: String,
    pub kind: &'static str,
    pub label: &'static str,
    pub description: String,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Convert a raw activity log into the canonical, chronologically ordered
/// sequence. The sort is stable, so records sharing a timestamp keep their
/// input order.
pub fn normalize_activities(raw: &[Value]) -> Vec<Activity> {
    let mut activities: Vec<Activity> = raw
        .iter()
        .enumerate()
        .map(|(index, value)| activity_from_value(value, index))
        .collect();
    activities.sort_by_key(Activity::sort_key);
    activities
}

/// Re-sort canonical activities for display. Leads assembled outside the
/// normalization boundary may carry activities in insertion order.
pub fn ordered(activities: &[Activity]) -> Vec<Activity> {
    let mut ordered = activities.to_vec();
    ordered.sort_by_key(Activity::sort_key);
    ordered
}

/// Field precedence:
/// - discriminator: `type` > `activity_type` > `action`, lower-cased,
///   absent or unrecognized values become `note`;
/// - description: `description` > `note` > `notes` > `body` > `subject`;
/// - timestamp: `timestamp` > `created_at`.
fn activity_from_value(raw: &Value, index: usize) -> Activity {
    let id = first_string(raw, &["id", "activity_id"])
        .unwrap_or_else(|| format!("activity-{index}"));

    let type_key = first_string(raw, &["type", "activity_type", "action"])
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "note".to_string());

    let description = first_string(raw, &["description", "note", "notes", "body", "subject"])
        .unwrap_or_default();

    let kind = match type_key.as_str() {
        "call" => ActivityKind::Call,
        "email" => ActivityKind::Email {
            subject: first_string(raw, &["subject"]),
            body: first_string(raw, &["body", "notes"]),
        },
        "stage_change" => ActivityKind::StageChange,
        _ => ActivityKind::Note,
    };

    let timestamp = first_string(raw, &["timestamp", "created_at"])
        .as_deref()
        .and_then(parse_timestamp);

    Activity {
        id,
        kind,
        description,
        timestamp,
    }
}
