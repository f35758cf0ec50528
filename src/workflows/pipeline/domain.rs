use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::timeline::Activity;

/// Identifier wrapper for pipeline leads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Position of a lead in the leasing funnel.
///
/// `Lost` sits outside the forward path: it is reachable from any stage but
/// `Leased` and reversible only through an explicit reopen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStage {
    #[default]
    New,
    Contacted,
    TourScheduled,
    TourCompleted,
    Applied,
    Leased,
    Lost,
}

impl LeadStage {
    /// The six forward stages in board order; `Lost` is deliberately absent.
    pub const fn board_order() -> [Self; 6] {
        [
            Self::New,
            Self::Contacted,
            Self::TourScheduled,
            Self::TourCompleted,
            Self::Applied,
            Self::Leased,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Contacted => "Contacted",
            Self::TourScheduled => "Tour Scheduled",
            Self::TourCompleted => "Tour Completed",
            Self::Applied => "Applied",
            Self::Leased => "Leased",
            Self::Lost => "Lost",
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::TourScheduled => "tour_scheduled",
            Self::TourCompleted => "tour_completed",
            Self::Applied => "applied",
            Self::Leased => "leased",
            Self::Lost => "lost",
        }
    }

    /// Unknown or missing stage values collapse to `New` at the boundary.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("contacted") => Self::Contacted,
            Some("tour_scheduled") => Self::TourScheduled,
            Some("tour_completed") => Self::TourCompleted,
            Some("applied") => Self::Applied,
            Some("leased") => Self::Leased,
            Some("lost") => Self::Lost,
            _ => Self::New,
        }
    }

    /// Progress position on the forward path. Tour stages share a slot so the
    /// progress display treats scheduling and completion as one step.
    /// `Lost` has no position.
    pub const fn index(self) -> Option<u8> {
        match self {
            Self::New => Some(0),
            Self::Contacted => Some(1),
            Self::TourScheduled | Self::TourCompleted => Some(2),
            Self::Applied => Some(3),
            Self::Leased => Some(4),
            Self::Lost => None,
        }
    }

    /// Tours can be booked up front or rescheduled while one is pending.
    pub const fn can_schedule_tour(self) -> bool {
        matches!(self, Self::New | Self::Contacted | Self::TourScheduled)
    }

    /// Convertible while still ahead of `Applied` on the forward path.
    pub const fn can_convert(self) -> bool {
        matches!(self.index(), Some(0..=2))
    }

    pub const fn can_mark_lost(self) -> bool {
        !matches!(self, Self::Lost)
    }

    pub const fn can_reopen(self) -> bool {
        matches!(self, Self::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Hot,
    Warm,
    Cold,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }

    /// Unknown priorities stay absent rather than guessing a temperature.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(Self::Hot),
            "warm" => Some(Self::Warm),
            "cold" => Some(Self::Cold),
            _ => None,
        }
    }
}

/// Where the inquiry came from. The vocabulary already carries an `Other`
/// bucket, so unknown strings normalize into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Listing,
    Zillow,
    Referral,
    Phone,
    WalkIn,
    Website,
    Social,
    Other,
}

impl LeadSource {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Zillow => "zillow",
            Self::Referral => "referral",
            Self::Phone => "phone",
            Self::WalkIn => "walk_in",
            Self::Website => "website",
            Self::Social => "social",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "listing" => Self::Listing,
            "zillow" => Self::Zillow,
            "referral" => Self::Referral,
            "phone" => Self::Phone,
            "walk_in" | "walk-in" | "walkin" => Self::WalkIn,
            "website" => Self::Website,
            "social" => Self::Social,
            _ => Self::Other,
        }
    }
}

/// One entry of an explicit stage-change log carried by the server payload.
/// Either side may be missing; the history reconstructor drops unusable rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageChangeRecord {
    pub stage: Option<String>,
    pub changed_at: Option<DateTime<Utc>>,
}

/// The central entity of the pipeline.
///
/// All telemetry numbers (`days_in_pipeline`, `days_to_convert`, budgets) are
/// opaque server-supplied values; absent means the server did not provide a
/// finite number, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lead {
    pub id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub stage: LeadStage,
    pub priority: Option<Priority>,
    pub source: Option<LeadSource>,
    pub property_id: Option<String>,
    pub unit_id: Option<String>,
    pub bedrooms: Option<u8>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub move_in: Option<NaiveDate>,
    pub days_in_pipeline: Option<u32>,
    pub days_to_convert: Option<f64>,
    pub tour_date: Option<DateTime<Utc>>,
    pub lost_reason: Option<String>,
    pub assigned_to: Option<String>,
    /// Weak references to records owned by other workflows.
    pub application_id: Option<String>,
    pub tenant_id: Option<String>,
    pub activities: Vec<Activity>,
    pub stage_history: Vec<StageChangeRecord>,
    pub created_at: Option<DateTime<Utc>>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub tour_scheduled_at: Option<DateTime<Utc>>,
    pub tour_completed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
    pub leased_at: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        let mut name = String::new();
        for part in [&self.first_name, &self.last_name] {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(part);
        }
        name
    }

    /// A lead counts as converted once it reaches `Applied` or `Leased`.
    pub const fn is_converted(&self) -> bool {
        matches!(self.stage, LeadStage::Applied | LeadStage::Leased)
    }
}

/// Directory entry used for association lookups and filter options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
}

/// Rentable unit within a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub property_id: Option<String>,
}
