use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::analytics::ServerSummary;
use super::domain::{Lead, LeadId, LeadSource, LeadStage, Priority, Property, Unit};
use super::normalize::parse_timestamp;
use super::timeline::Activity;

/// Error enumeration for repository failures. The transport does not let the
/// core distinguish network faults from server-side validation, so failures
/// collapse into these two shapes.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("lead not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Fields accepted when a lead is first recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub priority: Option<Priority>,
    pub source: Option<LeadSource>,
    pub property_id: Option<String>,
    pub unit_id: Option<String>,
    pub bedrooms: Option<u8>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub move_in: Option<NaiveDate>,
    pub assigned_to: Option<String>,
}

/// Partial update. `Some` overwrites, `None` leaves the field alone.
/// Setting `stage`/`priority` here is the manual-correction escape hatch
/// that bypasses the transition guards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub stage: Option<LeadStage>,
    pub priority: Option<Priority>,
    pub source: Option<LeadSource>,
    pub property_id: Option<String>,
    pub unit_id: Option<String>,
    pub bedrooms: Option<u8>,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub move_in: Option<NaiveDate>,
    pub assigned_to: Option<String>,
    pub lost_reason: Option<String>,
    /// Reopening must erase the lost reason, which `Option` alone cannot say.
    pub clear_lost_reason: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTourRequest {
    /// Accepts the same lenient timestamp shapes as the normalization
    /// boundary, not just RFC 3339.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub tour_date: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, rename = "property")]
    pub property_id: Option<String>,
    #[serde(default, rename = "unit")]
    pub unit_id: Option<String>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{raw}'")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkLostRequest {
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Annotation submitted by an agent. For email the subject travels apart
/// from the body; for every other type the body (or notes) is the sole
/// content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub notes: Option<String>,
}

/// Remote store of leads. Every call is a network round-trip that may fail
/// with [`RepositoryError`]; the engine never retries and never mutates
/// optimistically.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Lead>, RepositoryError>;
    /// Full detail, including activities.
    async fn get(&self, id: &LeadId) -> Result<Lead, RepositoryError>;
    async fn create(&self, draft: LeadDraft) -> Result<Lead, RepositoryError>;
    async fn update(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead, RepositoryError>;
    async fn schedule_tour(
        &self,
        id: &LeadId,
        request: ScheduleTourRequest,
    ) -> Result<Lead, RepositoryError>;
    async fn complete_tour(&self, id: &LeadId) -> Result<Lead, RepositoryError>;
    async fn convert_to_application(&self, id: &LeadId) -> Result<Lead, RepositoryError>;
    async fn mark_lost(&self, id: &LeadId, request: MarkLostRequest)
        -> Result<Lead, RepositoryError>;
    async fn add_activity(
        &self,
        id: &LeadId,
        activity: NewActivity,
    ) -> Result<Activity, RepositoryError>;
    /// Aggregate metrics. An empty summary is a valid "no aggregate
    /// available" response and triggers local computation.
    async fn summary(&self) -> Result<ServerSummary, RepositoryError>;
}

/// Property/unit lookups, used only to resolve associations and populate
/// filter options.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_properties(&self) -> Result<Vec<Property>, RepositoryError>;
    async fn list_units(&self) -> Result<Vec<Unit>, RepositoryError>;
}
