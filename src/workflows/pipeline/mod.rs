//! Lead lifecycle pipeline: the finite-state workflow tracking a prospective
//! tenant from first inquiry through tour, application, and lease, plus the
//! analytics, timeline, and filtering machinery built on top of it.
//!
//! Persistence, authentication, rendering, notification delivery, and
//! billing live elsewhere; this module consumes the [`LeadRepository`] and
//! [`DirectoryService`] contracts and exposes a transition/query API for a
//! presentation layer to render.

pub mod analytics;
pub mod domain;
pub mod filter;
pub mod history;
pub mod normalize;
pub mod repository;
pub mod router;
pub mod service;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use analytics::{PipelineMetrics, ServerSummary};
pub use domain::{
    Lead, LeadId, LeadSource, LeadStage, Priority, Property, StageChangeRecord, Unit,
};
pub use filter::{DirectoryIndex, LeadFilters};
pub use history::{conversion_history, Milestone};
pub use normalize::lead_from_value;
pub use repository::{
    DirectoryService, LeadDraft, LeadPatch, LeadRepository, MarkLostRequest, NewActivity,
    RepositoryError, ScheduleTourRequest,
};
pub use router::pipeline_router;
pub use service::{
    ActionKind, LeadDetail, LeadPipelineService, PipelineError, StageColumn,
};
pub use timeline::{normalize_activities, Activity, ActivityKind, TimelineEntry};
