//! The pipeline transition engine.
//!
//! All mutable state lives in one [`PipelineState`] struct mutated only
//! through the named operations below. The server is the source of truth:
//! every successful mutation is followed by a full list reload, a re-fetch
//! of the open detail record, and a metrics recomputation. Read-back
//! failures after a successful write are swallowed (logged at `warn`) —
//! the UI shows data as of the last successful read until the next reload.
//! No retries, no optimistic merge, no request cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use super::analytics::PipelineMetrics;
use super::domain::{Lead, LeadId, LeadStage};
use super::filter::{self, DirectoryIndex, LeadFilters};
use super::history::{self, Milestone};
use super::repository::{
    DirectoryService, LeadDraft, LeadPatch, LeadRepository, MarkLostRequest, NewActivity,
    RepositoryError, ScheduleTourRequest,
};
use super::timeline::{self, Activity, TimelineEntry};

/// One kind of in-flight mutation. Busy tracking is scoped per
/// `(ActionKind, LeadId)` pair so work on one lead never blocks another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Contact,
    ScheduleTour,
    CompleteTour,
    Convert,
    MarkLost,
    Reopen,
    AddActivity,
    UpdateDetails,
}

impl ActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contact => "mark contacted",
            Self::ScheduleTour => "schedule tour",
            Self::CompleteTour => "complete tour",
            Self::Convert => "convert to application",
            Self::MarkLost => "mark lost",
            Self::Reopen => "reopen",
            Self::AddActivity => "add activity",
            Self::UpdateDetails => "update details",
        }
    }
}

/// Error raised by the transition engine.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot {action} while the lead is {stage}")]
    GuardRejected {
        action: &'static str,
        stage: &'static str,
    },
    #[error("a lost reason is required")]
    MissingLostReason,
    #[error("{action} already in flight for lead {id}")]
    InFlight { action: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Everything the presentation layer renders, mutated only by the engine.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub leads: Vec<Lead>,
    pub selected: Option<Lead>,
    pub filters: LeadFilters,
    pub directory: DirectoryIndex,
    pub metrics: PipelineMetrics,
    in_flight: HashSet<(ActionKind, LeadId)>,
}

/// One kanban column.
#[derive(Debug, Clone, Serialize)]
pub struct StageColumn {
    pub stage: LeadStage,
    pub stage_label: &'static str,
    pub leads: Vec<Lead>,
}

/// Detail payload for a single lead: the record plus its derived views.
#[derive(Debug, Clone, Serialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub timeline: Vec<TimelineEntry>,
    pub history: Vec<Milestone>,
}

impl LeadDetail {
    fn of(lead: Lead) -> Self {
        let timeline = timeline::ordered(&lead.activities)
            .iter()
            .map(Activity::to_view)
            .collect();
        let history = history::conversion_history(&lead);
        Self {
            lead,
            timeline,
            history,
        }
    }
}

/// Service composing the lead repository and directory service behind the
/// guarded transition API.
pub struct LeadPipelineService<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    state: Mutex<PipelineState>,
}

impl<R, D> LeadPipelineService<R, D>
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>) -> Self {
        Self {
            repository,
            directory,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Initial (or explicit) load of the collection and metrics.
    pub async fn load(&self) -> Result<(), PipelineError> {
        let leads = self.repository.list().await?;
        let summary = match self.repository.summary().await {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(error = %err, "summary fetch failed during load");
                None
            }
        };
        let mut state = self.state.lock().await;
        state.metrics = PipelineMetrics::compute(&leads, summary.as_ref(), Utc::now().date_naive());
        state.leads = leads;
        Ok(())
    }

    /// Refresh the property/unit lookups used by search and filter options.
    pub async fn refresh_directory(&self) -> Result<(), PipelineError> {
        let properties = self.directory.list_properties().await?;
        let units = self.directory.list_units().await?;
        let mut state = self.state.lock().await;
        state.directory = DirectoryIndex::new(properties, units);
        Ok(())
    }

    /// Open the detail view for a lead.
    pub async fn select(&self, id: &LeadId) -> Result<LeadDetail, PipelineError> {
        let lead = self.repository.get(id).await?;
        let mut state = self.state.lock().await;
        state.selected = Some(lead.clone());
        drop(state);
        Ok(LeadDetail::of(lead))
    }

    /// Close the detail view.
    pub async fn deselect(&self) {
        self.state.lock().await.selected = None;
    }

    /// The lead whose detail view is open, if any.
    pub async fn selected(&self) -> Option<Lead> {
        self.state.lock().await.selected.clone()
    }

    pub async fn set_filters(&self, filters: LeadFilters) {
        self.state.lock().await.filters = filters;
    }

    pub async fn filters(&self) -> LeadFilters {
        self.state.lock().await.filters.clone()
    }

    /// Leads surviving the active filters, in collection order.
    pub async fn visible(&self) -> Vec<Lead> {
        let state = self.state.lock().await;
        filter::visible(&state.leads, &state.filters, &state.directory)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The filtered set partitioned into the six forward stages.
    pub async fn board(&self) -> Vec<StageColumn> {
        let state = self.state.lock().await;
        let visible = filter::visible(&state.leads, &state.filters, &state.directory);
        filter::board(&visible)
            .into_iter()
            .map(|(stage, leads)| StageColumn {
                stage,
                stage_label: stage.label(),
                leads: leads.into_iter().cloned().collect(),
            })
            .collect()
    }

    pub async fn metrics(&self) -> PipelineMetrics {
        self.state.lock().await.metrics.clone()
    }

    pub async fn directory_index(&self) -> DirectoryIndex {
        self.state.lock().await.directory.clone()
    }

    /// Record a new lead from manual intake, then reload.
    pub async fn create_lead(&self, draft: LeadDraft) -> Result<Lead, PipelineError> {
        let created = self.repository.create(draft).await?;
        self.refresh_after(&created.id, false).await;
        Ok(self.latest(&created.id).await.unwrap_or(created))
    }

    /// Stage `new` -> `contacted`.
    pub async fn mark_contacted(&self, id: &LeadId) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::Contact, id, |stage| stage == LeadStage::New)
            .await?;
        let patch = LeadPatch {
            stage: Some(LeadStage::Contacted),
            ..LeadPatch::default()
        };
        let result = self.repository.update(id, patch).await;
        self.settle(ActionKind::Contact, id, result, false).await
    }

    /// Book (or rebook) a tour; the date is overwritten on reschedule.
    pub async fn schedule_tour(
        &self,
        id: &LeadId,
        request: ScheduleTourRequest,
    ) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::ScheduleTour, id, LeadStage::can_schedule_tour)
            .await?;
        let result = self.repository.schedule_tour(id, request).await;
        self.settle(ActionKind::ScheduleTour, id, result, false).await
    }

    /// Stage -> `tour_completed`.
    pub async fn complete_tour(&self, id: &LeadId) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::CompleteTour, id, |_| true).await?;
        let result = self.repository.complete_tour(id).await;
        self.settle(ActionKind::CompleteTour, id, result, false).await
    }

    /// Declare intent to apply. The full application record is created by a
    /// separate workflow, not here.
    pub async fn convert_to_application(&self, id: &LeadId) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::Convert, id, LeadStage::can_convert)
            .await?;
        let result = self.repository.convert_to_application(id).await;
        self.settle(ActionKind::Convert, id, result, false).await
    }

    /// Stage -> `lost`. Requires a non-empty reason before any network call
    /// and closes the detail view for the lead on success.
    pub async fn mark_lost(
        &self,
        id: &LeadId,
        request: MarkLostRequest,
    ) -> Result<Lead, PipelineError> {
        if request.reason.trim().is_empty() {
            return Err(PipelineError::MissingLostReason);
        }
        self.begin(ActionKind::MarkLost, id, LeadStage::can_mark_lost)
            .await?;
        let result = self.repository.mark_lost(id, request).await;
        self.settle(ActionKind::MarkLost, id, result, true).await
    }

    /// Put a lost lead back at the top of the funnel, clearing the reason.
    pub async fn reopen(&self, id: &LeadId) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::Reopen, id, LeadStage::can_reopen)
            .await?;
        let patch = LeadPatch {
            stage: Some(LeadStage::New),
            clear_lost_reason: true,
            ..LeadPatch::default()
        };
        let result = self.repository.update(id, patch).await;
        self.settle(ActionKind::Reopen, id, result, false).await
    }

    /// Append an annotation without changing stage.
    pub async fn add_activity(
        &self,
        id: &LeadId,
        activity: NewActivity,
    ) -> Result<Activity, PipelineError> {
        self.begin(ActionKind::AddActivity, id, |_| true).await?;
        match self.repository.add_activity(id, activity).await {
            Ok(created) => {
                self.refresh_after(id, false).await;
                self.finish(ActionKind::AddActivity, id).await;
                Ok(created)
            }
            Err(err) => {
                self.finish(ActionKind::AddActivity, id).await;
                Err(err.into())
            }
        }
    }

    /// Free-form correction of contact, interest, assignment — or stage and
    /// priority directly, bypassing the guards.
    pub async fn update_details(
        &self,
        id: &LeadId,
        patch: LeadPatch,
    ) -> Result<Lead, PipelineError> {
        self.begin(ActionKind::UpdateDetails, id, |_| true).await?;
        let result = self.repository.update(id, patch).await;
        self.settle(ActionKind::UpdateDetails, id, result, false).await
    }

    /// Reserve the `(action, lead)` pair and check the guard against the
    /// last-read stage. The guard is skipped when the lead has never been
    /// read locally; the server stays authoritative in that case.
    async fn begin(
        &self,
        action: ActionKind,
        id: &LeadId,
        guard: impl Fn(LeadStage) -> bool,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.lock().await;
        let key = (action, id.clone());
        if state.in_flight.contains(&key) {
            return Err(PipelineError::InFlight {
                action: action.label(),
                id: id.0.clone(),
            });
        }
        let known_stage = state
            .leads
            .iter()
            .find(|lead| &lead.id == id)
            .map(|lead| lead.stage)
            .or_else(|| {
                state
                    .selected
                    .as_ref()
                    .filter(|lead| &lead.id == id)
                    .map(|lead| lead.stage)
            });
        if let Some(stage) = known_stage {
            if !guard(stage) {
                return Err(PipelineError::GuardRejected {
                    action: action.label(),
                    stage: stage.key(),
                });
            }
        }
        state.in_flight.insert(key);
        Ok(())
    }

    async fn finish(&self, action: ActionKind, id: &LeadId) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&(action, id.clone()));
    }

    /// Shared post-mutation path: reload, clear the busy pair, surface the
    /// freshest copy of the lead.
    async fn settle(
        &self,
        action: ActionKind,
        id: &LeadId,
        result: Result<Lead, RepositoryError>,
        close_detail: bool,
    ) -> Result<Lead, PipelineError> {
        match result {
            Ok(lead) => {
                self.refresh_after(id, close_detail).await;
                self.finish(action, id).await;
                Ok(self.latest(id).await.unwrap_or(lead))
            }
            Err(err) => {
                self.finish(action, id).await;
                Err(err.into())
            }
        }
    }

    /// Reload after a successful mutation. Each read-back failure is
    /// swallowed; state keeps the last successful read.
    async fn refresh_after(&self, id: &LeadId, close_detail: bool) {
        match self.repository.list().await {
            Ok(leads) => self.state.lock().await.leads = leads,
            Err(err) => warn!(lead = %id, error = %err, "lead list refresh failed after mutation"),
        }

        let selected_is_target = {
            let state = self.state.lock().await;
            state
                .selected
                .as_ref()
                .is_some_and(|lead| &lead.id == id)
        };
        if selected_is_target {
            if close_detail {
                self.state.lock().await.selected = None;
            } else {
                match self.repository.get(id).await {
                    Ok(lead) => self.state.lock().await.selected = Some(lead),
                    Err(err) => {
                        warn!(lead = %id, error = %err, "detail refresh failed after mutation")
                    }
                }
            }
        }

        let summary = match self.repository.summary().await {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(error = %err, "summary refresh failed after mutation");
                None
            }
        };
        let mut state = self.state.lock().await;
        state.metrics =
            PipelineMetrics::compute(&state.leads, summary.as_ref(), Utc::now().date_naive());
    }

    async fn latest(&self, id: &LeadId) -> Option<Lead> {
        let state = self.state.lock().await;
        state.leads.iter().find(|lead| &lead.id == id).cloned()
    }
}
