//! In-memory collaborators backing the serve command and the test suites.
//!
//! The real deployments sit in front of the property-management backend;
//! these stand-ins honor the same contracts so the pipeline runs end to end
//! without external persistence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::workflows::pipeline::{
    Activity, ActivityKind, DirectoryService, Lead, LeadDraft, LeadId, LeadPatch, LeadRepository,
    LeadSource, LeadStage, MarkLostRequest, NewActivity, Priority, Property, RepositoryError,
    ScheduleTourRequest, ServerSummary, StageChangeRecord, Unit,
};

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ACTIVITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

fn next_activity_id() -> String {
    let id = ACTIVITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("activity-{id:06}")
}

/// Mutex-backed lead store playing the server role, milestone stamping
/// included.
#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: Mutex<BTreeMap<String, Lead>>,
    summary: Mutex<ServerSummary>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let store = leads
            .into_iter()
            .map(|lead| (lead.id.0.clone(), lead))
            .collect();
        Self {
            leads: Mutex::new(store),
            summary: Mutex::new(ServerSummary::default()),
        }
    }

    /// Install a server-side aggregate; the default empty summary makes the
    /// engine fall back to local computation.
    pub fn set_summary(&self, summary: ServerSummary) {
        *self.summary.lock().expect("summary mutex poisoned") = summary;
    }

    fn mutate(
        &self,
        id: &LeadId,
        apply: impl FnOnce(&mut Lead),
    ) -> Result<Lead, RepositoryError> {
        let mut leads = self.leads.lock().expect("lead store mutex poisoned");
        let lead = leads.get_mut(&id.0).ok_or(RepositoryError::NotFound)?;
        apply(lead);
        if let Some(created) = lead.created_at {
            let elapsed = (Utc::now() - created).num_days().max(0);
            lead.days_in_pipeline = Some(elapsed as u32);
        }
        Ok(lead.clone())
    }
}

/// Record a stage change the way the backend does: stamp the milestone,
/// append to the stage log, and drop a stage-change activity.
fn apply_stage(lead: &mut Lead, stage: LeadStage, now: DateTime<Utc>) {
    lead.stage = stage;
    match stage {
        LeadStage::New => {}
        LeadStage::Contacted => lead.contacted_at = Some(now),
        LeadStage::TourScheduled => lead.tour_scheduled_at = Some(now),
        LeadStage::TourCompleted => lead.tour_completed_at = Some(now),
        LeadStage::Applied => lead.applied_at = Some(now),
        LeadStage::Leased => lead.leased_at = Some(now),
        LeadStage::Lost => {}
    }
    lead.stage_history.push(StageChangeRecord {
        stage: Some(stage.key().to_string()),
        changed_at: Some(now),
    });
    lead.activities.push(Activity {
        id: next_activity_id(),
        kind: ActivityKind::StageChange,
        description: format!("Stage changed to {}", stage.label()),
        timestamp: Some(now),
    });
}

fn apply_patch(lead: &mut Lead, patch: LeadPatch, now: DateTime<Utc>) {
    let LeadPatch {
        first_name,
        last_name,
        email,
        phone,
        stage,
        priority,
        source,
        property_id,
        unit_id,
        bedrooms,
        budget_min,
        budget_max,
        move_in,
        assigned_to,
        lost_reason,
        clear_lost_reason,
    } = patch;

    if let Some(value) = first_name {
        lead.first_name = value;
    }
    if let Some(value) = last_name {
        lead.last_name = value;
    }
    if let Some(value) = email {
        lead.email = Some(value);
    }
    if let Some(value) = phone {
        lead.phone = Some(value);
    }
    if let Some(value) = priority {
        lead.priority = Some(value);
    }
    if let Some(value) = source {
        lead.source = Some(value);
    }
    if let Some(value) = property_id {
        lead.property_id = Some(value);
    }
    if let Some(value) = unit_id {
        lead.unit_id = Some(value);
    }
    if let Some(value) = bedrooms {
        lead.bedrooms = Some(value);
    }
    if let Some(value) = budget_min {
        lead.budget_min = Some(value);
    }
    if let Some(value) = budget_max {
        lead.budget_max = Some(value);
    }
    if let Some(value) = move_in {
        lead.move_in = Some(value);
    }
    if let Some(value) = assigned_to {
        lead.assigned_to = Some(value);
    }
    if let Some(value) = lost_reason {
        lead.lost_reason = Some(value);
    }
    if clear_lost_reason {
        lead.lost_reason = None;
    }
    if let Some(value) = stage {
        if value != lead.stage {
            apply_stage(lead, value, now);
        }
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.lock().expect("lead store mutex poisoned");
        Ok(leads.values().cloned().collect())
    }

    async fn get(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        let leads = self.leads.lock().expect("lead store mutex poisoned");
        leads.get(&id.0).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, draft: LeadDraft) -> Result<Lead, RepositoryError> {
        let now = Utc::now();
        let lead = Lead {
            id: next_lead_id(),
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            stage: LeadStage::New,
            priority: draft.priority,
            source: draft.source,
            property_id: draft.property_id,
            unit_id: draft.unit_id,
            bedrooms: draft.bedrooms,
            budget_min: draft.budget_min,
            budget_max: draft.budget_max,
            move_in: draft.move_in,
            days_in_pipeline: Some(0),
            assigned_to: draft.assigned_to,
            created_at: Some(now),
            stage_history: vec![StageChangeRecord {
                stage: Some(LeadStage::New.key().to_string()),
                changed_at: Some(now),
            }],
            ..Lead::default()
        };
        let mut leads = self.leads.lock().expect("lead store mutex poisoned");
        leads.insert(lead.id.0.clone(), lead.clone());
        Ok(lead)
    }

    async fn update(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead, RepositoryError> {
        let now = Utc::now();
        self.mutate(id, |lead| apply_patch(lead, patch, now))
    }

    async fn schedule_tour(
        &self,
        id: &LeadId,
        request: ScheduleTourRequest,
    ) -> Result<Lead, RepositoryError> {
        let now = Utc::now();
        self.mutate(id, |lead| {
            lead.tour_date = Some(request.tour_date);
            if let Some(property) = request.property_id {
                lead.property_id = Some(property);
            }
            if let Some(unit) = request.unit_id {
                lead.unit_id = Some(unit);
            }
            if let Some(notes) = request.notes.filter(|notes| !notes.trim().is_empty()) {
                lead.activities.push(Activity {
                    id: next_activity_id(),
                    kind: ActivityKind::Note,
                    description: notes,
                    timestamp: Some(now),
                });
            }
            apply_stage(lead, LeadStage::TourScheduled, now);
        })
    }

    async fn complete_tour(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        let now = Utc::now();
        self.mutate(id, |lead| apply_stage(lead, LeadStage::TourCompleted, now))
    }

    async fn convert_to_application(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        // Declaration of intent only; the application record is created by
        // the application workflow.
        let now = Utc::now();
        self.mutate(id, |lead| apply_stage(lead, LeadStage::Applied, now))
    }

    async fn mark_lost(
        &self,
        id: &LeadId,
        request: MarkLostRequest,
    ) -> Result<Lead, RepositoryError> {
        let now = Utc::now();
        self.mutate(id, |lead| {
            lead.lost_reason = Some(request.reason);
            if let Some(notes) = request.notes.filter(|notes| !notes.trim().is_empty()) {
                lead.activities.push(Activity {
                    id: next_activity_id(),
                    kind: ActivityKind::Note,
                    description: notes,
                    timestamp: Some(now),
                });
            }
            apply_stage(lead, LeadStage::Lost, now);
        })
    }

    async fn add_activity(
        &self,
        id: &LeadId,
        activity: NewActivity,
    ) -> Result<Activity, RepositoryError> {
        let now = Utc::now();
        let type_key = activity.activity_type.trim().to_ascii_lowercase();
        let description = activity
            .body
            .clone()
            .or_else(|| activity.notes.clone())
            .or_else(|| activity.subject.clone())
            .unwrap_or_default();
        let kind = match type_key.as_str() {
            "call" => ActivityKind::Call,
            "email" => ActivityKind::Email {
                subject: activity.subject,
                body: activity.body.or(activity.notes),
            },
            "stage_change" => ActivityKind::StageChange,
            _ => ActivityKind::Note,
        };
        let created = Activity {
            id: next_activity_id(),
            kind,
            description,
            timestamp: Some(now),
        };
        self.mutate(id, |lead| lead.activities.push(created.clone()))?;
        Ok(created)
    }

    async fn summary(&self) -> Result<ServerSummary, RepositoryError> {
        Ok(self.summary.lock().expect("summary mutex poisoned").clone())
    }
}

/// Static property/unit directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    properties: Vec<Property>,
    units: Vec<Unit>,
}

impl InMemoryDirectory {
    pub fn new(properties: Vec<Property>, units: Vec<Unit>) -> Self {
        Self { properties, units }
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn list_properties(&self) -> Result<Vec<Property>, RepositoryError> {
        Ok(self.properties.clone())
    }

    async fn list_units(&self) -> Result<Vec<Unit>, RepositoryError> {
        Ok(self.units.clone())
    }
}

/// Demo seed used by the serve command: a small cross-section of the funnel.
pub fn seeded() -> (InMemoryLeadRepository, InMemoryDirectory) {
    let now = Utc::now();
    let leads = vec![
        Lead {
            id: LeadId("lead-demo-001".to_string()),
            first_name: "Sarah".to_string(),
            last_name: "Chen".to_string(),
            email: Some("sarah.chen@example.com".to_string()),
            phone: Some("515-555-0117".to_string()),
            stage: LeadStage::New,
            priority: Some(Priority::Hot),
            source: Some(LeadSource::Zillow),
            property_id: Some("prop-apollo".to_string()),
            bedrooms: Some(2),
            budget_min: Some(1100.0),
            budget_max: Some(1400.0),
            created_at: Some(now - Duration::days(2)),
            days_in_pipeline: Some(2),
            ..Lead::default()
        },
        Lead {
            id: LeadId("lead-demo-002".to_string()),
            first_name: "Marcus".to_string(),
            last_name: "Webb".to_string(),
            email: Some("marcus.webb@example.com".to_string()),
            stage: LeadStage::Contacted,
            priority: Some(Priority::Warm),
            source: Some(LeadSource::Referral),
            property_id: Some("prop-riverfront".to_string()),
            unit_id: Some("unit-rf-2b".to_string()),
            created_at: Some(now - Duration::days(6)),
            contacted_at: Some(now - Duration::days(4)),
            days_in_pipeline: Some(6),
            ..Lead::default()
        },
        Lead {
            id: LeadId("lead-demo-003".to_string()),
            first_name: "Priya".to_string(),
            last_name: "Natarajan".to_string(),
            email: Some("priya.n@example.com".to_string()),
            stage: LeadStage::TourScheduled,
            priority: Some(Priority::Hot),
            source: Some(LeadSource::Website),
            property_id: Some("prop-apollo".to_string()),
            unit_id: Some("unit-ap-201".to_string()),
            tour_date: Some(now + Duration::days(3)),
            created_at: Some(now - Duration::days(9)),
            contacted_at: Some(now - Duration::days(8)),
            tour_scheduled_at: Some(now - Duration::days(1)),
            days_in_pipeline: Some(9),
            ..Lead::default()
        },
        Lead {
            id: LeadId("lead-demo-004".to_string()),
            first_name: "Dale".to_string(),
            last_name: "Olson".to_string(),
            stage: LeadStage::Applied,
            priority: Some(Priority::Warm),
            source: Some(LeadSource::WalkIn),
            created_at: Some(now - Duration::days(21)),
            applied_at: Some(now - Duration::days(3)),
            days_in_pipeline: Some(21),
            days_to_convert: Some(18.0),
            ..Lead::default()
        },
    ];

    let properties = vec![
        Property {
            id: "prop-apollo".to_string(),
            name: "Apollo Flats".to_string(),
        },
        Property {
            id: "prop-riverfront".to_string(),
            name: "Riverfront Lofts".to_string(),
        },
    ];
    let units = vec![
        Unit {
            id: "unit-ap-201".to_string(),
            name: "A-201".to_string(),
            property_id: Some("prop-apollo".to_string()),
        },
        Unit {
            id: "unit-rf-2b".to_string(),
            name: "2B".to_string(),
            property_id: Some("prop-riverfront".to_string()),
        },
    ];

    (
        InMemoryLeadRepository::with_leads(leads),
        InMemoryDirectory::new(properties, units),
    )
}
