use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::infra::{InMemoryDirectory, InMemoryLeadRepository};
use crate::workflows::pipeline::analytics::ServerSummary;
use crate::workflows::pipeline::domain::{Lead, LeadId, LeadSource, LeadStage, Priority, Property, Unit};
use crate::workflows::pipeline::repository::{
    LeadDraft, LeadPatch, LeadRepository, MarkLostRequest, NewActivity, RepositoryError,
    ScheduleTourRequest,
};
use crate::workflows::pipeline::service::LeadPipelineService;
use crate::workflows::pipeline::timeline::Activity;

pub(super) fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid rfc3339 timestamp")
        .with_timezone(&Utc)
}

pub(super) fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn lead(id: &str, stage: LeadStage) -> Lead {
    Lead {
        id: LeadId(id.to_string()),
        first_name: "Test".to_string(),
        last_name: id.to_string(),
        stage,
        ..Lead::default()
    }
}

pub(super) fn sarah() -> Lead {
    Lead {
        id: LeadId("lead-sarah".to_string()),
        first_name: "Sarah".to_string(),
        last_name: "Chen".to_string(),
        email: Some("sarah.chen@example.com".to_string()),
        phone: Some("515-555-0117".to_string()),
        stage: LeadStage::Contacted,
        priority: Some(Priority::Hot),
        source: Some(LeadSource::Zillow),
        property_id: Some("prop-apollo".to_string()),
        unit_id: Some("unit-ap-201".to_string()),
        ..Lead::default()
    }
}

pub(super) fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new(
        vec![Property {
            id: "prop-apollo".to_string(),
            name: "Apollo Flats".to_string(),
        }],
        vec![Unit {
            id: "unit-ap-201".to_string(),
            name: "A-201".to_string(),
            property_id: Some("prop-apollo".to_string()),
        }],
    )
}

pub(super) async fn build_service(
    leads: Vec<Lead>,
) -> (
    Arc<LeadPipelineService<InMemoryLeadRepository, InMemoryDirectory>>,
    Arc<InMemoryLeadRepository>,
) {
    let repository = Arc::new(InMemoryLeadRepository::with_leads(leads));
    let service = Arc::new(LeadPipelineService::new(
        repository.clone(),
        Arc::new(directory()),
    ));
    service.load().await.expect("initial load succeeds");
    service
        .refresh_directory()
        .await
        .expect("directory loads");
    (service, repository)
}

/// Repository double with scripted failure and gating knobs layered over the
/// in-memory store: reads can be made to fail after a successful write, and
/// `schedule_tour` can be held open to observe in-flight bookkeeping.
pub(super) struct HarnessRepository {
    pub(super) inner: InMemoryLeadRepository,
    pub(super) fail_reads: AtomicBool,
    pub(super) hold_tours: AtomicBool,
    pub(super) tour_gate: Notify,
}

impl HarnessRepository {
    pub(super) fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            inner: InMemoryLeadRepository::with_leads(leads),
            fail_reads: AtomicBool::new(false),
            hold_tours: AtomicBool::new(false),
            tour_gate: Notify::new(),
        }
    }

    fn read_guard(&self) -> Result<(), RepositoryError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            Err(RepositoryError::Unavailable(
                "scripted read failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LeadRepository for HarnessRepository {
    async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        self.read_guard()?;
        self.inner.list().await
    }

    async fn get(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        self.read_guard()?;
        self.inner.get(id).await
    }

    async fn create(&self, draft: LeadDraft) -> Result<Lead, RepositoryError> {
        self.inner.create(draft).await
    }

    async fn update(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead, RepositoryError> {
        self.inner.update(id, patch).await
    }

    async fn schedule_tour(
        &self,
        id: &LeadId,
        request: ScheduleTourRequest,
    ) -> Result<Lead, RepositoryError> {
        if self.hold_tours.load(Ordering::Relaxed) {
            self.tour_gate.notified().await;
        }
        self.inner.schedule_tour(id, request).await
    }

    async fn complete_tour(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        self.inner.complete_tour(id).await
    }

    async fn convert_to_application(&self, id: &LeadId) -> Result<Lead, RepositoryError> {
        self.inner.convert_to_application(id).await
    }

    async fn mark_lost(
        &self,
        id: &LeadId,
        request: MarkLostRequest,
    ) -> Result<Lead, RepositoryError> {
        self.inner.mark_lost(id, request).await
    }

    async fn add_activity(
        &self,
        id: &LeadId,
        activity: NewActivity,
    ) -> Result<Activity, RepositoryError> {
        self.inner.add_activity(id, activity).await
    }

    async fn summary(&self) -> Result<ServerSummary, RepositoryError> {
        self.read_guard()?;
        self.inner.summary().await
    }
}
