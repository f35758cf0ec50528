use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::{Lead, LeadId};
use super::filter::LeadFilters;
use super::repository::{
    DirectoryService, LeadDraft, LeadPatch, LeadRepository, MarkLostRequest, NewActivity,
    RepositoryError, ScheduleTourRequest,
};
use super::service::{LeadPipelineService, PipelineError};

/// Router builder exposing the pipeline API.
pub fn pipeline_router<R, D>(service: Arc<LeadPipelineService<R, D>>) -> Router
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    Router::new()
        .route(
            "/api/v1/leads",
            get(list_handler::<R, D>).post(create_handler::<R, D>),
        )
        .route("/api/v1/leads/board", get(board_handler::<R, D>))
        .route("/api/v1/leads/metrics", get(metrics_handler::<R, D>))
        .route("/api/v1/leads/directory", get(directory_handler::<R, D>))
        .route(
            "/api/v1/leads/:lead_id",
            get(detail_handler::<R, D>).patch(update_handler::<R, D>),
        )
        .route("/api/v1/leads/:lead_id/contact", post(contact_handler::<R, D>))
        .route("/api/v1/leads/:lead_id/tour", post(schedule_tour_handler::<R, D>))
        .route(
            "/api/v1/leads/:lead_id/tour/complete",
            post(complete_tour_handler::<R, D>),
        )
        .route("/api/v1/leads/:lead_id/convert", post(convert_handler::<R, D>))
        .route("/api/v1/leads/:lead_id/lost", post(mark_lost_handler::<R, D>))
        .route("/api/v1/leads/:lead_id/reopen", post(reopen_handler::<R, D>))
        .route(
            "/api/v1/leads/:lead_id/activities",
            post(add_activity_handler::<R, D>),
        )
        .with_state(service)
}

/// Transition failures surface as transient notifications, never retries.
fn error_response(err: PipelineError) -> Response {
    let status = match &err {
        PipelineError::GuardRejected { .. } | PipelineError::InFlight { .. } => {
            StatusCode::CONFLICT
        }
        PipelineError::MissingLostReason => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PipelineError::Repository(RepositoryError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn lead_response(lead: Lead) -> Response {
    let payload = json!({ "status": "ok", "lead": lead });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn list_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Query(filters): Query<LeadFilters>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    service.set_filters(filters).await;
    let leads = service.visible().await;
    (StatusCode::OK, axum::Json(leads)).into_response()
}

pub(crate) async fn board_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Query(filters): Query<LeadFilters>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    service.set_filters(filters).await;
    let columns = service.board().await;
    (StatusCode::OK, axum::Json(columns)).into_response()
}

pub(crate) async fn metrics_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    let metrics = service.metrics().await;
    (StatusCode::OK, axum::Json(metrics)).into_response()
}

pub(crate) async fn directory_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    let directory = service.directory_index().await;
    let payload = json!({
        "properties": directory.properties(),
        "units": directory.units(),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn detail_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.select(&LeadId(lead_id)).await {
        Ok(detail) => (StatusCode::OK, axum::Json(detail)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    axum::Json(draft): axum::Json<LeadDraft>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.create_lead(draft).await {
        Ok(lead) => {
            let payload = json!({ "status": "ok", "lead": lead });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
    axum::Json(patch): axum::Json<LeadPatch>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.update_details(&LeadId(lead_id), patch).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn contact_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.mark_contacted(&LeadId(lead_id)).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn schedule_tour_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
    axum::Json(request): axum::Json<ScheduleTourRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.schedule_tour(&LeadId(lead_id), request).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn complete_tour_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.complete_tour(&LeadId(lead_id)).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn convert_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.convert_to_application(&LeadId(lead_id)).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn mark_lost_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
    axum::Json(request): axum::Json<MarkLostRequest>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.mark_lost(&LeadId(lead_id), request).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reopen_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.reopen(&LeadId(lead_id)).await {
        Ok(lead) => lead_response(lead),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn add_activity_handler<R, D>(
    State(service): State<Arc<LeadPipelineService<R, D>>>,
    Path(lead_id): Path<String>,
    axum::Json(activity): axum::Json<NewActivity>,
) -> Response
where
    R: LeadRepository + 'static,
    D: DirectoryService + 'static,
{
    match service.add_activity(&LeadId(lead_id), activity).await {
        Ok(created) => {
            let payload = json!({ "status": "ok", "activity": created });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}
