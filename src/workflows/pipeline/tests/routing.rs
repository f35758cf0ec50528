use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::pipeline::domain::LeadStage;
use crate::workflows::pipeline::router::pipeline_router;
use crate::workflows::pipeline::service::LeadPipelineService;

use super::common::{build_service, directory, lead, sarah, HarnessRepository};

async fn test_router(leads: Vec<crate::workflows::pipeline::domain::Lead>) -> Router {
    let (service, _) = build_service(leads).await;
    pipeline_router(service)
}

async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn list_applies_query_filters() {
    let router = test_router(vec![sarah(), lead("l-other", LeadStage::New)]).await;

    let response = router
        .oneshot(get("/api/v1/leads?search=sarah"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let leads = body.as_array().expect("list payload is an array");
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["first_name"], "Sarah");
}

#[tokio::test]
async fn board_returns_all_six_columns() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(get("/api/v1/leads/board"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let columns = body.as_array().expect("board payload is an array");
    assert_eq!(columns.len(), 6);
    assert_eq!(columns[1]["stage"], "contacted");
    assert_eq!(columns[1]["leads"].as_array().expect("column bucket").len(), 1);
}

#[tokio::test]
async fn detail_of_an_unknown_lead_is_not_found() {
    let router = test_router(Vec::new()).await;

    let response = router
        .oneshot(get("/api/v1/leads/lead-missing"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = read_json(response).await;
    assert_eq!(body["error"], "lead not found");
}

#[tokio::test]
async fn guard_rejection_maps_to_conflict() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json("/api/v1/leads/lead-sarah/contact", json!({})))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message present")
        .contains("contacted"));
}

#[tokio::test]
async fn blank_lost_reason_is_unprocessable() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/lead-sarah/lost",
            json!({ "reason": "  " }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn scheduling_a_tour_returns_the_updated_lead() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/lead-sarah/tour",
            json!({
                "tour_date": "2026-03-01T14:00:00Z",
                "notes": "prefers afternoons",
                "property": "prop-apollo",
                "unit": "unit-ap-201"
            }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["lead"]["stage"], "tour_scheduled");
    assert_eq!(body["lead"]["tour_date"], "2026-03-01T14:00:00Z");
}

#[tokio::test]
async fn tour_dates_accept_minute_precision() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/lead-sarah/tour",
            json!({ "tour_date": "2026-03-01T14:00" }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["lead"]["stage"], "tour_scheduled");
    assert_eq!(body["lead"]["tour_date"], "2026-03-01T14:00:00Z");
}

#[tokio::test]
async fn unreadable_tour_dates_are_rejected_before_the_engine() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/lead-sarah/tour",
            json!({ "tour_date": "next tuesday" }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn repository_outage_maps_to_bad_gateway() {
    let repository = Arc::new(HarnessRepository::with_leads(vec![sarah()]));
    let service = Arc::new(LeadPipelineService::new(
        repository.clone(),
        Arc::new(directory()),
    ));
    service.load().await.expect("initial load succeeds");
    let router = pipeline_router(service);

    repository.fail_reads.store(true, Ordering::Relaxed);
    let response = router
        .oneshot(get("/api/v1/leads/lead-sarah"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message present")
        .contains("unavailable"));
}

#[tokio::test]
async fn intake_creates_a_lead_at_stage_new() {
    let router = test_router(Vec::new()).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads",
            json!({ "first_name": "Noor", "last_name": "Haddad" }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["lead"]["stage"], "new");
}

#[tokio::test]
async fn metrics_endpoint_serves_the_computed_header() {
    let router = test_router(vec![sarah(), lead("l-2", LeadStage::Leased)]).await;

    let response = router
        .oneshot(get("/api/v1/leads/metrics"))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["conversion_rate"], 50);
}

#[tokio::test]
async fn activity_submission_is_created() {
    let router = test_router(vec![sarah()]).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/lead-sarah/activities",
            json!({ "type": "email", "subject": "Tour follow-up", "body": "See you Friday." }),
        ))
        .await
        .expect("request completes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = read_json(response).await;
    assert_eq!(body["activity"]["type"], "email");
    assert_eq!(body["activity"]["subject"], "Tour follow-up");
}
