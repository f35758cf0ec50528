use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tracing::info;

use lead_pipeline::config::AppConfig;
use lead_pipeline::error::AppError;
use lead_pipeline::infra;
use lead_pipeline::telemetry;
use lead_pipeline::workflows::pipeline::{
    filter, lead_from_value, pipeline_router, DirectoryIndex, Lead, LeadFilters,
    LeadPipelineService, PipelineMetrics,
};

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: Arc<PrometheusHandle>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Lead Pipeline",
    about = "Run the lead lifecycle pipeline service or render a board snapshot from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Render the pipeline board and metrics from a leads JSON export
    Board(BoardArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct BoardArgs {
    /// Path to a JSON array of raw lead records
    #[arg(long)]
    leads: PathBuf,
    /// Free-text filter over name, contact, property, source, and stage
    #[arg(long, default_value = "")]
    search: String,
    /// Source filter; "all" disables it
    #[arg(long, default_value = "all")]
    source: String,
    /// Priority filter; "all" disables it
    #[arg(long, default_value = "all")]
    priority: String,
    /// Property filter; "all" disables it
    #[arg(long, default_value = "all")]
    property: String,
    /// Anchor date for the tours-this-week window (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Board(args) => run_board(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (repository, directory) = infra::seeded();
    let service = Arc::new(LeadPipelineService::new(
        Arc::new(repository),
        Arc::new(directory),
    ));
    service.load().await?;
    service.refresh_directory().await?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = pipeline_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(prometheus_layer)
        .layer(Extension(state));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead pipeline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_board(args: BoardArgs) -> Result<(), AppError> {
    let BoardArgs {
        leads,
        search,
        source,
        priority,
        property,
        today,
    } = args;

    let raw = std::fs::read_to_string(leads)?;
    let records: Vec<Value> = serde_json::from_str(&raw)?;
    let leads: Vec<Lead> = records.iter().map(lead_from_value).collect();

    let filters = LeadFilters {
        search,
        source,
        priority,
        property,
    };
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let directory = DirectoryIndex::default();

    let visible = filter::visible(&leads, &filters, &directory);
    let metrics = PipelineMetrics::compute(&leads, None, today);
    render_board(&visible, &metrics);

    Ok(())
}

fn render_board(visible: &[&Lead], metrics: &PipelineMetrics) {
    println!("Lead pipeline board");
    println!(
        "Totals: {} leads, {} new, {} tours this week, {}% conversion, {} avg days to convert",
        metrics.total,
        metrics.new_count,
        metrics.tours_this_week,
        metrics.conversion_rate,
        metrics.avg_days_to_convert
    );

    for (stage, bucket) in filter::board(visible) {
        println!("\n{} ({})", stage.label(), bucket.len());
        for lead in bucket {
            let priority = lead
                .priority
                .map(|priority| priority.label())
                .unwrap_or("-");
            let source = lead.source.map(|source| source.key()).unwrap_or("-");
            println!("- {} | {} | {}", lead.full_name(), priority, source);
        }
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
