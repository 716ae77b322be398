//! HTTP trigger
//!
//! | Route | Result |
//! |-------|--------|
//! | `GET /reports/training[?trimestre=Q]` | full (or quarter) report URL |
//! | `GET /reports/training/quarter?trimestre=Q` | quarter report URL, `trimestre` required |
//! | `GET /archives?trimestre=Q[&year=Y]` | certificate archive URL |
//! | `GET /healthz` | liveness |
//!
//! Success is `{"url": ...}`; failures are `{"error": ...}` with 400, 404 or
//! 500. Server-side failures never expose internal detail to the caller.
//! Generation is blocking work and runs on the blocking pool.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use coursegrid_builder::{ReportBuilder, ReportRequest};
use coursegrid_core::{ColumnMode, DocumentStore, ObjectStore, ReportError};
use coursegrid_render::{publish_report, ArchiveBundler, ArchiveRequest, ExcelRenderer, PublishedArtifact};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;

/// Shared, read-only request context
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub builder: Arc<ReportBuilder>,
    pub renderer: Arc<ExcelRenderer>,
    pub ttl: Duration,
}

impl AppState {
    pub fn new(config: &Config, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            objects: Arc::new(config.object_store()),
            builder: Arc::new(config.report_builder()),
            renderer: Arc::new(config.renderer()),
            ttl: config.url_ttl(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    trimestre: Option<String>,
    mode: Option<ColumnMode>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveParams {
    trimestre: Option<String>,
    year: Option<i32>,
}

#[derive(Debug, Serialize)]
struct UrlResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone, Copy, Debug)]
enum Endpoint {
    Report,
    Archive,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Report => "report",
            Endpoint::Archive => "archive",
        }
    }

    fn not_found(self) -> &'static str {
        match self {
            Endpoint::Report => "No se encontraron registros",
            Endpoint::Archive => "No se encontraron archivos",
        }
    }

    fn failed(self) -> &'static str {
        match self {
            Endpoint::Report => "Error al generar el reporte",
            Endpoint::Archive => "Error al generar el archivo ZIP",
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/reports/training", get(training_report))
        .route("/reports/training/quarter", get(quarter_report))
        .route("/archives", get(certificate_archive))
        .layer(axum::middleware::map_response(allow_any_origin))
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "listening");
    println!("coursegrid listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

async fn healthz() -> &'static str {
    "ok"
}

async fn training_report(
    State(state): State<AppState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Response {
    let params = match query_params(Endpoint::Report, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let quarter = params
        .trimestre
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    let request = ReportRequest {
        quarter,
        mode: params.mode,
    };
    run_report(state, request).await
}

async fn quarter_report(
    State(state): State<AppState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Response {
    let params = match query_params(Endpoint::Report, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let request = match ReportRequest::for_quarter(params.trimestre.as_deref()) {
        Ok(request) => request,
        Err(e) => return failure(Endpoint::Report, &e),
    };
    let request = match params.mode {
        Some(mode) => request.with_mode(mode),
        None => request,
    };
    run_report(state, request).await
}

async fn certificate_archive(
    State(state): State<AppState>,
    params: Result<Query<ArchiveParams>, QueryRejection>,
) -> Response {
    let params = match query_params(Endpoint::Archive, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let request = match ArchiveRequest::new(params.trimestre.as_deref(), params.year, Utc::now()) {
        Ok(request) => request,
        Err(e) => return failure(Endpoint::Archive, &e),
    };

    let result = tokio::task::spawn_blocking(move || {
        ArchiveBundler::new(state.objects.as_ref())
            .ttl(state.ttl)
            .bundle(&request, Utc::now())
    })
    .await;
    respond(Endpoint::Archive, result)
}

/// Unparseable query strings get the same JSON error shape as every other 400
fn query_params<T>(endpoint: Endpoint, params: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    params.map(|Query(params)| params).map_err(|rejection| {
        warn!(endpoint = endpoint.name(), stage = "validate", error = %rejection.body_text(), "request rejected");
        error_response(StatusCode::BAD_REQUEST, "Parámetros de consulta inválidos.")
    })
}

async fn run_report(state: AppState, request: ReportRequest) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        let report = state.builder.build(state.documents.as_ref(), &request)?;
        publish_report(
            &report,
            state.renderer.as_ref(),
            state.objects.as_ref(),
            Utc::now(),
            state.ttl,
        )
    })
    .await;
    respond(Endpoint::Report, result)
}

fn respond(
    endpoint: Endpoint,
    result: Result<Result<PublishedArtifact, ReportError>, tokio::task::JoinError>,
) -> Response {
    match result {
        Ok(Ok(artifact)) => {
            info!(endpoint = endpoint.name(), remote_path = %artifact.remote_path, "request served");
            (StatusCode::OK, Json(UrlResponse { url: artifact.url })).into_response()
        }
        Ok(Err(e)) => failure(endpoint, &e),
        Err(e) => {
            error!(endpoint = endpoint.name(), error = %e, "generation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, endpoint.failed())
        }
    }
}

fn failure(endpoint: Endpoint, err: &ReportError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = match err {
        ReportError::MissingParameter(name) => format!("Se requiere el parámetro '{name}'."),
        ReportError::NoMatchingRecords(_) => endpoint.not_found().to_string(),
        _ => endpoint.failed().to_string(),
    };

    if err.is_client_error() {
        warn!(endpoint = endpoint.name(), stage = err.stage(), error = %err, "request rejected");
    } else {
        error!(endpoint = endpoint.name(), stage = err.stage(), error = %err, "request failed");
    }
    error_response(status, &message)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
