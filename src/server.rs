use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{ErrorCategory, categorize_error};
use crate::pipeline::Digest;
use crate::service::DigestService;
use crate::verticals::Vertical;

#[derive(Clone)]
pub struct ServerState {
    pub service: DigestService,
}

#[derive(Debug, Serialize)]
pub struct ServerHealthResponse {
    pub status: &'static str,
    pub app_name: String,
    pub profile: String,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub vertical: Vertical,
    pub topic: String,
    pub message_id: Option<String>,
    pub records: usize,
    pub digest: Digest,
}

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

/// Bad input is the sender's fault; everything else means the coordinator
/// could not produce a digest.
pub fn status_for(err: &anyhow::Error) -> StatusCode {
    match categorize_error(err) {
        ErrorCategory::Input => StatusCode::BAD_REQUEST,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCategory::Provider | ErrorCategory::Upstream | ErrorCategory::Publish => {
            StatusCode::BAD_GATEWAY
        }
    }
}

pub async fn handle_server_health(
    State(state): State<Arc<ServerState>>,
) -> Json<ServerHealthResponse> {
    Json(ServerHealthResponse {
        status: "ok",
        app_name: state.service.cfg.app_name.clone(),
        profile: state.service.cfg.profile.clone(),
    })
}

pub async fn handle_push(
    State(state): State<Arc<ServerState>>,
    Path(vertical): Path<String>,
    body: String,
) -> ApiResult<PushResponse> {
    let vertical = Vertical::parse(&vertical)
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))?;
    let started_at = Instant::now();
    let telemetry = &state.service.telemetry;

    let run = match state.service.handle_envelope(vertical, &body).await {
        Ok(run) => run,
        Err(err) => {
            let status = status_for(&err);
            tracing::warn!(
                vertical = %vertical,
                status = status.as_u16(),
                error = %format!("{err:#}"),
                "push request failed"
            );
            telemetry.emit(
                "server.push.failed",
                json!({
                    "vertical": vertical.label(),
                    "status": status.as_u16(),
                    "error": format!("{err:#}"),
                }),
            );
            return Err(api_error(status, format!("{err:#}")));
        }
    };

    let records = run.digest.records(&vertical.schema().primary_key).len();
    telemetry.emit(
        "server.push.completed",
        json!({
            "vertical": vertical.label(),
            "records": records,
            "published": run.message_id.is_some(),
            "latency_ms": started_at.elapsed().as_millis(),
        }),
    );

    Ok(Json(PushResponse {
        vertical,
        topic: state.service.cfg.topic_for(vertical),
        message_id: run.message_id,
        records,
        digest: run.digest,
    }))
}

pub fn build_server_router(state: Arc<ServerState>) -> AxumRouter {
    AxumRouter::new()
        .route("/healthz", get(handle_server_health))
        .route("/v1/push/{vertical}", post(handle_push))
        .with_state(state)
}

pub async fn run_server(service: DigestService, host: String, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server bind address '{}:{}'", host, port))?;

    service.telemetry.emit(
        "server.started",
        json!({
            "host": host,
            "port": port,
            "profile": service.cfg.profile,
        }),
    );

    println!(
        "Push endpoint listening on http://{} (health: /healthz, push: /v1/push/{{vertical}})",
        addr
    );

    let state = Arc::new(ServerState { service });
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind server listener")?;
    axum::serve(listener, build_server_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { println!("\nReceived Ctrl+C, shutting down gracefully..."); }
        _ = terminate => { println!("\nReceived SIGTERM, shutting down gracefully..."); }
    }
}
