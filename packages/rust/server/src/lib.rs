//! HTTP boundary for the intake workflow.
//!
//! `POST /api/request-info` validates the body, runs the orchestrator and
//! renders the result; every other method on that path gets a 405 without
//! touching the orchestrator. `GET /health` is a liveness probe.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use intake_core::IntakeOrchestrator;
use intake_core::report::{self, IntakeResponse};
use intake_shared::{IntakeError, Result};

/// Path the inquiry form posts to.
pub const INTAKE_PATH: &str = "/api/request-info";

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<IntakeOrchestrator>,
}

/// Build the router serving the intake endpoint.
pub fn router(orchestrator: Arc<IntakeOrchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route(INTAKE_PATH, post(submit).fallback(method_not_allowed))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    request_id = %Uuid::now_v7(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: &str, orchestrator: Arc<IntakeOrchestrator>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| IntakeError::Server(format!("failed to bind {addr}: {e}")))?;
    let local: SocketAddr = listener
        .local_addr()
        .map_err(|e| IntakeError::Server(e.to_string()))?;

    info!(addr = %local, path = INTAKE_PATH, "intake endpoint listening");

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| IntakeError::Server(e.to_string()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutting down");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn submit(State(state): State<AppState>, body: Bytes) -> Response {
    // Unparseable bodies are validated like any other non-object input.
    let raw: Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!(error = %e, "request body is not JSON");
        Value::Null
    });

    let record = match intake_shared::validate(&raw) {
        Ok(record) => record,
        Err(errors) => {
            info!(errors = errors.len(), "submission rejected");
            return render(report::rejected(errors));
        }
    };

    // A panic inside a directory client must not take the connection down
    // with a raw error; the spawned task isolates it.
    let orchestrator = Arc::clone(&state.orchestrator);
    let joined = tokio::spawn(async move { orchestrator.run(&record).await }).await;

    match joined {
        Ok(run) => {
            if let Some(reason) = &run.failure_reason {
                error!(%reason, "intake failed");
            }
            render(report::from_run(&run))
        }
        Err(e) => {
            error!(error = %e, "intake task did not complete");
            render(report::unexpected())
        }
    }
}

async fn method_not_allowed() -> Response {
    render(report::method_not_allowed())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn render(response: IntakeResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}
