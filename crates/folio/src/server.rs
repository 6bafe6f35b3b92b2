//! `folio serve`: the pipeline over HTTP.
//!
//! - `POST /invoke`: host event envelope (`{"body": ...}`)
//! - `POST /render`: raw request body
//! - `GET /health`: liveness
//!
//! Requests share one engine, whose single permit serializes render
//! sessions. Alerts finish after the response is written; shutdown waits
//! for any still in flight.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use folio_core::ids::InvocationId;
use folio_core::response::NormalizedResponse;
use folio_runtime::dispatcher::{Dispatched, PendingAlert};
use folio_runtime::Orchestrator;
use folio_settings::InvocationSettings;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::invocation_context;

/// Alerts started by handlers that have already responded.
#[derive(Default)]
pub struct PendingAlerts {
    alerts: Mutex<Vec<PendingAlert>>,
}

impl PendingAlerts {
    fn track(&self, alert: PendingAlert) {
        if !alert.is_pending() {
            return;
        }
        let mut alerts = self.alerts.lock();
        alerts.retain(|a| !a.is_finished());
        alerts.push(alert);
    }

    /// Number of alerts not yet finished.
    pub fn in_flight(&self) -> usize {
        self.alerts.lock().iter().filter(|a| !a.is_finished()).count()
    }

    /// Wait for every tracked alert.
    pub async fn drain(&self) {
        let alerts = std::mem::take(&mut *self.alerts.lock());
        for alert in alerts {
            alert.wait().await;
        }
    }
}

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    invocation: Arc<InvocationSettings>,
    alerts: Arc<PendingAlerts>,
    start_time: Instant,
}

impl AppState {
    /// State serving `orchestrator`, building contexts from `invocation`.
    pub fn new(orchestrator: Orchestrator, invocation: InvocationSettings) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            invocation: Arc::new(invocation),
            alerts: Arc::default(),
            start_time: Instant::now(),
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/invoke", post(invoke_handler))
        .route("/render", post(render_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C, then wait for in-flight alerts.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let addr = listener.local_addr().context("listener has no local address")?;
    tracing::info!(%addr, "folio listening");

    let alerts = Arc::clone(&state.alerts);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;

    alerts.drain().await;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    alerts_in_flight: usize,
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        alerts_in_flight: state.alerts.in_flight(),
    })
}

/// POST /invoke
async fn invoke_handler(State(state): State<AppState>, body: Bytes) -> Response {
    // An unparseable envelope has no body, which the pipeline rejects as 400.
    let event = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let context = invocation_context(&state.invocation, InvocationId::new());
    let dispatched = state.orchestrator.handle_event(&event, context).await;
    respond(&state, dispatched)
}

/// POST /render
async fn render_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let event = json!({ "body": String::from_utf8_lossy(&body) });
    let context = invocation_context(&state.invocation, InvocationId::new());
    let dispatched = state.orchestrator.handle_event(&event, context).await;
    respond(&state, dispatched)
}

fn respond(state: &AppState, dispatched: Dispatched) -> Response {
    state.alerts.track(dispatched.alert);
    into_http(dispatched.response)
}

/// Convert a normalized response to an HTTP response.
fn into_http(response: NormalizedResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = (status, Body::from(response.body)).into_response();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            let _ = http.headers_mut().insert(name, value);
        }
    }
    http
}
