use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::faucet::{FaucetError, STATUS_REQUEST_FAILED, Snapshot};
use crate::state::AppState;

mod faucet;
mod session;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    // Configure CORS for the web front end
    let cors = CorsLayer::new()
        // Allow requests from any origin (for development)
        // In production, restrict to specific domains
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let session_router = session::router().with_state(state.clone());
    let faucet_router = faucet::router().with_state(state.clone());
    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/state", get(get_state))
        .nest("/session", session_router)
        .nest("/faucet", faucet_router)
        .layer(cors)
        .with_state(state)
}

/// Full container snapshot, consumed whole by the view layer each render.
async fn get_state(State(state): State<AppState>) -> Result<Json<Snapshot>, HttpError> {
    Ok(Json(state.engine.snapshot().await))
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    assert!(
        uptime <= 31_536_000,
        "Uptime exceeds one year without restart"
    );
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    let snapshot = state.engine.snapshot().await;
    assert!(
        snapshot.ledger.len() <= 1_000_000,
        "Ledger growth exceeds sanity bound"
    );

    let response = ReadyResponse {
        status: "ready",
        logged_in: snapshot.session.is_some(),
        request_in_flight: snapshot.in_flight,
        ledger_entries: snapshot.ledger.len(),
        cached_balances: state.cache.balances.entry_count(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    logged_in: bool,
    request_in_flight: bool,
    ledger_entries: usize,
    cached_balances: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    kind: Option<&'static str>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self {
            status,
            message,
            kind: None,
        }
    }

    pub fn with_kind(status: StatusCode, message: String, kind: &'static str) -> Self {
        let mut error = Self::new(status, message);
        error.kind = Some(kind);
        error
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
            kind: self.kind,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

/// Collapse a faucet failure into the generic user-facing message while
/// keeping the machine-readable kind in the body.
pub fn map_faucet_error(err: FaucetError) -> HttpError {
    let status = match &err {
        FaucetError::NotLoggedIn => StatusCode::UNAUTHORIZED,
        FaucetError::QuotaExhausted => StatusCode::TOO_MANY_REQUESTS,
        FaucetError::CaptchaMismatch => StatusCode::BAD_REQUEST,
        FaucetError::AmountNotOnMenu { .. } => StatusCode::BAD_REQUEST,
        FaucetError::RequestInFlight => StatusCode::CONFLICT,
        FaucetError::Chain(_) => StatusCode::BAD_GATEWAY,
    };
    HttpError::with_kind(status, STATUS_REQUEST_FAILED.to_string(), err.kind())
}
