use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::faucet::STATUS_LOGIN_FAILED;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub requests_left: u32,
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let session = state
        .engine
        .login(&request.username, &request.password)
        .await
        .map_err(|_| {
            HttpError::with_kind(
                StatusCode::UNAUTHORIZED,
                STATUS_LOGIN_FAILED.to_string(),
                "invalid_credentials",
            )
        })?;

    Ok(Json(LoginResponse {
        username: session.username,
        requests_left: session.requests_left,
    }))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub status: &'static str,
}

async fn logout(State(state): State<AppState>) -> Result<Json<LogoutResponse>, HttpError> {
    state.engine.logout().await;
    Ok(Json(LogoutResponse {
        status: "logged_out",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ChainRegistry;
    use crate::config::CacheConfig;
    use crate::faucet::FaucetEngine;
    use crate::session::Credentials;
    use crate::state::ApiCache;
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state() -> AppState {
        let engine = Arc::new(FaucetEngine::new(
            Credentials::default(),
            5,
            "12345".to_string(),
            Duration::from_secs(30),
            ChainRegistry::simulated_only(Duration::ZERO),
        ));
        let cache = Arc::new(ApiCache::new(&CacheConfig::default()));
        AppState::new(engine, cache)
    }

    #[tokio::test]
    async fn test_login_handler_round_trip() {
        let state = test_state();
        let response = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "demo".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.0.username, "demo");
        assert_eq!(response.0.requests_left, 5);

        logout(State(state.clone())).await.unwrap();
        assert!(state.engine.snapshot().await.session.is_none());
    }

    #[tokio::test]
    async fn test_login_handler_rejects_bad_credentials() {
        let state = test_state();
        let result = login(
            State(state),
            Json(LoginRequest {
                username: "x".to_string(),
                password: "y".to_string(),
            }),
        )
        .await;
        assert!(result.is_err());
    }
}
