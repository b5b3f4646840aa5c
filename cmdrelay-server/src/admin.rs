// cmdrelay-server/src/admin.rs
//
// Small JSON API for operators: inspect the config, push a new Twitch token,
// manage the command list. Token updates fan out to the relay through the
// event bus.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use cmdrelay_common::models::{Command, RelayConfig};
use cmdrelay_core::Error;
use cmdrelay_core::services::{CommandService, ConfigService};

#[derive(Clone)]
pub struct AdminState {
    pub config_service: Arc<ConfigService>,
    pub command_service: Arc<CommandService>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCommandRequest {
    pub command_name: String,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CommandPatch {
    pub is_enabled: bool,
}

/// Wraps a core error so handlers can use `?`.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Config(_) | Error::Parse(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Admin request failed: {:?}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/api/config", get(get_config))
        .route("/api/twitch/token", post(update_twitch_token))
        .route("/api/commands", get(list_commands).post(create_command))
        .route("/api/commands/{id}", put(update_command).delete(delete_command))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serves the admin API until the shutdown signal flips to `true`.
pub async fn serve(
    addr: SocketAddr,
    state: AdminState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Admin API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("Admin API shut down.");
    Ok(())
}

async fn get_config(State(state): State<AdminState>) -> Result<Json<RelayConfig>, ApiError> {
    let cfg = state.config_service.current().await?;
    Ok(Json(cfg.redacted()))
}

async fn update_twitch_token(
    State(state): State<AdminState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<RelayConfig>, ApiError> {
    let cfg = state.config_service.update_twitch_token(&req.access_token).await?;
    info!("Twitch token replaced via admin API");
    Ok(Json(cfg.redacted()))
}

async fn list_commands(State(state): State<AdminState>) -> Result<Json<Vec<Command>>, ApiError> {
    Ok(Json(state.command_service.list_commands().await?))
}

async fn create_command(
    State(state): State<AdminState>,
    Json(req): Json<NewCommandRequest>,
) -> Result<(StatusCode, Json<Command>), ApiError> {
    let cmd = state
        .command_service
        .create_command(&req.command_name, req.is_enabled)
        .await?;
    Ok((StatusCode::CREATED, Json(cmd)))
}

async fn update_command(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<CommandPatch>,
) -> Result<Json<Command>, ApiError> {
    let cmd = state
        .command_service
        .set_command_enabled(id, patch.is_enabled)
        .await?;
    Ok(Json(cmd))
}

async fn delete_command(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.command_service.delete_command(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
