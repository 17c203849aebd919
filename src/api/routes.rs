//! API route definitions.

use axum::{
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::error::PublishError;
use crate::publish::{DeploymentResult, Provider};
use crate::scheduler::{ScheduleRecord, ScheduleRequest};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/publish/vercel", post(deploy_vercel))
        .route("/publish/netlify", post(deploy_netlify))
        .route("/publish/vercel/schedule", post(schedule_vercel))
        .route("/publish/netlify/schedule", post(schedule_netlify))
        .route("/publish/schedules/{project_id}", get(list_schedules))
}

/// Body of an immediate deploy.
#[derive(Debug, Default, Deserialize)]
pub struct DeployRequest {
    pub name: Option<String>,
    pub html: Option<String>,
    pub css: Option<String>,
}

/// JSON request body whose rejections leave through the `{message}`
/// envelope. An empty body reads as `T::default()`, so a bodyless POST
/// reaches the same field validation as `{}`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = PublishError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| PublishError::Validation(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| PublishError::Validation(format!("Invalid JSON body: {}", e)))
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn deploy_vercel(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeployRequest>,
) -> Result<Json<DeploymentResult>, PublishError> {
    deploy_now(&state, Provider::Vercel, req).await
}

async fn deploy_netlify(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<DeployRequest>,
) -> Result<Json<DeploymentResult>, PublishError> {
    deploy_now(&state, Provider::Netlify, req).await
}

/// Synchronous pass-through to the adapter; nothing is persisted.
async fn deploy_now(
    state: &AppState,
    provider: Provider,
    req: DeployRequest,
) -> Result<Json<DeploymentResult>, PublishError> {
    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| PublishError::Validation("Deployment name is required".to_string()))?;

    let adapter = state.providers.get(provider)?;
    let result = adapter
        .deploy(
            &name,
            req.html.as_deref().unwrap_or_default(),
            req.css.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(result))
}

async fn schedule_vercel(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleRecord>), PublishError> {
    create_schedule(&state, Provider::Vercel, req).await
}

async fn schedule_netlify(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleRecord>), PublishError> {
    create_schedule(&state, Provider::Netlify, req).await
}

async fn create_schedule(
    state: &AppState,
    provider: Provider,
    req: ScheduleRequest,
) -> Result<(StatusCode, Json<ScheduleRecord>), PublishError> {
    let new = req.into_new_schedule(provider)?;
    let record = state.store.create(new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_schedules(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<ScheduleRecord>>, PublishError> {
    Ok(Json(state.store.list_for_project(&project_id).await?))
}
