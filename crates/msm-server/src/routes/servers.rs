//! `GET/POST /servers`, `GET/PATCH/DELETE /servers/{id}`, the lifecycle
//! actions, and `/servers/{id}/status` (§4.4, §6).

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use msm_db::{DistributionKind, ManagedServer};
use msm_supervisor::{CreateServerSpec, ServerStatus};
use msm_utils::response::ApiResponse;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers).post(create_server))
        .route(
            "/servers/{id}",
            get(get_server).patch(update_server).delete(delete_server),
        )
        .route("/servers/{id}/start", post(start_server))
        .route("/servers/{id}/stop", post(stop_server))
        .route("/servers/{id}/restart", post(restart_server))
        .route("/servers/{id}/status", get(server_status))
}

async fn list_servers(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<ManagedServer>>>, ApiError> {
    let servers = ManagedServer::list_all(&state.supervisor.db().pool).await?;
    Ok(Json(ApiResponse::success(servers)))
}

#[derive(Debug, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub distribution: DistributionKind,
    pub version: String,
    pub tcp_port: i64,
    #[serde(default = "default_heap_size")]
    pub heap_size: String,
    pub runtime_path: Option<String>,
    pub runtime_arguments: Option<String>,
}

fn default_heap_size() -> String {
    "2G".to_string()
}

async fn create_server(
    State(state): State<AppState>,
    Json(body): Json<CreateServerRequest>,
) -> Result<Json<ApiResponse<ManagedServer>>, ApiError> {
    let server = state
        .supervisor
        .create(CreateServerSpec {
            name: body.name,
            distribution: body.distribution,
            version: body.version,
            tcp_port: body.tcp_port,
            heap_size: body.heap_size,
            runtime_path: body.runtime_path,
            runtime_arguments: body.runtime_arguments,
        })
        .await?;
    Ok(Json(ApiResponse::success(server)))
}

async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ManagedServer>>, ApiError> {
    let server = ManagedServer::find_by_id(&state.supervisor.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(server)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateServerRequest {
    pub heap_size: Option<String>,
    pub tcp_port: Option<i64>,
    pub runtime_path: Option<String>,
    pub runtime_arguments: Option<String>,
    pub restart_on_crash: Option<bool>,
}

async fn update_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServerRequest>,
) -> Result<Json<ApiResponse<ManagedServer>>, ApiError> {
    let pool = &state.supervisor.db().pool;
    let existing = ManagedServer::find_by_id(pool, id).await?.ok_or(ApiError::NotFound)?;

    let tcp_port = body.tcp_port.unwrap_or(existing.tcp_port);
    if !(1..=65535).contains(&tcp_port) {
        return Err(ApiError::BadRequest(format!("invalid tcp port {tcp_port}: must be in 1..=65535")));
    }

    ManagedServer::update_config(
        pool,
        id,
        &body.heap_size.unwrap_or(existing.heap_size),
        tcp_port,
        body.runtime_path.as_deref().or(existing.runtime_path.as_deref()),
        body.runtime_arguments.as_deref().or(existing.runtime_arguments.as_deref()),
    )
    .await?;
    if let Some(restart_on_crash) = body.restart_on_crash {
        ManagedServer::set_restart_on_crash(pool, id, restart_on_crash).await?;
    }

    let updated = ManagedServer::find_by_id(pool, id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(updated)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteServerQuery {
    #[serde(default)]
    pub keep_files: bool,
}

async fn delete_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteServerQuery>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.supervisor.delete(id, query.keep_files).await?;
    Ok(Json(ApiResponse::success(())))
}

#[derive(Debug, Serialize)]
struct StartResponse {
    pid: u32,
}

async fn start_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StartResponse>>, ApiError> {
    let pid = state.supervisor.start(id).await?;
    Ok(Json(ApiResponse::success(StartResponse { pid })))
}

async fn stop_server(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.supervisor.stop(id, msm_supervisor::DEFAULT_STOP_GRACE).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn restart_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StartResponse>>, ApiError> {
    let pid = state.supervisor.restart(id).await?;
    Ok(Json(ApiResponse::success(StartResponse { pid })))
}

async fn server_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ServerStatus>>, ApiError> {
    let status = state.supervisor.status(id).await?;
    Ok(Json(ApiResponse::success(status)))
}
