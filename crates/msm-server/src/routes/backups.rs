//! `GET/POST /servers/{id}/backups`, `POST /backups/{id}/restore`,
//! `DELETE /backups/{id}` (§3, §6).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use msm_db::{Backup, BackupKind};
use msm_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers/{id}/backups", get(list_backups).post(create_backup))
        .route("/backups/{id}", axum::routing::delete(delete_backup))
        .route("/backups/{id}/restore", post(restore_backup))
}

async fn list_backups(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Backup>>>, ApiError> {
    let backups = Backup::list_for_server(&state.supervisor.db().pool, server_id).await?;
    Ok(Json(ApiResponse::success(backups)))
}

async fn create_backup(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
) -> Result<Json<ApiResponse<Backup>>, ApiError> {
    let backup = state.supervisor.backup(server_id, BackupKind::Manual).await?;
    Ok(Json(ApiResponse::success(backup)))
}

async fn restore_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.supervisor.restore_backup(backup_id).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn delete_backup(
    State(state): State<AppState>,
    Path(backup_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let backup = Backup::find_by_id(&state.supervisor.db().pool, backup_id).await?.ok_or(ApiError::NotFound)?;
    if let Err(e) = std::fs::remove_file(&backup.file_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(ApiError::Io(e));
        }
    }
    Backup::delete(&state.supervisor.db().pool, backup_id).await?;
    Ok(Json(ApiResponse::success(())))
}
