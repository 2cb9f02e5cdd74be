//! `GET/POST /api_keys`, `DELETE /api_keys/{id}` (§6, §7). The plaintext of a
//! minted key is returned exactly once, in the mint response; only its hash
//! is ever persisted.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use msm_db::{ApiKey, MintedApiKey};
use msm_utils::response::ApiResponse;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api_keys", get(list_keys).post(create_key))
        .route("/api_keys/{id}", axum::routing::delete(delete_key))
}

async fn list_keys(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<ApiKey>>>, ApiError> {
    let keys = ApiKey::list_all(&state.supervisor.db().pool).await?;
    Ok(Json(ApiResponse::success(keys)))
}

fn default_permissions() -> String {
    "full".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: String,
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

async fn create_key(
    State(state): State<AppState>,
    Json(body): Json<CreateApiKeyRequest>,
) -> Result<Json<ApiResponse<MintedApiKey>>, ApiError> {
    if body.label.trim().is_empty() {
        return Err(ApiError::BadRequest("label must not be empty".to_string()));
    }
    let minted = ApiKey::mint(&state.supervisor.db().pool, &body.label, &body.permissions).await?;
    Ok(Json(ApiResponse::success(minted)))
}

async fn delete_key(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    ApiKey::delete(&state.supervisor.db().pool, id).await?;
    Ok(Json(ApiResponse::success(())))
}
