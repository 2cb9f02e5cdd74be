//! `GET/POST /servers/{id}/plugins`, `PATCH/DELETE /plugins/{id}` (§3, §4.8).
//! Disable/enable is the file-rename dance the spec mandates: the record
//! follows a `.jar` / `.jar.disabled` rename rather than tracking a bare
//! boolean divorced from the filesystem.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use msm_db::{CreatePlugin, ManagedServer, Plugin, PluginSource};
use msm_utils::response::ApiResponse;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers/{id}/plugins", get(list_plugins).post(install_plugin))
        .route("/plugins/{id}", axum::routing::patch(update_plugin).delete(delete_plugin))
}

async fn list_plugins(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Plugin>>>, ApiError> {
    let plugins = Plugin::list_for_server(&state.supervisor.db().pool, server_id).await?;
    Ok(Json(ApiResponse::success(plugins)))
}

#[derive(Debug, Deserialize)]
pub struct InstallPluginRequest {
    pub source: PluginSource,
    pub project_id: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
}

async fn install_plugin(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
    Json(body): Json<InstallPluginRequest>,
) -> Result<Json<ApiResponse<Plugin>>, ApiError> {
    let pool = &state.supervisor.db().pool;
    let server = ManagedServer::find_by_id(pool, server_id).await?.ok_or(ApiError::NotFound)?;
    let plugins_dir = PathBuf::from(&server.working_directory).join("plugins");
    std::fs::create_dir_all(&plugins_dir)?;

    let request = msm_fetchers::plugin::PluginRequest {
        project_id: body.project_id.as_deref(),
        version: body.version.as_deref(),
        url: body.url.as_deref(),
        dest_dir: &plugins_dir,
    };
    let artifact = match body.source {
        PluginSource::Modrinth => msm_fetchers::plugin::fetch_modrinth(&state.http, request).await,
        PluginSource::Hangar => msm_fetchers::plugin::fetch_hangar(&state.http, request).await,
        PluginSource::Url => msm_fetchers::plugin::fetch_url(&state.http, request).await,
    }
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let name = artifact
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "plugin".to_string());

    let plugin = Plugin::insert(
        pool,
        CreatePlugin {
            server_id,
            name,
            source: body.source,
            source_project_id: body.project_id,
            installed_version: body.version,
            file_path: artifact.path.to_string_lossy().to_string(),
        },
    )
    .await?;
    Ok(Json(ApiResponse::success(plugin)))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePluginRequest {
    pub enabled: bool,
}

async fn update_plugin(
    State(state): State<AppState>,
    Path(plugin_id): Path<i64>,
    Json(body): Json<UpdatePluginRequest>,
) -> Result<Json<ApiResponse<Plugin>>, ApiError> {
    let pool = &state.supervisor.db().pool;
    let plugin = Plugin::find_by_id(pool, plugin_id).await?.ok_or(ApiError::NotFound)?;
    if plugin.enabled != body.enabled {
        let current = PathBuf::from(&plugin.file_path);
        let renamed = if body.enabled {
            PathBuf::from(current.to_string_lossy().trim_end_matches(".disabled"))
        } else {
            let mut name = current.to_string_lossy().to_string();
            name.push_str(".disabled");
            PathBuf::from(name)
        };
        if current.exists() {
            std::fs::rename(&current, &renamed)?;
        }
        sqlx::query("UPDATE plugins SET file_path = ? WHERE id = ?")
            .bind(renamed.to_string_lossy().to_string())
            .bind(plugin_id)
            .execute(pool)
            .await?;
    }
    Plugin::set_enabled(pool, plugin_id, body.enabled).await?;
    let updated = Plugin::find_by_id(pool, plugin_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn delete_plugin(
    State(state): State<AppState>,
    Path(plugin_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let pool = &state.supervisor.db().pool;
    let plugin = Plugin::find_by_id(pool, plugin_id).await?.ok_or(ApiError::NotFound)?;
    if let Err(e) = std::fs::remove_file(&plugin.file_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(ApiError::Io(e));
        }
    }
    Plugin::delete(pool, plugin_id).await?;
    Ok(Json(ApiResponse::success(())))
}
