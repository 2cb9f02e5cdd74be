//! `GET/PUT /servers/{id}/properties` (§6) — the server's `server.properties`
//! file, exposed as a flat key/value map. No `.properties`-parsing crate
//! exists anywhere in the corpus, so parsing follows the same
//! filename/line-convention approach as `msm_supervisor::jvm::eula_accepted`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use msm_db::ManagedServer;
use msm_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/servers/{id}/properties",
        get(get_properties).put(put_properties),
    )
}

fn properties_path(working_directory: &str) -> PathBuf {
    PathBuf::from(working_directory).join("server.properties")
}

fn parse_properties(raw: &str) -> BTreeMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn render_properties(properties: &BTreeMap<String, String>) -> String {
    properties.iter().map(|(k, v)| format!("{k}={v}\n")).collect()
}

async fn get_properties(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<BTreeMap<String, String>>>, ApiError> {
    let server = ManagedServer::find_by_id(&state.supervisor.db().pool, id).await?.ok_or(ApiError::NotFound)?;
    let path = properties_path(&server.working_directory);
    let properties = match std::fs::read_to_string(&path) {
        Ok(raw) => parse_properties(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(e) => return Err(ApiError::Io(e)),
    };
    Ok(Json(ApiResponse::success(properties)))
}

async fn put_properties(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(properties): Json<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let server = ManagedServer::find_by_id(&state.supervisor.db().pool, id).await?.ok_or(ApiError::NotFound)?;
    if server.running {
        return Err(ApiError::BadRequest(
            "server.properties cannot be edited while the server is running".to_string(),
        ));
    }
    let path = properties_path(&server.working_directory);
    std::fs::write(&path, render_properties(&properties))?;
    Ok(Json(ApiResponse::success(())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_properties_skips_comments_and_blank_lines() {
        let raw = "#Minecraft server properties\nmotd=hello\n\nmax-players=20\n";
        let parsed = parse_properties(raw);
        assert_eq!(parsed.get("motd").map(String::as_str), Some("hello"));
        assert_eq!(parsed.get("max-players").map(String::as_str), Some("20"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn render_then_parse_round_trips() {
        let mut properties = BTreeMap::new();
        properties.insert("motd".to_string(), "a server".to_string());
        properties.insert("level-seed".to_string(), "".to_string());
        let rendered = render_properties(&properties);
        assert_eq!(parse_properties(&rendered), properties);
    }
}
