//! `GET /java` (§4.1, §6) — the runtimes the Platform Backend discovered on
//! this host, used by the browser/CLI to populate a runtime picker.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use msm_platform::DiscoveredRuntime;
use msm_utils::response::ApiResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/java", get(list_runtimes))
}

async fn list_runtimes(State(state): State<AppState>) -> Json<ApiResponse<Vec<DiscoveredRuntime>>> {
    let mut runtimes = state.supervisor.platform().discover_runtimes();
    runtimes.sort_by_key(|r| std::cmp::Reverse(r.major_version));
    Json(ApiResponse::success(runtimes))
}
