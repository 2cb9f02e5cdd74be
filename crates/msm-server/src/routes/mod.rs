pub mod api_keys;
pub mod backups;
pub mod console;
pub mod health;
pub mod java;
pub mod plugins;
pub mod properties;
pub mod schedules;
pub mod servers;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

use crate::auth::require_api_key_for_mutations;
use crate::state::AppState;

/// Builds the full `/api/v1` router, grounded on the teacher's
/// `routes::router` composition pattern: one `.merge` per route module, all
/// sharing one `State`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(servers::router())
        .merge(backups::router())
        .merge(plugins::router())
        .merge(schedules::router())
        .merge(java::router())
        .merge(properties::router())
        .merge(api_keys::router())
        .merge(console::router())
        .layer(from_fn_with_state(state.clone(), require_api_key_for_mutations));

    Router::new().nest("/api/v1", api).with_state(state)
}
