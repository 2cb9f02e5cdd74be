//! `X-API-Key` enforcement (§6, §7): when at least one active key exists,
//! every mutating request (anything but GET/HEAD) must carry a valid key.
//! Read-only routes are always open, matching the spec's "mutating routes"
//! wording exactly.

use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use msm_db::ApiKey;

use crate::error::ApiError;
use crate::state::AppState;

const HEADER: &str = "x-api-key";

pub async fn require_api_key_for_mutations(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }

    let any_keys_active = !ApiKey::list_all(&state.supervisor.db().pool)
        .await?
        .into_iter()
        .filter(|k| k.active)
        .collect::<Vec<_>>()
        .is_empty();
    if !any_keys_active {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(presented) = presented else {
        return Err(ApiError::Forbidden);
    };
    // `ApiKey::verify` re-derives the lookup prefix from the presented
    // string's own first 8 characters, so the header carries the minted
    // plaintext verbatim rather than a separately delimited prefix/secret
    // pair.
    match ApiKey::verify(&state.supervisor.db().pool, &presented).await? {
        Some(_) => Ok(next.run(request).await),
        None => Err(ApiError::Forbidden),
    }
}
