//! `GET/POST /servers/{id}/schedules`, `PATCH/DELETE /schedules/{id}` (§4.7).

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use msm_db::{CreateSchedule, Schedule, ScheduleAction};
use msm_services::CronSchedule;
use msm_utils::response::ApiResponse;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers/{id}/schedules", get(list_schedules).post(create_schedule))
        .route("/schedules/{id}", axum::routing::patch(update_schedule).delete(delete_schedule))
}

async fn list_schedules(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Schedule>>>, ApiError> {
    let schedules = Schedule::list_for_server(&state.supervisor.db().pool, server_id).await?;
    Ok(Json(ApiResponse::success(schedules)))
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub action: ScheduleAction,
    pub cron_expression: String,
    pub payload: Option<String>,
}

async fn create_schedule(
    State(state): State<AppState>,
    Path(server_id): Path<i64>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<Json<ApiResponse<Schedule>>, ApiError> {
    if body.action == ScheduleAction::Command && body.payload.is_none() {
        return Err(ApiError::BadRequest("payload is required for a command schedule".to_string()));
    }
    let cron = CronSchedule::parse(&body.cron_expression).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let pool = &state.supervisor.db().pool;
    let schedule = Schedule::insert(
        pool,
        CreateSchedule {
            server_id,
            action: body.action,
            cron_expression: body.cron_expression,
            payload: body.payload,
        },
    )
    .await?;
    let next_run = cron.first_fire_after(Utc::now()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Schedule::record_run(pool, schedule.id, schedule.last_run.unwrap_or(Utc::now()), Some(next_run)).await?;
    state.scheduler.run_now().await;

    let schedule = Schedule::find_by_id(pool, schedule.id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(schedule)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub enabled: bool,
}

async fn update_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
    Json(body): Json<UpdateScheduleRequest>,
) -> Result<Json<ApiResponse<Schedule>>, ApiError> {
    let pool = &state.supervisor.db().pool;
    Schedule::find_by_id(pool, schedule_id).await?.ok_or(ApiError::NotFound)?;
    Schedule::set_enabled(pool, schedule_id, body.enabled).await?;
    let updated = Schedule::find_by_id(pool, schedule_id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    Schedule::delete(&state.supervisor.db().pool, schedule_id).await?;
    Ok(Json(ApiResponse::success(())))
}
