use std::sync::Arc;

use chrono::NaiveDateTime;
use rinkdb_db::models::{DbSchedulerConfig, DbSchedulerRun};
use rinkdb_scheduler::manager::{ConfigParams, ConfigPatch, JobState, SchedulerManager};
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ApiConfig {
    pub season_id: Uuid,
    pub state: JobState,
    pub active_days: Vec<i32>,
    pub start_hour: i32,
    pub end_hour: i32,
    pub interval_minutes: i32,
    pub interval_seconds: Option<i32>,
    pub last_run_at: Option<NaiveDateTime>,
    pub last_run_status: Option<String>,
}

impl From<DbSchedulerConfig> for ApiConfig {
    fn from(config: DbSchedulerConfig) -> Self {
        Self {
            season_id: config.season_id,
            state: JobState::of(&config),
            active_days: config.active_days.clone(),
            start_hour: config.start_hour,
            end_hour: config.end_hour,
            interval_minutes: config.interval_minutes,
            interval_seconds: config.interval_seconds,
            last_run_at: config.last_run_at,
            last_run_status: config.last_run_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiRun {
    pub id: i64,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub status: String,
    pub matches_fetched: i32,
    pub matches_new: i32,
    pub error_message: Option<String>,
}

impl From<DbSchedulerRun> for ApiRun {
    fn from(run: DbSchedulerRun) -> Self {
        Self {
            id: run.id,
            started_at: run.started_at,
            finished_at: run.finished_at,
            status: run.status,
            matches_fetched: run.matches_fetched,
            matches_new: run.matches_new,
            error_message: run.error_message,
        }
    }
}

#[get("/scheduler")]
pub async fn list_configs(
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<Vec<ApiConfig>>, ApiError> {
    let configs = manager.list_configs()?;
    Ok(Json(configs.into_iter().map(ApiConfig::from).collect()))
}

#[get("/seasons/<season_id>/scheduler")]
pub async fn get_config(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(manager.get_config(season_id)?.into()))
}

#[post("/seasons/<season_id>/scheduler", data = "<params>")]
pub async fn create_config(
    season_id: Uuid,
    params: Json<ConfigParams>,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(
        manager.create_config(season_id, params.into_inner())?.into(),
    ))
}

#[patch("/seasons/<season_id>/scheduler", data = "<patch>")]
pub async fn update_config(
    season_id: Uuid,
    patch: Json<ConfigPatch>,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(
        manager.update_config(season_id, patch.into_inner())?.into(),
    ))
}

#[delete("/seasons/<season_id>/scheduler")]
pub async fn delete_config(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<rocket::response::status::NoContent, ApiError> {
    manager.delete_config(season_id)?;
    Ok(rocket::response::status::NoContent)
}

#[post("/seasons/<season_id>/scheduler/start")]
pub async fn start(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(manager.start(season_id)?.into()))
}

#[post("/seasons/<season_id>/scheduler/pause")]
pub async fn pause(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(manager.pause(season_id)?.into()))
}

#[post("/seasons/<season_id>/scheduler/resume")]
pub async fn resume(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(manager.resume(season_id)?.into()))
}

#[post("/seasons/<season_id>/scheduler/stop")]
pub async fn stop(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<ApiConfig>, ApiError> {
    Ok(Json(manager.stop(season_id)?.into()))
}

#[get("/seasons/<season_id>/scheduler/runs")]
pub async fn runs(
    season_id: Uuid,
    manager: &State<Arc<SchedulerManager>>,
) -> Result<Json<Vec<ApiRun>>, ApiError> {
    let runs = manager.runs(season_id)?;
    Ok(Json(runs.into_iter().map(ApiRun::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn api_config_reports_live_state() {
        let now = Utc::now().naive_utc();
        let config = DbSchedulerConfig {
            id: 7,
            season_id: Uuid::new_v4(),
            active_days: vec![0, 2, 4],
            start_hour: 18,
            end_hour: 23,
            interval_minutes: 10,
            interval_seconds: Some(30),
            is_active: true,
            is_paused: true,
            last_run_at: Some(now),
            last_run_status: Some("success".to_string()),
            created_at: now,
            updated_at: now,
        };

        let api: ApiConfig = config.into();
        assert_eq!(api.state, JobState::Paused);
        assert_eq!(api.active_days, vec![0, 2, 4]);
        assert_eq!(api.interval_seconds, Some(30));
        assert_eq!(api.last_run_status.as_deref(), Some("success"));
    }
}
