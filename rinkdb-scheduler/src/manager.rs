use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use miette::Diagnostic;
use proclubs::ProclubsClient;
use rinkdb_db::db;
use rinkdb_db::models::{
    DbSchedulerConfig, DbSchedulerRun, NewSchedulerConfig, SchedulerConfigChangeset,
};
use rinkdb_db::pool::ConnectionPool;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::SchedulerSettings;
use crate::worker::{JobHandle, WorkerDeps};

/// Observable state of one season's job, derived from its persisted config.
/// The config is the authority; the worker registry is reconciled to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Inactive,
    Running,
    Paused,
}

impl JobState {
    pub fn of(config: &DbSchedulerConfig) -> Self {
        if !config.is_active {
            JobState::Inactive
        } else if config.is_paused {
            JobState::Paused
        } else {
            JobState::Running
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum LifecycleOp {
    Start,
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("season {0} does not exist")]
    SeasonNotFound(Uuid),

    #[error("no scheduler config exists for season {0}")]
    ConfigNotFound(Uuid),

    #[error("a scheduler config already exists for season {0}")]
    ConfigAlreadyExists(Uuid),

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),

    #[error("cannot {operation} a job that is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: JobState,
    },

    #[error("database error")]
    Db(#[from] rinkdb_db::QueryError),

    #[error("couldn't get a database connection")]
    Pool(#[from] rinkdb_db::pool::PoolError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigParams {
    pub active_days: Vec<i32>,
    pub start_hour: i32,
    pub end_hour: i32,
    pub interval_minutes: i32,
    #[serde(default)]
    pub interval_seconds: Option<i32>,
}

/// Partial config update. An absent field keeps its current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub active_days: Option<Vec<i32>>,
    pub start_hour: Option<i32>,
    pub end_hour: Option<i32>,
    pub interval_minutes: Option<i32>,
    pub interval_seconds: Option<i32>,
}

fn validate_schedule(
    active_days: &[i32],
    start_hour: i32,
    end_hour: i32,
    interval_minutes: i32,
    interval_seconds: Option<i32>,
) -> Result<(), SchedulerError> {
    if active_days.iter().any(|day| !(0..=6).contains(day)) {
        return Err(SchedulerError::InvalidConfig(
            "active_days entries must be weekday indices 0 (Monday) through 6 (Sunday)".into(),
        ));
    }
    if !(0..=23).contains(&start_hour) {
        return Err(SchedulerError::InvalidConfig(
            "start_hour must be between 0 and 23".into(),
        ));
    }
    if !(1..=24).contains(&end_hour) {
        return Err(SchedulerError::InvalidConfig(
            "end_hour must be between 1 and 24".into(),
        ));
    }
    if interval_minutes < 1 {
        return Err(SchedulerError::InvalidConfig(
            "interval_minutes must be at least 1".into(),
        ));
    }
    if let Some(seconds) = interval_seconds {
        if !(0..=59).contains(&seconds) {
            return Err(SchedulerError::InvalidConfig(
                "interval_seconds must be between 0 and 59".into(),
            ));
        }
    }
    Ok(())
}

fn check_transition(op: LifecycleOp, state: JobState) -> Result<(), SchedulerError> {
    let permitted = match op {
        LifecycleOp::Start => state == JobState::Inactive,
        LifecycleOp::Pause => state == JobState::Running,
        LifecycleOp::Resume => state == JobState::Paused,
        LifecycleOp::Stop => matches!(state, JobState::Running | JobState::Paused),
    };
    if permitted {
        Ok(())
    } else {
        Err(SchedulerError::InvalidTransition {
            operation: match op {
                LifecycleOp::Start => "start",
                LifecycleOp::Pause => "pause",
                LifecycleOp::Resume => "resume",
                LifecycleOp::Stop => "stop",
            },
            state,
        })
    }
}

/// Process-wide registry of season jobs. All lifecycle operations funnel
/// through here: they mutate the persisted config first, then reconcile the
/// worker to it, so the two can only diverge by a logged warning's worth.
pub struct SchedulerManager {
    deps: WorkerDeps,
    settings: SchedulerSettings,
    jobs: Mutex<HashMap<Uuid, JobHandle>>,
}

impl SchedulerManager {
    pub fn new(
        pool: ConnectionPool,
        client: Arc<ProclubsClient>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            deps: WorkerDeps {
                pool,
                client,
                platform: settings.platform.clone(),
            },
            settings,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Recreates workers for every config that was active at the last
    /// shutdown, preserving paused state, and closes runs a crash left open.
    pub fn restore(&self) -> Result<usize, SchedulerError> {
        let mut conn = self.deps.pool.get()?;

        let stale = db::close_stale_running_runs(&mut conn, Utc::now())?;
        if stale > 0 {
            warn!("Closed {stale} runs left open by a previous shutdown");
        }

        let configs = db::get_active_configs(&mut conn)?;
        let restored = configs.len();

        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        for config in configs {
            let season_id = config.season_id;
            let paused = config.is_paused;
            info!(
                "Restoring {} job for season {season_id}",
                if paused { "paused" } else { "running" }
            );
            jobs.insert(season_id, JobHandle::spawn(self.deps.clone(), config, paused));
        }

        Ok(restored)
    }

    pub fn list_configs(&self) -> Result<Vec<DbSchedulerConfig>, SchedulerError> {
        let mut conn = self.deps.pool.get()?;
        Ok(db::list_configs(&mut conn)?)
    }

    pub fn get_config(&self, season_id: Uuid) -> Result<DbSchedulerConfig, SchedulerError> {
        let mut conn = self.deps.pool.get()?;
        db::get_config(&mut conn, season_id)?.ok_or(SchedulerError::ConfigNotFound(season_id))
    }

    pub fn runs(&self, season_id: Uuid) -> Result<Vec<DbSchedulerRun>, SchedulerError> {
        let mut conn = self.deps.pool.get()?;
        db::get_config(&mut conn, season_id)?.ok_or(SchedulerError::ConfigNotFound(season_id))?;
        Ok(db::latest_runs(
            &mut conn,
            season_id,
            self.settings.runs_page_size,
        )?)
    }

    pub fn create_config(
        &self,
        season_id: Uuid,
        params: ConfigParams,
    ) -> Result<DbSchedulerConfig, SchedulerError> {
        validate_schedule(
            &params.active_days,
            params.start_hour,
            params.end_hour,
            params.interval_minutes,
            params.interval_seconds,
        )?;

        let mut conn = self.deps.pool.get()?;
        db::get_season(&mut conn, season_id)?.ok_or(SchedulerError::SeasonNotFound(season_id))?;

        let now = Utc::now().naive_utc();
        let new_config = NewSchedulerConfig {
            season_id,
            active_days: params.active_days,
            start_hour: params.start_hour,
            end_hour: params.end_hour,
            interval_minutes: params.interval_minutes,
            interval_seconds: params.interval_seconds,
            is_active: false,
            is_paused: false,
            created_at: now,
            updated_at: now,
        };

        db::insert_config(&mut conn, &new_config).map_err(|err| {
            if rinkdb_db::is_unique_violation(&err) {
                SchedulerError::ConfigAlreadyExists(season_id)
            } else {
                err.into()
            }
        })
    }

    /// Updates schedule fields. A live worker is torn down and recreated so
    /// the new timing takes effect immediately; paused state carries over.
    pub fn update_config(
        &self,
        season_id: Uuid,
        patch: ConfigPatch,
    ) -> Result<DbSchedulerConfig, SchedulerError> {
        let mut conn = self.deps.pool.get()?;
        let current =
            db::get_config(&mut conn, season_id)?.ok_or(SchedulerError::ConfigNotFound(season_id))?;

        let merged_days = patch.active_days.clone().unwrap_or(current.active_days);
        validate_schedule(
            &merged_days,
            patch.start_hour.unwrap_or(current.start_hour),
            patch.end_hour.unwrap_or(current.end_hour),
            patch.interval_minutes.unwrap_or(current.interval_minutes),
            patch.interval_seconds.or(current.interval_seconds),
        )?;

        let changes = SchedulerConfigChangeset {
            active_days: patch.active_days,
            start_hour: patch.start_hour,
            end_hour: patch.end_hour,
            interval_minutes: patch.interval_minutes,
            interval_seconds: patch.interval_seconds.map(Some),
            updated_at: Some(Utc::now().naive_utc()),
        };
        let updated = db::update_config_schedule(&mut conn, season_id, &changes)?
            .ok_or(SchedulerError::ConfigNotFound(season_id))?;

        if updated.is_active {
            let mut jobs = self.jobs.lock().expect("job registry poisoned");
            let paused = match jobs.remove(&season_id) {
                Some(old_handle) => {
                    let paused = old_handle.is_paused();
                    old_handle.cancel();
                    paused
                }
                None => {
                    warn!(
                        "Config for season {season_id} is active but had no worker; recreating"
                    );
                    updated.is_paused
                }
            };
            jobs.insert(
                season_id,
                JobHandle::spawn(self.deps.clone(), updated.clone(), paused),
            );
        }

        Ok(updated)
    }

    /// Tears down the worker and deletes the config; runs go with it.
    pub fn delete_config(&self, season_id: Uuid) -> Result<(), SchedulerError> {
        {
            let mut jobs = self.jobs.lock().expect("job registry poisoned");
            if let Some(handle) = jobs.remove(&season_id) {
                handle.cancel();
            }
        }

        let mut conn = self.deps.pool.get()?;
        let deleted = db::delete_config(&mut conn, season_id)?;
        if deleted == 0 {
            return Err(SchedulerError::ConfigNotFound(season_id));
        }
        info!("Deleted scheduler config for season {season_id}");
        Ok(())
    }

    pub fn start(&self, season_id: Uuid) -> Result<DbSchedulerConfig, SchedulerError> {
        self.lifecycle(season_id, LifecycleOp::Start)
    }

    pub fn pause(&self, season_id: Uuid) -> Result<DbSchedulerConfig, SchedulerError> {
        self.lifecycle(season_id, LifecycleOp::Pause)
    }

    pub fn resume(&self, season_id: Uuid) -> Result<DbSchedulerConfig, SchedulerError> {
        self.lifecycle(season_id, LifecycleOp::Resume)
    }

    pub fn stop(&self, season_id: Uuid) -> Result<DbSchedulerConfig, SchedulerError> {
        self.lifecycle(season_id, LifecycleOp::Stop)
    }

    fn lifecycle(
        &self,
        season_id: Uuid,
        op: LifecycleOp,
    ) -> Result<DbSchedulerConfig, SchedulerError> {
        let mut conn = self.deps.pool.get()?;
        let config =
            db::get_config(&mut conn, season_id)?.ok_or(SchedulerError::ConfigNotFound(season_id))?;
        check_transition(op, JobState::of(&config))?;

        let (is_active, is_paused) = match op {
            LifecycleOp::Start | LifecycleOp::Resume => (true, false),
            LifecycleOp::Pause => (true, true),
            LifecycleOp::Stop => (false, false),
        };
        db::set_config_lifecycle(&mut conn, season_id, is_active, is_paused, Utc::now())?;
        let updated =
            db::get_config(&mut conn, season_id)?.ok_or(SchedulerError::ConfigNotFound(season_id))?;

        // Persistence succeeded; now reconcile the worker. Divergence here
        // is repaired rather than surfaced as an operation failure.
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        match op {
            LifecycleOp::Start => {
                if let Some(stray) = jobs.remove(&season_id) {
                    warn!("Season {season_id} had a worker while inactive; replacing it");
                    stray.cancel();
                }
                jobs.insert(
                    season_id,
                    JobHandle::spawn(self.deps.clone(), updated.clone(), false),
                );
                info!("Started scheduler job for season {season_id}");
            }
            LifecycleOp::Pause | LifecycleOp::Resume => {
                let paused = op == LifecycleOp::Pause;
                match jobs.get(&season_id) {
                    Some(handle) => handle.set_paused(paused),
                    None => {
                        warn!(
                            "Season {season_id} was {op}d without a worker; recreating it"
                        );
                        jobs.insert(
                            season_id,
                            JobHandle::spawn(self.deps.clone(), updated.clone(), paused),
                        );
                    }
                }
                info!("{op:?} applied to scheduler job for season {season_id}");
            }
            LifecycleOp::Stop => {
                match jobs.remove(&season_id) {
                    // The in-flight tick, if any, observes the signal at its
                    // next match boundary and closes its run on the way out.
                    Some(handle) => handle.cancel(),
                    None => warn!("Season {season_id} was stopped without a worker"),
                }
                info!("Stopped scheduler job for season {season_id}");
            }
        }

        Ok(updated)
    }

    /// Cancels every worker and waits for in-flight ticks to wind down,
    /// bounded by the configured grace period.
    pub async fn shutdown(&self) {
        let handles: Vec<JobHandle> = {
            let mut jobs = self.jobs.lock().expect("job registry poisoned");
            jobs.drain().map(|(_, handle)| handle).collect()
        };

        info!("Shutting down {} scheduler jobs", handles.len());
        for handle in &handles {
            handle.cancel();
        }

        let grace = Duration::from_secs(self.settings.shutdown_grace_secs);
        let join_all = async {
            for handle in handles {
                handle.join().await;
            }
        };
        if tokio::time::timeout(grace, join_all).await.is_err() {
            warn!(
                "Shutdown grace period of {grace:?} elapsed with workers still running; \
                their runs will be closed as failed on next startup"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(is_active: bool, is_paused: bool) -> DbSchedulerConfig {
        let now = Utc::now().naive_utc();
        DbSchedulerConfig {
            id: 1,
            season_id: Uuid::new_v4(),
            active_days: vec![0, 1, 2, 3, 4],
            start_hour: 18,
            end_hour: 23,
            interval_minutes: 5,
            interval_seconds: None,
            is_active,
            is_paused,
            last_run_at: None,
            last_run_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn job_state_is_derived_from_config_flags() {
        assert_eq!(JobState::of(&config(false, false)), JobState::Inactive);
        assert_eq!(JobState::of(&config(true, false)), JobState::Running);
        assert_eq!(JobState::of(&config(true, true)), JobState::Paused);
    }

    #[test]
    fn transition_matrix_matches_the_state_machine() {
        use JobState::*;
        use LifecycleOp::*;

        let allowed = [
            (Start, Inactive),
            (Pause, Running),
            (Resume, Paused),
            (Stop, Running),
            (Stop, Paused),
        ];
        for (op, state) in allowed {
            assert!(check_transition(op, state).is_ok(), "{op} from {state}");
        }

        let rejected = [
            (Start, Running),
            (Start, Paused),
            (Pause, Inactive),
            (Pause, Paused),
            (Resume, Inactive),
            (Resume, Running),
            (Stop, Inactive),
        ];
        for (op, state) in rejected {
            assert!(
                matches!(
                    check_transition(op, state),
                    Err(SchedulerError::InvalidTransition { .. })
                ),
                "{op} from {state}"
            );
        }
    }

    #[test]
    fn schedule_validation_enforces_bounds() {
        assert!(validate_schedule(&[0, 6], 0, 24, 1, Some(59)).is_ok());
        assert!(validate_schedule(&[], 9, 17, 5, None).is_ok());
        assert!(validate_schedule(&[7], 9, 17, 5, None).is_err());
        assert!(validate_schedule(&[-1], 9, 17, 5, None).is_err());
        assert!(validate_schedule(&[0], 24, 24, 5, None).is_err());
        assert!(validate_schedule(&[0], 0, 0, 5, None).is_err());
        assert!(validate_schedule(&[0], 0, 25, 5, None).is_err());
        assert!(validate_schedule(&[0], 9, 17, 0, None).is_err());
        assert!(validate_schedule(&[0], 9, 17, 1, Some(60)).is_err());
    }
}
