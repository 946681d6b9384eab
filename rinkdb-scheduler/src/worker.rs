use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info};
use proclubs::ProclubsClient;
use rinkdb_db::models::DbSchedulerConfig;
use rinkdb_db::pool::ConnectionPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fetch;
use crate::window::window_admits;

/// Everything a worker shares with its siblings: one connection pool, one
/// HTTP client, and the process-wide platform tag.
#[derive(Clone)]
pub struct WorkerDeps {
    pub pool: ConnectionPool,
    pub client: Arc<ProclubsClient>,
    pub platform: String,
}

/// Handle to one season's worker task. The manager owns these exclusively;
/// the task itself owns its timer and exits when the token is cancelled.
pub struct JobHandle {
    pub season_id: Uuid,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl JobHandle {
    pub fn spawn(deps: WorkerDeps, config: DbSchedulerConfig, start_paused: bool) -> Self {
        let season_id = config.season_id;
        let cancel = CancellationToken::new();
        let paused = Arc::new(AtomicBool::new(start_paused));

        let join = tokio::spawn(run_worker(deps, config, cancel.clone(), paused.clone()));

        Self {
            season_id,
            cancel,
            paused,
            join,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Raises the cancellation signal. An in-flight tick finishes its
    /// current match transaction and closes its run before the task exits.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) {
        self.cancel.cancel();
        if let Err(err) = self.join.await {
            error!(
                "Worker task for season {} exited abnormally: {err}",
                self.season_id
            );
        }
    }
}

fn tick_period(config: &DbSchedulerConfig) -> Duration {
    let seconds =
        i64::from(config.interval_minutes) * 60 + i64::from(config.interval_seconds.unwrap_or(0));
    Duration::from_secs(seconds.max(1) as u64)
}

async fn run_worker(
    deps: WorkerDeps,
    config: DbSchedulerConfig,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
) {
    let season_id = config.season_id;
    let period = tick_period(&config);
    info!("Worker for season {season_id} started with a {period:?} interval");

    let mut timer = tokio::time::interval(period);
    // A tick that overruns its interval causes the next tick to be skipped,
    // never queued, so ticks of one job can't overlap.
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick completes immediately; swallow it so a newly
    // started or updated job waits one full interval before fetching.
    timer.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        if paused.load(Ordering::SeqCst) {
            debug!("Season {season_id} is paused, skipping tick");
            continue;
        }
        if !window_admits(
            &config.active_days,
            config.start_hour,
            config.end_hour,
            chrono::Utc::now(),
        ) {
            debug!("Season {season_id} is outside its fetch window, skipping tick");
            continue;
        }

        match fetch::run_tick(&deps, &config, &cancel).await {
            Ok(outcome) => {
                info!(
                    "Season {season_id} run {} finished {}: {} fetched, {} new",
                    outcome.run_id, outcome.status, outcome.matches_fetched, outcome.matches_new
                );
            }
            Err(err) => {
                // A failed tick must not take the job down; the next tick
                // still fires.
                error!("Season {season_id} tick failed: {err}");
            }
        }
    }

    info!("Worker for season {season_id} exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config_with_interval(minutes: i32, seconds: Option<i32>) -> DbSchedulerConfig {
        let now = Utc::now().naive_utc();
        DbSchedulerConfig {
            id: 1,
            season_id: Uuid::new_v4(),
            active_days: vec![0, 1, 2, 3, 4, 5, 6],
            start_hour: 0,
            end_hour: 24,
            interval_minutes: minutes,
            interval_seconds: seconds,
            is_active: true,
            is_paused: false,
            last_run_at: None,
            last_run_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tick_period_combines_minutes_and_seconds() {
        assert_eq!(
            tick_period(&config_with_interval(1, None)),
            Duration::from_secs(60)
        );
        assert_eq!(
            tick_period(&config_with_interval(2, Some(30))),
            Duration::from_secs(150)
        );
    }
}
