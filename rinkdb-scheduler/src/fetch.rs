use chrono::Utc;
use log::{error, warn};
use miette::Diagnostic;
use rinkdb_db::db;
use rinkdb_db::models::{DbSchedulerConfig, RunStatus};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::worker::WorkerDeps;

/// Errors that prevent a tick from being recorded at all. Failures past the
/// point where the run row exists are absorbed into the run's status
/// instead.
#[derive(Debug, Error, Diagnostic)]
pub enum TickError {
    #[error("couldn't get a database connection for the tick")]
    Pool(#[from] rinkdb_db::pool::PoolError),

    #[error("database error recording the tick")]
    Db(#[from] rinkdb_db::QueryError),
}

pub struct TickOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub matches_fetched: i32,
    pub matches_new: i32,
}

struct TickCounters {
    matches_fetched: i32,
    matches_new: i32,
    errors: Vec<String>,
    cancelled: bool,
}

/// One tick of one season's fetch pipeline: open a run, fetch every club's
/// recent matches, pipe each match through the dedup/persist path, close the
/// run. A failure against one club or one match is recorded and the rest of
/// the tick continues.
pub async fn run_tick(
    deps: &WorkerDeps,
    config: &DbSchedulerConfig,
    cancel: &CancellationToken,
) -> Result<TickOutcome, TickError> {
    let mut conn = deps.pool.get()?;
    let run_id = db::start_run(&mut conn, config.id, config.season_id, Utc::now())?;

    let counters = fetch_season(deps, config, cancel, &mut conn).await;

    let status = run_status(&counters);
    let error_message = if counters.errors.is_empty() {
        if counters.cancelled {
            Some("tick cancelled before completing".to_string())
        } else {
            None
        }
    } else {
        Some(counters.errors.join("; "))
    };

    let finished_at = Utc::now();
    db::finish_run(
        &mut conn,
        run_id,
        finished_at,
        status,
        counters.matches_fetched,
        counters.matches_new,
        error_message.as_deref(),
    )?;
    db::update_config_last_run(&mut conn, config.id, finished_at, status)?;

    Ok(TickOutcome {
        run_id,
        status,
        matches_fetched: counters.matches_fetched,
        matches_new: counters.matches_new,
    })
}

async fn fetch_season(
    deps: &WorkerDeps,
    config: &DbSchedulerConfig,
    cancel: &CancellationToken,
    conn: &mut rinkdb_db::PgConnection,
) -> TickCounters {
    let mut counters = TickCounters {
        matches_fetched: 0,
        matches_new: 0,
        errors: Vec::new(),
        cancelled: false,
    };

    let clubs = match db::clubs_for_season(conn, config.season_id) {
        Ok(clubs) => clubs,
        Err(err) => {
            counters.errors.push(format!("failed to load clubs: {err}"));
            return counters;
        }
    };

    for club in clubs {
        if cancel.is_cancelled() {
            counters.cancelled = true;
            return counters;
        }

        let external_id = match club.external_club_id {
            Some(external_id) => external_id,
            None => match deps.client.resolve_club(&club.name, &deps.platform).await {
                Ok(Some(external_id)) => {
                    // Best effort. A failed write-back just means the next
                    // tick resolves again.
                    if let Err(err) = db::set_club_external_id(conn, club.id, external_id) {
                        warn!("Couldn't cache external id for club {:?}: {err}", club.name);
                    }
                    external_id
                }
                Ok(None) => {
                    counters
                        .errors
                        .push(format!("club {:?} not found upstream", club.name));
                    continue;
                }
                Err(err) => {
                    counters
                        .errors
                        .push(format!("club {:?}: resolve failed: {err}", club.name));
                    continue;
                }
            },
        };

        let matches = match deps.client.list_matches(external_id, &deps.platform).await {
            Ok(matches) => matches,
            Err(err) => {
                counters
                    .errors
                    .push(format!("club {:?}: match fetch failed: {err}", club.name));
                continue;
            }
        };

        counters.matches_fetched += matches.len() as i32;

        for payload in &matches {
            if cancel.is_cancelled() {
                counters.cancelled = true;
                return counters;
            }

            match db::persist_match(conn, Some(config.season_id), external_id, payload) {
                Ok(outcome) => {
                    if outcome.newly_inserted {
                        counters.matches_new += 1;
                    }
                }
                Err(err) => {
                    // One bad match must not poison the tick.
                    error!(
                        "Failed to persist match {} for club {:?}: {err}",
                        payload.match_id, club.name
                    );
                    counters
                        .errors
                        .push(format!("match {}: {err}", payload.match_id));
                }
            }
        }
    }

    counters
}

fn run_status(counters: &TickCounters) -> RunStatus {
    if counters.cancelled {
        // The tick was cut short; whatever was processed is committed, the
        // rest was never attempted.
        RunStatus::Partial
    } else if counters.errors.is_empty() {
        RunStatus::Success
    } else if counters.matches_fetched > 0 || counters.matches_new > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(fetched: i32, new: i32, errors: usize, cancelled: bool) -> TickCounters {
        TickCounters {
            matches_fetched: fetched,
            matches_new: new,
            errors: (0..errors).map(|i| format!("error {i}")).collect(),
            cancelled,
        }
    }

    #[test]
    fn clean_tick_is_success_even_with_zero_matches() {
        assert_eq!(run_status(&counters(3, 3, 0, false)), RunStatus::Success);
        assert_eq!(run_status(&counters(0, 0, 0, false)), RunStatus::Success);
    }

    #[test]
    fn errors_with_some_progress_are_partial() {
        assert_eq!(run_status(&counters(2, 2, 1, false)), RunStatus::Partial);
        assert_eq!(run_status(&counters(3, 0, 1, false)), RunStatus::Partial);
    }

    #[test]
    fn errors_with_no_fetched_matches_are_failed() {
        assert_eq!(run_status(&counters(0, 0, 1, false)), RunStatus::Failed);
        assert_eq!(run_status(&counters(0, 0, 3, false)), RunStatus::Failed);
    }

    #[test]
    fn cancellation_closes_the_run_as_partial() {
        assert_eq!(run_status(&counters(5, 2, 0, true)), RunStatus::Partial);
        assert_eq!(run_status(&counters(0, 0, 0, true)), RunStatus::Partial);
    }
}
