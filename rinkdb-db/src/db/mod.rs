mod to_db_format;

// Third-party imports
use chrono::{DateTime, Utc};
use diesel::{PgConnection, prelude::*};
use proclubs::MatchPayload;
use uuid::Uuid;
// First-party imports
use crate::models::{
    DbClub, DbSchedulerConfig, DbSchedulerRun, DbSeason, NewClub, NewPlayer, NewSchedulerConfig,
    NewSchedulerRun, NewSeason, RunStatus, SchedulerConfigChangeset,
};

pub fn get_config(
    conn: &mut PgConnection,
    season_id: Uuid,
) -> QueryResult<Option<DbSchedulerConfig>> {
    use crate::info_schema::info::scheduler_configs::dsl;

    dsl::scheduler_configs
        .filter(dsl::season_id.eq(season_id))
        .select(DbSchedulerConfig::as_select())
        .first(conn)
        .optional()
}

pub fn get_active_configs(conn: &mut PgConnection) -> QueryResult<Vec<DbSchedulerConfig>> {
    use crate::info_schema::info::scheduler_configs::dsl;

    dsl::scheduler_configs
        .filter(dsl::is_active.eq(true))
        .select(DbSchedulerConfig::as_select())
        .order_by(dsl::created_at)
        .get_results(conn)
}

pub fn list_configs(conn: &mut PgConnection) -> QueryResult<Vec<DbSchedulerConfig>> {
    use crate::info_schema::info::scheduler_configs::dsl;

    dsl::scheduler_configs
        .select(DbSchedulerConfig::as_select())
        .order_by(dsl::created_at)
        .get_results(conn)
}

pub fn insert_config(
    conn: &mut PgConnection,
    new_config: &NewSchedulerConfig,
) -> QueryResult<DbSchedulerConfig> {
    use crate::info_schema::info::scheduler_configs::dsl;

    diesel::insert_into(dsl::scheduler_configs)
        .values(new_config)
        .returning(DbSchedulerConfig::as_returning())
        .get_result(conn)
}

pub fn update_config_schedule(
    conn: &mut PgConnection,
    season_id: Uuid,
    changes: &SchedulerConfigChangeset,
) -> QueryResult<Option<DbSchedulerConfig>> {
    use crate::info_schema::info::scheduler_configs::dsl;

    diesel::update(dsl::scheduler_configs.filter(dsl::season_id.eq(season_id)))
        .set(changes)
        .returning(DbSchedulerConfig::as_returning())
        .get_result(conn)
        .optional()
}

pub fn set_config_lifecycle(
    conn: &mut PgConnection,
    season_id: Uuid,
    is_active: bool,
    is_paused: bool,
    at: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::info_schema::info::scheduler_configs::dsl;

    diesel::update(dsl::scheduler_configs.filter(dsl::season_id.eq(season_id)))
        .set((
            dsl::is_active.eq(is_active),
            dsl::is_paused.eq(is_paused),
            dsl::updated_at.eq(at.naive_utc()),
        ))
        .execute(conn)
}

pub fn update_config_last_run(
    conn: &mut PgConnection,
    config_id: i64,
    at: DateTime<Utc>,
    status: RunStatus,
) -> QueryResult<usize> {
    use crate::info_schema::info::scheduler_configs::dsl;

    diesel::update(dsl::scheduler_configs.filter(dsl::id.eq(config_id)))
        .set((
            dsl::last_run_at.eq(at.naive_utc()),
            dsl::last_run_status.eq(status.to_string()),
        ))
        .execute(conn)
}

/// Deletes a season's config. Its runs go with it via the cascade.
pub fn delete_config(conn: &mut PgConnection, season_id: Uuid) -> QueryResult<usize> {
    use crate::info_schema::info::scheduler_configs::dsl;

    diesel::delete(dsl::scheduler_configs.filter(dsl::season_id.eq(season_id))).execute(conn)
}

pub fn start_run(
    conn: &mut PgConnection,
    config_id: i64,
    season_id: Uuid,
    at: DateTime<Utc>,
) -> QueryResult<i64> {
    use crate::info_schema::info::scheduler_runs::dsl;

    let status = RunStatus::Running.to_string();
    NewSchedulerRun {
        config_id,
        season_id,
        started_at: at.naive_utc(),
        status: &status,
        matches_fetched: 0,
        matches_new: 0,
    }
    .insert_into(dsl::scheduler_runs)
    .returning(dsl::id)
    .get_result(conn)
}

pub fn finish_run(
    conn: &mut PgConnection,
    run_id: i64,
    at: DateTime<Utc>,
    status: RunStatus,
    matches_fetched: i32,
    matches_new: i32,
    error_message: Option<&str>,
) -> QueryResult<usize> {
    use crate::info_schema::info::scheduler_runs::dsl;

    diesel::update(dsl::scheduler_runs.filter(dsl::id.eq(run_id)))
        .set((
            dsl::finished_at.eq(at.naive_utc()),
            dsl::status.eq(status.to_string()),
            dsl::matches_fetched.eq(matches_fetched),
            dsl::matches_new.eq(matches_new),
            dsl::error_message.eq(error_message),
        ))
        .execute(conn)
}

pub fn latest_runs(
    conn: &mut PgConnection,
    season_id: Uuid,
    limit: i64,
) -> QueryResult<Vec<DbSchedulerRun>> {
    use crate::info_schema::info::scheduler_runs::dsl;

    dsl::scheduler_runs
        .filter(dsl::season_id.eq(season_id))
        .select(DbSchedulerRun::as_select())
        .order_by(dsl::started_at.desc())
        .limit(limit)
        .get_results(conn)
}

/// Closes runs that were left open by a crash or forced shutdown. Called
/// once at startup, before any worker is created.
pub fn close_stale_running_runs(conn: &mut PgConnection, at: DateTime<Utc>) -> QueryResult<usize> {
    use crate::info_schema::info::scheduler_runs::dsl;

    diesel::update(dsl::scheduler_runs.filter(dsl::status.eq(RunStatus::Running.to_string())))
        .set((
            dsl::finished_at.eq(at.naive_utc()),
            dsl::status.eq(RunStatus::Failed.to_string()),
            dsl::error_message.eq("ingestor restarted while this run was still open"),
        ))
        .execute(conn)
}

pub fn get_season(conn: &mut PgConnection, season_id: Uuid) -> QueryResult<Option<DbSeason>> {
    use crate::data_schema::data::seasons::dsl;

    dsl::seasons
        .filter(dsl::id.eq(season_id))
        .select(DbSeason::as_select())
        .first(conn)
        .optional()
}

pub fn insert_season(conn: &mut PgConnection, new_season: &NewSeason) -> QueryResult<DbSeason> {
    use crate::data_schema::data::seasons::dsl;

    diesel::insert_into(dsl::seasons)
        .values(new_season)
        .returning(DbSeason::as_returning())
        .get_result(conn)
}

pub fn insert_club(conn: &mut PgConnection, new_club: &NewClub) -> QueryResult<DbClub> {
    use crate::data_schema::data::clubs::dsl;

    diesel::insert_into(dsl::clubs)
        .values(new_club)
        .returning(DbClub::as_returning())
        .get_result(conn)
}

pub fn clubs_for_season(conn: &mut PgConnection, season_id: Uuid) -> QueryResult<Vec<DbClub>> {
    use crate::data_schema::data::clubs::dsl;

    dsl::clubs
        .filter(dsl::season_id.eq(season_id))
        .select(DbClub::as_select())
        .order_by(dsl::created_at)
        .get_results(conn)
}

/// Caches an id resolved through the upstream search so later ticks skip
/// the lookup even across restarts.
pub fn set_club_external_id(
    conn: &mut PgConnection,
    club_id: Uuid,
    external_club_id: i64,
) -> QueryResult<usize> {
    use crate::data_schema::data::clubs::dsl;

    diesel::update(dsl::clubs.filter(dsl::id.eq(club_id)))
        .set(dsl::external_club_id.eq(external_club_id))
        .execute(conn)
}

pub struct PersistOutcome {
    /// False when the dedup key already existed.
    pub newly_inserted: bool,
    pub players_seen: usize,
    pub stats_inserted: usize,
}

/// Idempotently writes one match and its derived entities. Everything
/// happens in a single short transaction; the caller decides what a failure
/// means for the enclosing run.
///
/// Duplicate matches and duplicate stats rows are absorbed by the unique
/// indexes rather than pre-queried, so replays and concurrent fetches of the
/// same match stay safe.
pub fn persist_match(
    conn: &mut PgConnection,
    season_id: Option<Uuid>,
    fetching_club_external_id: i64,
    payload: &MatchPayload,
) -> QueryResult<PersistOutcome> {
    conn.transaction(|conn| {
        persist_match_internal(conn, season_id, fetching_club_external_id, payload)
    })
}

fn persist_match_internal(
    conn: &mut PgConnection,
    season_id: Option<Uuid>,
    fetching_club_external_id: i64,
    payload: &MatchPayload,
) -> QueryResult<PersistOutcome> {
    use crate::data_schema::data::matches::dsl as matches_dsl;
    use crate::data_schema::data::player_match_stats::dsl as stats_dsl;
    use crate::data_schema::data::players::dsl as players_dsl;

    let now = Utc::now().naive_utc();

    let new_match = to_db_format::match_row(season_id, fetching_club_external_id, payload, now);
    let inserted = diesel::insert_into(matches_dsl::matches)
        .values(&new_match)
        .on_conflict((
            matches_dsl::external_match_id,
            matches_dsl::external_timestamp,
        ))
        .do_nothing()
        .execute(conn)?;

    if inserted == 0 {
        // Already archived, possibly from the opposing club's perspective.
        // The first perspective wins; don't touch players either.
        return Ok(PersistOutcome {
            newly_inserted: false,
            players_seen: 0,
            stats_inserted: 0,
        });
    }

    let mut players_seen = 0;
    let mut stats_inserted = 0;
    for (player_id, gamertag, stats_row) in to_db_format::stats_rows(payload) {
        players_seen += 1;

        NewPlayer {
            external_player_id: &player_id,
            gamertag: &gamertag,
            first_seen_at: now,
            last_seen_at: now,
        }
        .insert_into(players_dsl::players)
        .on_conflict(players_dsl::external_player_id)
        .do_update()
        .set((
            players_dsl::gamertag.eq(&gamertag),
            players_dsl::last_seen_at.eq(now),
        ))
        .execute(conn)?;

        stats_inserted += diesel::insert_into(stats_dsl::player_match_stats)
            .values(&stats_row)
            .on_conflict((stats_dsl::external_player_id, stats_dsl::external_match_id))
            .do_nothing()
            .execute(conn)?;
    }

    Ok(PersistOutcome {
        newly_inserted: true,
        players_seen,
        stats_inserted,
    })
}
