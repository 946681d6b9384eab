use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of one scheduler run, stored as text in `info.scheduler_runs`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Partial,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::seasons)]
pub struct NewSeason<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::seasons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSeason {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::clubs)]
pub struct NewClub<'a> {
    pub id: Uuid,
    pub season_id: Uuid,
    pub name: &'a str,
    pub external_club_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations, Serialize)]
#[diesel(belongs_to(DbSeason, foreign_key = season_id))]
#[diesel(table_name = crate::data_schema::data::clubs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbClub {
    pub id: Uuid,
    pub season_id: Uuid,
    pub name: String,
    pub external_club_id: Option<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::matches)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewMatch<'a> {
    pub external_match_id: &'a str,
    pub external_timestamp: i64,
    pub season_id: Option<Uuid>,
    pub home_club_external_id: Option<i64>,
    pub away_club_external_id: Option<i64>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub is_home: Option<bool>,
    pub winning_club_external_id: Option<i64>,
    pub raw: &'a serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::matches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbMatch {
    pub id: i64,
    pub external_match_id: String,
    pub external_timestamp: i64,
    pub season_id: Option<Uuid>,
    pub home_club_external_id: Option<i64>,
    pub away_club_external_id: Option<i64>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub is_home: Option<bool>,
    pub winning_club_external_id: Option<i64>,
    pub raw: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::data_schema::data::players)]
pub struct NewPlayer<'a> {
    pub external_player_id: &'a str,
    pub gamertag: &'a str,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

#[derive(Debug, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::data_schema::data::players)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbPlayer {
    pub id: i64,
    pub external_player_id: String,
    pub gamertag: String,
    pub first_seen_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
}

/// One player's line for one match. Every stat column is nullable: the
/// upstream encodes most numbers as strings and omits fields freely, and a
/// value that doesn't parse is stored as null rather than failing the match.
#[derive(Debug, Default, Insertable)]
#[diesel(table_name = crate::data_schema::data::player_match_stats)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlayerMatchStats {
    pub external_player_id: String,
    pub external_match_id: String,
    pub position: Option<String>,
    pub pos_sorted: Option<i32>,
    pub client_platform: Option<String>,
    pub player_level: Option<i32>,
    pub player_dnf: Option<bool>,
    pub is_guest: Option<bool>,
    pub team_side: Option<i32>,
    pub result: Option<i32>,
    pub score: Option<i32>,
    pub opponent_score: Option<i32>,
    pub rating_offense: Option<f64>,
    pub rating_defense: Option<f64>,
    pub rating_teamplay: Option<f64>,
    pub toi: Option<i32>,
    pub toi_seconds: Option<i32>,
    pub goals: Option<i32>,
    pub assists: Option<i32>,
    pub shots: Option<i32>,
    pub shot_attempts: Option<i32>,
    pub shot_pct: Option<f64>,
    pub shots_on_net_pct: Option<f64>,
    pub hits: Option<i32>,
    pub giveaways: Option<i32>,
    pub takeaways: Option<i32>,
    pub interceptions: Option<i32>,
    pub passes: Option<i32>,
    pub pass_attempts: Option<i32>,
    pub pass_pct: Option<f64>,
    pub saucer_passes: Option<i32>,
    pub plus_minus: Option<i32>,
    pub penalty_minutes: Option<i32>,
    pub penalties_drawn: Option<i32>,
    pub possession_seconds: Option<i32>,
    pub deflections: Option<i32>,
    pub blocked_shots: Option<i32>,
    pub faceoffs_won: Option<i32>,
    pub faceoffs_lost: Option<i32>,
    pub faceoff_pct: Option<f64>,
    pub pp_goals: Option<i32>,
    pub sh_goals: Option<i32>,
    pub gw_goals: Option<i32>,
    pub pk_clear_zone: Option<i32>,
    pub breakaway_goals: Option<i32>,
    pub penalty_shot_goals: Option<i32>,
    pub saves: Option<i32>,
    pub shots_against: Option<i32>,
    pub save_pct: Option<f64>,
    pub goals_against: Option<i32>,
    pub goals_against_avg: Option<f64>,
    pub shutout_periods: Option<i32>,
    pub breakaway_saves: Option<i32>,
    pub breakaway_shots: Option<i32>,
    pub breakaway_save_pct: Option<f64>,
    pub penalty_shot_saves: Option<i32>,
    pub penalty_shots_against: Option<i32>,
    pub penalty_shot_save_pct: Option<f64>,
    pub poke_checks: Option<i32>,
    pub desperation_saves: Option<i32>,
    pub gl_pk_clear_zone: Option<i32>,
    pub shutouts: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::scheduler_configs)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewSchedulerConfig {
    pub season_id: Uuid,
    pub active_days: Vec<i32>,
    pub start_hour: i32,
    pub end_hour: i32,
    pub interval_minutes: i32,
    pub interval_seconds: Option<i32>,
    pub is_active: bool,
    pub is_paused: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::info_schema::info::scheduler_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSchedulerConfig {
    pub id: i64,
    pub season_id: Uuid,
    pub active_days: Vec<i32>,
    pub start_hour: i32,
    pub end_hour: i32,
    pub interval_minutes: i32,
    pub interval_seconds: Option<i32>,
    pub is_active: bool,
    pub is_paused: bool,
    pub last_run_at: Option<NaiveDateTime>,
    pub last_run_status: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial update of the schedule fields. Lifecycle flags are changed
/// through their own dedicated queries, never through this changeset.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::info_schema::info::scheduler_configs)]
pub struct SchedulerConfigChangeset {
    pub active_days: Option<Vec<i32>>,
    pub start_hour: Option<i32>,
    pub end_hour: Option<i32>,
    pub interval_minutes: Option<i32>,
    pub interval_seconds: Option<Option<i32>>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::info_schema::info::scheduler_runs)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewSchedulerRun<'a> {
    pub config_id: i64,
    pub season_id: Uuid,
    pub started_at: NaiveDateTime,
    pub status: &'a str,
    pub matches_fetched: i32,
    pub matches_new: i32,
}

#[derive(Debug, Clone, Identifiable, Queryable, Selectable, Associations, Serialize)]
#[diesel(belongs_to(DbSchedulerConfig, foreign_key = config_id))]
#[diesel(table_name = crate::info_schema::info::scheduler_runs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DbSchedulerRun {
    pub id: i64,
    pub config_id: i64,
    pub season_id: Uuid,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub status: String,
    pub matches_fetched: i32,
    pub matches_new: i32,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn run_status_round_trips_through_text() {
        for status in [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failed,
            RunStatus::Partial,
        ] {
            let text = status.to_string();
            assert_eq!(text, text.to_lowercase());
            assert_eq!(RunStatus::from_str(&text).unwrap(), status);
        }
    }
}
