use chrono::NaiveDateTime;
use proclubs::{MatchPayload, value_as_i64};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{NewMatch, NewPlayerMatchStats};

pub fn opt_i32(value: &Value) -> Option<i32> {
    value_as_i64(value).and_then(|v| i32::try_from(v).ok())
}

pub fn opt_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn opt_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) | Value::String(_) => match value_as_i64(value) {
            Some(n) => Some(n != 0),
            None => value.as_str().and_then(|s| s.trim().parse().ok()),
        },
        _ => None,
    }
}

pub fn opt_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Builds the match row from the perspective of the club whose fetch
/// produced this payload. When the payload doesn't say which side that club
/// played on, `is_home` stays null and the fetching club lands in the home
/// columns, which is the best available reading of a one-sided payload.
pub fn match_row<'a>(
    season_id: Option<Uuid>,
    fetching_club_external_id: i64,
    payload: &'a MatchPayload,
    now: NaiveDateTime,
) -> NewMatch<'a> {
    let our_key = fetching_club_external_id.to_string();
    let our_entry = payload.clubs.get(&our_key);
    let opponent = payload
        .clubs
        .iter()
        .find(|(club_id, _)| **club_id != our_key);

    let our_goals = our_entry.and_then(|entry| entry.get("goals")).and_then(opt_i32);
    let opponent_goals = opponent
        .and_then(|(_, entry)| entry.get("goals"))
        .and_then(opt_i32);
    let opponent_id = opponent.and_then(|(club_id, _)| club_id.parse::<i64>().ok());

    // teamSide 0 is home, 1 is away.
    let our_side = our_entry
        .and_then(|entry| entry.get("teamSide"))
        .and_then(opt_i32);

    let (is_home, home_club, away_club, home_score, away_score) = match our_side {
        Some(0) => (
            Some(true),
            Some(fetching_club_external_id),
            opponent_id,
            our_goals,
            opponent_goals,
        ),
        Some(1) => (
            Some(false),
            opponent_id,
            Some(fetching_club_external_id),
            opponent_goals,
            our_goals,
        ),
        _ => (
            None,
            Some(fetching_club_external_id),
            opponent_id,
            our_goals,
            opponent_goals,
        ),
    };

    let winning_club_external_id = match (our_goals, opponent_goals) {
        (Some(ours), Some(theirs)) if ours > theirs => Some(fetching_club_external_id),
        (Some(ours), Some(theirs)) if theirs > ours => opponent_id,
        _ => None,
    };

    NewMatch {
        external_match_id: &payload.match_id,
        external_timestamp: payload.timestamp,
        season_id,
        home_club_external_id: home_club,
        away_club_external_id: away_club,
        home_score,
        away_score,
        is_home,
        winning_club_external_id,
        raw: &payload.raw,
        created_at: now,
    }
}

/// Flattens both teams' player maps into stats rows. The second element of
/// each tuple is the gamertag, falling back to the external id when the
/// payload has no name for the player.
pub fn stats_rows(payload: &MatchPayload) -> Vec<(String, String, NewPlayerMatchStats)> {
    let mut rows = Vec::new();
    for club_players in payload.players.values() {
        for (player_id, stats) in club_players {
            let gamertag = stats
                .get("playername")
                .and_then(opt_string)
                .filter(|tag| !tag.is_empty())
                .unwrap_or_else(|| player_id.clone());
            let row = player_stats_row(&payload.match_id, player_id, stats);
            rows.push((player_id.clone(), gamertag, row));
        }
    }
    rows
}

fn player_stats_row(match_id: &str, player_id: &str, stats: &Value) -> NewPlayerMatchStats {
    let int = |key: &str| stats.get(key).and_then(opt_i32);
    let float = |key: &str| stats.get(key).and_then(opt_f64);
    let boolean = |key: &str| stats.get(key).and_then(opt_bool);
    let text = |key: &str| stats.get(key).and_then(opt_string);

    NewPlayerMatchStats {
        external_player_id: player_id.to_string(),
        external_match_id: match_id.to_string(),
        position: text("position"),
        pos_sorted: int("posSorted"),
        client_platform: text("clientPlatform"),
        player_level: int("playerLevel"),
        player_dnf: boolean("player_dnf"),
        is_guest: boolean("isGuest"),
        team_side: int("teamSide"),
        result: int("result"),
        score: int("score"),
        opponent_score: int("opponentScore"),
        rating_offense: float("ratingOffense"),
        rating_defense: float("ratingDefense"),
        rating_teamplay: float("ratingTeamplay"),
        toi: int("toi"),
        toi_seconds: int("toiseconds"),
        goals: int("skgoals"),
        assists: int("skassists"),
        shots: int("skshots"),
        shot_attempts: int("skshotattempts"),
        shot_pct: float("skshotpct"),
        shots_on_net_pct: float("skshotonnetpct"),
        hits: int("skhits"),
        giveaways: int("skgiveaways"),
        takeaways: int("sktakeaways"),
        interceptions: int("skinterceptions"),
        passes: int("skpasses"),
        pass_attempts: int("skpassattempts"),
        pass_pct: float("skpasspct"),
        saucer_passes: int("sksaucerpasses"),
        plus_minus: int("skplusmin"),
        penalty_minutes: int("skpim"),
        penalties_drawn: int("skpenaltiesdrawn"),
        possession_seconds: int("skpossession"),
        deflections: int("skdeflections"),
        blocked_shots: int("skbs"),
        faceoffs_won: int("skfow"),
        faceoffs_lost: int("skfol"),
        faceoff_pct: float("skfopct"),
        pp_goals: int("skppg"),
        sh_goals: int("skshg"),
        gw_goals: int("skgwg"),
        pk_clear_zone: int("skpkclearzone"),
        breakaway_goals: int("skbreakawaygoals"),
        penalty_shot_goals: int("skpenaltyshotgoals"),
        saves: int("glsaves"),
        shots_against: int("glshots"),
        save_pct: float("glsavepct"),
        goals_against: int("glga"),
        goals_against_avg: float("glgaa"),
        shutout_periods: int("glsoperiods"),
        breakaway_saves: int("glbrksaves"),
        breakaway_shots: int("glbrkshots"),
        breakaway_save_pct: float("glbrksavepct"),
        penalty_shot_saves: int("glpensaves"),
        penalty_shots_against: int("glpenshots"),
        penalty_shot_save_pct: float("glpensavepct"),
        poke_checks: int("glpokechecks"),
        desperation_saves: int("gldsaves"),
        gl_pk_clear_zone: int("glpkclearzone"),
        shutouts: int("glso"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_payload() -> MatchPayload {
        MatchPayload::from_value(json!({
            "matchId": "900100",
            "timestamp": 1752105600,
            "clubs": {
                "5511": {"goals": "4", "teamSide": "1"},
                "6622": {"goals": "2", "teamSide": "0"},
            },
            "players": {
                "5511": {
                    "1001": {
                        "playername": "slapshot",
                        "skgoals": "2",
                        "skassists": "1",
                        "skpasspct": "78.5",
                        "skplusmin": "-1",
                        "player_dnf": "0",
                        "position": "center",
                        "toiseconds": "not a number",
                    },
                },
                "6622": {
                    "2002": {"glsaves": "18", "glshots": "22", "glsavepct": "81.8"},
                },
            },
        }))
        .expect("sample payload should parse")
    }

    #[test]
    fn coercion_turns_garbage_into_null() {
        assert_eq!(opt_i32(&json!("12")), Some(12));
        assert_eq!(opt_i32(&json!("")), None);
        assert_eq!(opt_i32(&json!({})), None);
        assert_eq!(opt_f64(&json!("81.8")), Some(81.8));
        assert_eq!(opt_f64(&json!([])), None);
        assert_eq!(opt_bool(&json!("1")), Some(true));
        assert_eq!(opt_bool(&json!(0)), Some(false));
        assert_eq!(opt_bool(&json!("true")), Some(true));
        assert_eq!(opt_bool(&json!("maybe")), None);
    }

    #[test]
    fn match_row_stores_fetching_club_perspective() {
        let payload = sample_payload();
        let now = Utc::now().naive_utc();
        let row = match_row(None, 5511, &payload, now);

        assert_eq!(row.external_match_id, "900100");
        assert_eq!(row.external_timestamp, 1752105600);
        // Fetching club was teamSide 1, so it is the away club.
        assert_eq!(row.is_home, Some(false));
        assert_eq!(row.home_club_external_id, Some(6622));
        assert_eq!(row.away_club_external_id, Some(5511));
        assert_eq!(row.home_score, Some(2));
        assert_eq!(row.away_score, Some(4));
        assert_eq!(row.winning_club_external_id, Some(5511));
    }

    #[test]
    fn match_row_without_team_side_leaves_is_home_null() {
        let payload = MatchPayload::from_value(json!({
            "matchId": "900101",
            "timestamp": 1752105700,
            "clubs": {
                "5511": {"goals": "3"},
                "6622": {"goals": "3"},
            },
        }))
        .unwrap();
        let row = match_row(None, 5511, &payload, Utc::now().naive_utc());

        assert_eq!(row.is_home, None);
        assert_eq!(row.home_club_external_id, Some(5511));
        assert_eq!(row.away_club_external_id, Some(6622));
        // Tied score means no winner attribution.
        assert_eq!(row.winning_club_external_id, None);
    }

    #[test]
    fn stats_rows_cover_both_teams_with_lenient_coercion() {
        let payload = sample_payload();
        let mut rows = stats_rows(&payload);
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(rows.len(), 2);

        let (player_id, gamertag, skater) = &rows[0];
        assert_eq!(player_id, "1001");
        assert_eq!(gamertag, "slapshot");
        assert_eq!(skater.goals, Some(2));
        assert_eq!(skater.assists, Some(1));
        assert_eq!(skater.pass_pct, Some(78.5));
        assert_eq!(skater.plus_minus, Some(-1));
        assert_eq!(skater.player_dnf, Some(false));
        assert_eq!(skater.position.as_deref(), Some("center"));
        // Unparseable value becomes null, never an error.
        assert_eq!(skater.toi_seconds, None);
        assert_eq!(skater.saves, None);

        let (player_id, gamertag, goalie) = &rows[1];
        assert_eq!(player_id, "2002");
        // No playername in the payload, so the external id stands in.
        assert_eq!(gamertag, "2002");
        assert_eq!(goalie.saves, Some(18));
        assert_eq!(goalie.shots_against, Some(22));
        assert_eq!(goalie.save_pct, Some(81.8));
        assert_eq!(goalie.goals, None);
    }
}
