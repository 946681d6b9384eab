use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};
use miette::Diagnostic;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://proclubs.ea.com/api/nhl";

// The upstream API rejects requests with a default reqwest User-Agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(5);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Diagnostic)]
pub enum UpstreamError {
    #[error("error building upstream request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("network error executing upstream request")]
    Network(#[source] reqwest::Error),

    #[error("upstream rate limited the request")]
    RateLimited,

    #[error("upstream reported a server error ({0})")]
    ServerError(StatusCode),

    #[error("upstream rejected the request ({0})")]
    Permanent(StatusCode),

    #[error("error deserializing upstream response")]
    Decode(#[source] serde_json::Error),
}

impl UpstreamError {
    /// True for errors where retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Network(_) | UpstreamError::RateLimited | UpstreamError::ServerError(_)
        )
    }
}

/// One match as returned by the upstream match listing, with the fields the
/// ingest pipeline needs pulled out and the full payload retained for
/// archival.
#[derive(Debug, Clone)]
pub struct MatchPayload {
    pub match_id: String,
    pub timestamp: i64,
    /// External club id (as a string key) -> per-club stats object.
    pub clubs: HashMap<String, Value>,
    /// External club id -> external player id -> per-player stats object.
    pub players: HashMap<String, HashMap<String, Value>>,
    pub aggregate: Option<Value>,
    pub raw: Value,
}

impl MatchPayload {
    /// Leniently extracts a payload from one element of the match list.
    /// Returns `None` when the element has no usable match id or timestamp,
    /// since without the dedup key the match cannot be stored.
    pub fn from_value(raw: Value) -> Option<Self> {
        let match_id = match raw.get("matchId") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };
        let timestamp = raw.get("timestamp").and_then(value_as_i64)?;

        let clubs = raw
            .get("clubs")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(club_id, stats)| (club_id.clone(), stats.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let players = raw
            .get("players")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(club_id, club_players)| {
                        let club_players = club_players
                            .as_object()
                            .map(|players| {
                                players
                                    .iter()
                                    .map(|(player_id, stats)| (player_id.clone(), stats.clone()))
                                    .collect()
                            })
                            .unwrap_or_default();
                        (club_id.clone(), club_players)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let aggregate = raw.get("aggregate").cloned();

        Some(Self {
            match_id,
            timestamp,
            clubs,
            players,
            aggregate,
            raw,
        })
    }
}

/// Accepts both JSON numbers and numeric strings. The upstream encodes most
/// numbers as strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct ProclubsClient {
    client: reqwest::Client,
    base_url: String,
    // Club name resolution is stable, so one successful lookup serves the
    // whole process lifetime.
    resolve_cache: Mutex<HashMap<(String, String), i64>>,
}

impl ProclubsClient {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::RequestBuild)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            resolve_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves a club's external numeric id from its display name. Returns
    /// `Ok(None)` when the search comes back empty or unreadable.
    pub async fn resolve_club(
        &self,
        name: &str,
        platform: &str,
    ) -> Result<Option<i64>, UpstreamError> {
        let cache_key = (name.to_string(), platform.to_string());
        {
            let cache = self.resolve_cache.lock().expect("resolve cache poisoned");
            if let Some(club_id) = cache.get(&cache_key) {
                return Ok(Some(*club_id));
            }
        }

        let url = format!("{}/clubs/search", self.base_url);
        let body = self
            .get_with_retry(
                &url,
                &[
                    ("clubName", name),
                    ("platform", platform),
                    ("maxResultCount", "5"),
                ],
            )
            .await?;

        let parsed: Value = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Unreadable club search response for {name:?}, treating as no match: {err}");
                return Ok(None);
            }
        };

        let club_id = parsed
            .as_array()
            .and_then(|results| results.first())
            .and_then(|club| club.get("clubId"))
            .and_then(value_as_i64);

        if let Some(club_id) = club_id {
            let mut cache = self.resolve_cache.lock().expect("resolve cache poisoned");
            cache.insert(cache_key, club_id);
        }

        Ok(club_id)
    }

    /// Fetches the most recent private club matches for one club. The
    /// upstream returns a bounded window of recent matches; there is no
    /// pagination of older data. Malformed bodies yield an empty list.
    pub async fn list_matches(
        &self,
        club_id: i64,
        platform: &str,
    ) -> Result<Vec<MatchPayload>, UpstreamError> {
        let url = format!("{}/clubs/matches", self.base_url);
        let club_id = club_id.to_string();
        let body = self
            .get_with_retry(
                &url,
                &[
                    ("matchType", "club_private"),
                    ("platform", platform),
                    ("clubIds", &club_id),
                ],
            )
            .await?;

        let parsed: Value = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Unreadable match list for club {club_id}, treating as empty: {err}");
                return Ok(Vec::new());
            }
        };

        let Some(entries) = parsed.as_array() else {
            warn!("Match list for club {club_id} was not an array, treating as empty");
            return Ok(Vec::new());
        };

        let mut matches = Vec::with_capacity(entries.len());
        for entry in entries {
            match MatchPayload::from_value(entry.clone()) {
                Some(payload) => matches.push(payload),
                None => warn!("Skipping match entry without id or timestamp for club {club_id}"),
            }
        }

        Ok(matches)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, query).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    let base_delay = match &err {
                        UpstreamError::Network(_) | UpstreamError::ServerError(_) => {
                            RETRY_BASE_DELAY
                        }
                        UpstreamError::RateLimited => RATE_LIMIT_BASE_DELAY,
                        _ => return Err(err),
                    };
                    if attempt >= MAX_RETRIES {
                        return Err(err);
                    }
                    let delay = retry_delay(base_delay, attempt);
                    attempt += 1;
                    debug!(
                        "Upstream request to {url} failed ({err}), retry {attempt}/{MAX_RETRIES} \
                        in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn get_once(&self, url: &str, query: &[(&str, &str)]) -> Result<String, UpstreamError> {
        let request = self
            .client
            .get(url)
            .query(query)
            .build()
            .map_err(UpstreamError::RequestBuild)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(UpstreamError::Network)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited);
        }
        if status.is_server_error() {
            return Err(UpstreamError::ServerError(status));
        }
        if !status.is_success() {
            return Err(UpstreamError::Permanent(status));
        }

        response.text().await.map_err(UpstreamError::Network)
    }
}

fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_from_complete_entry() {
        let raw = json!({
            "matchId": "772211445566",
            "timestamp": 1752105600,
            "clubs": {
                "5511": {"goals": "4", "teamSide": "0"},
                "6622": {"goals": "2", "teamSide": "1"},
            },
            "players": {
                "5511": {"1001": {"playername": "slapshot", "skgoals": "2"}},
                "6622": {"1002": {"playername": "brickwall", "glsaves": "18"}},
            },
            "aggregate": {"5511": {}},
        });

        let payload = MatchPayload::from_value(raw).expect("payload should parse");
        assert_eq!(payload.match_id, "772211445566");
        assert_eq!(payload.timestamp, 1752105600);
        assert_eq!(payload.clubs.len(), 2);
        assert_eq!(payload.players["5511"]["1001"]["playername"], "slapshot");
        assert!(payload.aggregate.is_some());
    }

    #[test]
    fn payload_accepts_numeric_match_id() {
        let raw = json!({"matchId": 772211, "timestamp": "1752105600"});
        let payload = MatchPayload::from_value(raw).expect("payload should parse");
        assert_eq!(payload.match_id, "772211");
        assert_eq!(payload.timestamp, 1752105600);
        assert!(payload.clubs.is_empty());
        assert!(payload.players.is_empty());
    }

    #[test]
    fn payload_without_dedup_key_is_rejected() {
        assert!(MatchPayload::from_value(json!({"timestamp": 1752105600})).is_none());
        assert!(MatchPayload::from_value(json!({"matchId": "1"})).is_none());
        assert!(MatchPayload::from_value(json!({"matchId": "1", "timestamp": "soon"})).is_none());
    }

    #[test]
    fn lenient_i64_coercion() {
        assert_eq!(value_as_i64(&json!(42)), Some(42));
        assert_eq!(value_as_i64(&json!("42")), Some(42));
        assert_eq!(value_as_i64(&json!(" 42 ")), Some(42));
        assert_eq!(value_as_i64(&json!(42.9)), Some(42));
        assert_eq!(value_as_i64(&json!("n/a")), None);
        assert_eq!(value_as_i64(&json!(null)), None);
    }

    #[test]
    fn retry_delay_backs_off_exponentially_with_cap() {
        assert_eq!(retry_delay(Duration::from_secs(1), 0), Duration::from_secs(1));
        assert_eq!(retry_delay(Duration::from_secs(1), 1), Duration::from_secs(2));
        assert_eq!(retry_delay(Duration::from_secs(1), 2), Duration::from_secs(4));
        assert_eq!(retry_delay(Duration::from_secs(5), 1), Duration::from_secs(10));
        assert_eq!(retry_delay(Duration::from_secs(5), 10), MAX_RETRY_DELAY);
    }
}
