use crate::circuit_breaker::{BreakerConfig, BreakerSet, CircuitState};
use crate::error::ProviderError;
use crate::models::GamePhase;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const ESPN_BASE_URL: &str = "http://site.api.espn.com/apis/site/v2/sports";

/// Games that started longer ago than this are considered over and skipped
const RECENT_GAME_WINDOW_HOURS: i64 = 6;

#[derive(Clone)]
pub struct EspnClient {
    client: Client,
    base_url: String,
    breakers: Arc<BreakerSet>,
}

impl std::fmt::Debug for EspnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspnClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// One side of an ESPN competition. `score` is `None` when the payload
/// carries no readable score (normal before kickoff).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Competitor {
    pub team_id: String,
    pub score: Option<u16>,
}

/// An event from a team schedule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EspnEvent {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub phase: GamePhase,
    pub detail: Option<String>,
    pub competitors: Vec<Competitor>,
}

/// State of a single game from the summary endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EspnSummary {
    /// "Away at Home" when both display names are present
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub phase: GamePhase,
    pub detail: Option<String>,
    pub competitors: Vec<Competitor>,
    pub last_scoring_play: Option<String>,
}

/// Breaker scope for one team's feed
fn feed_scope(sport_path: &str, team_id: &str) -> String {
    format!("{}/{}", sport_path, team_id)
}

impl EspnClient {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_base_url(ESPN_BASE_URL, config)
    }

    pub fn with_base_url(base_url: &str, config: BreakerConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            breakers: Arc::new(BreakerSet::new(config)),
        }
    }

    /// Breaker state of one team's feed
    pub fn breaker_state(&self, sport_path: &str, team_id: &str) -> CircuitState {
        self.breakers.state(&feed_scope(sport_path, team_id))
    }

    /// Next relevant event on a team's schedule (see [`select_schedule_event`])
    pub async fn get_next_event(
        &self,
        sport_path: &str,
        team_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<EspnEvent>, ProviderError> {
        let url = format!(
            "{}/{}/teams/{}/schedule",
            self.base_url, sport_path, team_id
        );
        let data = self.get_json(&feed_scope(sport_path, team_id), &url).await?;
        select_schedule_event(&data, now)
    }

    /// Summary of one game, fetched on behalf of `team_id`'s feed
    pub async fn get_summary(
        &self,
        sport_path: &str,
        team_id: &str,
        event_id: &str,
    ) -> Result<EspnSummary, ProviderError> {
        let url = format!("{}/{}/summary?event={}", self.base_url, sport_path, event_id);
        let data = self.get_json(&feed_scope(sport_path, team_id), &url).await?;
        parse_summary(&data)
    }

    async fn get_json(&self, scope: &str, url: &str) -> Result<Value, ProviderError> {
        let breaker = self.breakers.get(scope);
        let result = breaker
            .call(|| async {
                let resp = self.client.get(url).send().await?.error_for_status()?;
                resp.json::<Value>().await
            })
            .await;

        match result {
            Some(Ok(data)) => Ok(data),
            Some(Err(e)) => Err(ProviderError::Http(e)),
            None => Err(ProviderError::CircuitOpen(scope.to_string())),
        }
    }
}

/// Pick the first schedule event that started less than six hours ago or
/// lies in the future. Events without competitions or with an unreadable
/// date are skipped.
pub fn select_schedule_event(
    data: &Value,
    now: DateTime<Utc>,
) -> Result<Option<EspnEvent>, ProviderError> {
    let events = data["events"]
        .as_array()
        .ok_or_else(|| ProviderError::Parse("schedule has no events array".to_string()))?;
    let cutoff = now - ChronoDuration::hours(RECENT_GAME_WINDOW_HOURS);

    for event in events {
        let Some(date) = event["date"].as_str().and_then(parse_espn_date) else {
            continue;
        };
        let competition = &event["competitions"][0];
        if competition.is_null() {
            continue;
        }

        if date > cutoff {
            let (phase, detail) = parse_status(&competition["status"]);
            return Ok(Some(EspnEvent {
                id: json_string(&event["id"]).unwrap_or_default(),
                name: event["name"]
                    .as_str()
                    .unwrap_or("Unknown Game")
                    .to_string(),
                date,
                phase,
                detail,
                competitors: parse_competitors(&competition["competitors"]),
            }));
        }
    }

    Ok(None)
}

pub fn parse_summary(data: &Value) -> Result<EspnSummary, ProviderError> {
    let competition = &data["header"]["competitions"][0];
    if competition.is_null() {
        return Err(ProviderError::Parse(
            "summary has no competition data".to_string(),
        ));
    }

    let (phase, detail) = parse_status(&competition["status"]);
    let last_scoring_play = data["scoringPlays"]
        .as_array()
        .and_then(|plays| plays.last())
        .and_then(|play| json_string(&play["id"]));

    Ok(EspnSummary {
        name: matchup_name(&competition["competitors"]),
        date: competition["date"].as_str().and_then(parse_espn_date),
        phase,
        detail,
        competitors: parse_competitors(&competition["competitors"]),
        last_scoring_play,
    })
}

fn parse_status(status: &Value) -> (GamePhase, Option<String>) {
    let status_type = &status["type"];
    let completed = status_type["completed"].as_bool().unwrap_or(false);
    let state = status_type["state"].as_str().unwrap_or("pre");

    let phase = if completed || state == "post" {
        GamePhase::Final
    } else if state == "in" {
        GamePhase::InProgress
    } else {
        GamePhase::Scheduled
    };

    let detail = status_type["detail"]
        .as_str()
        .or_else(|| status_type["shortDetail"].as_str())
        .map(str::to_string);

    (phase, detail)
}

fn parse_competitors(competitors: &Value) -> Vec<Competitor> {
    competitors
        .as_array()
        .map(|comps| {
            comps
                .iter()
                .filter_map(|comp| {
                    let team_id =
                        json_string(&comp["id"]).or_else(|| json_string(&comp["team"]["id"]))?;
                    Some(Competitor {
                        team_id,
                        score: parse_score(&comp["score"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Scores come as "14" in summaries and as {"value": 14.0, "displayValue": "14"}
/// in schedules. Anything else is unreadable.
fn parse_score(score: &Value) -> Option<u16> {
    match score {
        Value::String(s) => s.trim().parse::<u16>().ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        Value::Object(_) => score["value"]
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u16::MAX))
            .map(|v| v as u16)
            .or_else(|| score["displayValue"].as_str()?.trim().parse().ok()),
        _ => None,
    }
}

fn matchup_name(competitors: &Value) -> Option<String> {
    let side = |home_away: &str| {
        competitors
            .as_array()?
            .iter()
            .find(|c| c["homeAway"].as_str() == Some(home_away))?["team"]["displayName"]
            .as_str()
            .map(str::to_string)
    };
    Some(format!("{} at {}", side("away")?, side("home")?))
}

/// ESPN ids are sometimes strings and sometimes numbers
fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// ESPN dates look like "2025-09-07T17:00Z" (no seconds), which RFC 3339
/// parsing rejects, so fall back to the short form.
fn parse_espn_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%MZ")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
