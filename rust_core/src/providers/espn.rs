//! ESPN game state provider
//!
//! Uses the team schedule to find the relevant game, then the game summary
//! for a fresh score once the game has started (schedule scores lag). A game
//! already being followed is read from its summary alone.

use super::{GameStateProvider, TeamQuery};
use crate::clients::espn::{Competitor, EspnClient, EspnEvent, EspnSummary};
use crate::error::ProviderError;
use crate::models::{GamePhase, GameSnapshot, Score};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

pub struct EspnGameProvider {
    client: EspnClient,
}

impl EspnGameProvider {
    pub fn new(client: EspnClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &EspnClient {
        &self.client
    }
}

#[async_trait]
impl GameStateProvider for EspnGameProvider {
    async fn fetch(&self, query: &TeamQuery) -> Result<Option<GameSnapshot>, ProviderError> {
        let Some(event) = self
            .client
            .get_next_event(&query.sport_path, &query.team_id, Utc::now())
            .await?
        else {
            return Ok(None);
        };

        let summary = if event.phase == GamePhase::Scheduled {
            None
        } else {
            debug!(game_id = %event.id, "Fetching ESPN summary");
            Some(
                self.client
                    .get_summary(&query.sport_path, &query.team_id, &event.id)
                    .await?,
            )
        };

        to_snapshot(event, summary, &query.team_id).map(Some)
    }

    async fn fetch_game(
        &self,
        query: &TeamQuery,
        game_id: &str,
    ) -> Result<Option<GameSnapshot>, ProviderError> {
        let summary = self
            .client
            .get_summary(&query.sport_path, &query.team_id, game_id)
            .await?;
        summary_snapshot(game_id, summary, &query.team_id).map(Some)
    }

    fn provider_name(&self) -> &str {
        "ESPN"
    }
}

/// Normalize a schedule event (plus summary when the game has started)
pub(crate) fn to_snapshot(
    event: EspnEvent,
    summary: Option<EspnSummary>,
    team_id: &str,
) -> Result<GameSnapshot, ProviderError> {
    let (phase, detail, competitors, last_scoring_play) = match summary {
        Some(s) => (s.phase, s.detail, s.competitors, s.last_scoring_play),
        None => (event.phase, event.detail, event.competitors, None),
    };
    let score = resolve_score(&competitors, team_id, phase, &event.id)?;

    Ok(GameSnapshot {
        game_id: event.id,
        name: event.name,
        phase,
        score,
        start_time: event.date,
        last_scoring_play,
        detail,
    })
}

/// Normalize a summary fetched by game id
pub(crate) fn summary_snapshot(
    game_id: &str,
    summary: EspnSummary,
    team_id: &str,
) -> Result<GameSnapshot, ProviderError> {
    let start_time = summary
        .date
        .ok_or_else(|| ProviderError::Parse(format!("summary of game {} has no date", game_id)))?;
    let score = resolve_score(&summary.competitors, team_id, summary.phase, game_id)?;

    Ok(GameSnapshot {
        game_id: game_id.to_string(),
        name: summary.name.unwrap_or_else(|| format!("Game {}", game_id)),
        phase: summary.phase,
        score,
        start_time,
        last_scoring_play: summary.last_scoring_play,
        detail: summary.detail,
    })
}

/// Before kickoff the score is 0-0 whatever the payload says. Once the game
/// has started both scores must be readable.
fn resolve_score(
    competitors: &[Competitor],
    team_id: &str,
    phase: GamePhase,
    game_id: &str,
) -> Result<Score, ProviderError> {
    if phase == GamePhase::Scheduled {
        return Ok(Score::default());
    }

    team_score(competitors, team_id).ok_or_else(|| {
        ProviderError::Parse(format!(
            "no readable score for team {} in game {}",
            team_id, game_id
        ))
    })
}

fn team_score(competitors: &[Competitor], team_id: &str) -> Option<Score> {
    let team = competitors.iter().find(|c| c.team_id == team_id)?;
    let opponent = competitors.iter().find(|c| c.team_id != team_id)?;
    Some(Score::new(team.score?, opponent.score?))
}
