//! Game state provider abstraction
//!
//! A provider answers one question per poll: what is the current or next
//! game for this team? Sessions only see normalized [`GameSnapshot`]s, so the
//! data source can be swapped or faked in tests.

use crate::error::ProviderError;
use crate::models::GameSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod espn;

pub use espn::EspnGameProvider;

/// Data-source query key for one team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamQuery {
    /// Provider team identifier (ESPN team id)
    pub team_id: String,
    /// League path such as "football/nfl"
    pub sport_path: String,
}

#[async_trait]
pub trait GameStateProvider: Send + Sync {
    /// Fetch the team's current or next game.
    ///
    /// `Ok(None)` means there is no upcoming or recent game. Any network or
    /// parse failure is an error; callers treat it as "no new information".
    async fn fetch(&self, query: &TeamQuery) -> Result<Option<GameSnapshot>, ProviderError>;

    /// Fetch one specific game of the team, regardless of what the schedule
    /// currently considers relevant. `Ok(None)` means the game is gone.
    async fn fetch_game(
        &self,
        query: &TeamQuery,
        game_id: &str,
    ) -> Result<Option<GameSnapshot>, ProviderError>;

    /// Provider name for logging and debugging
    fn provider_name(&self) -> &str;
}
