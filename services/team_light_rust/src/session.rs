//! Per-team game session
//!
//! A `TeamSession` polls one team's game and reconciles the light with it:
//!
//! ```text
//! Idle --(scheduled, inside lead window)--> PreGame --(in progress)--> Live
//!   ^                                                                   |
//!   +------------(pre-game light restored)------- Final <--(final)------+
//! ```
//!
//! The light state found before the team color is first applied is saved and
//! put back when the game ends. It is captured once per game and only cleared
//! after the restore succeeds, so a new game can never overwrite it.

use crate::config::TeamConfig;
use chrono::{DateTime, Utc};
use gamelight_core::devices::LightDevice;
use gamelight_core::error::DeviceError;
use gamelight_core::models::{GamePhase, GameSnapshot, LightState, Score};
use gamelight_core::providers::GameStateProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Never poll faster than this, even right before a lead window opens
const MIN_POLL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No tracked game yet, or the last one has been cleaned up
    #[default]
    Idle,
    /// Team color is (being) applied, waiting for kickoff
    PreGame,
    /// Game in progress, watching for score changes
    Live,
    /// Game over, pre-game light not yet restored
    Final,
}

/// What a session remembers between ticks
#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    pub phase: SessionPhase,
    pub last_snapshot: Option<GameSnapshot>,
    /// Game followed from pre-game until restoration
    pub tracked_game: Option<String>,
    pub last_score: Option<Score>,
    /// Light state captured right before the team color was first applied
    pub saved_state: Option<LightState>,
    /// Team color is on the light for the tracked game
    pub color_applied: bool,
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetch failed; nothing changed
    Skipped,
    /// Nothing to do this tick
    NoAction,
    /// Baseline captured (if needed) and team color set
    ColorApplied,
    /// A device call failed; the same action is retried next tick
    DevicePending,
    /// Flashed for the new score
    Flashed(Score),
    /// Score recorded, but the flash did not complete
    FlashFailed(Score),
    Restored,
}

pub struct TeamSession {
    team: Arc<TeamConfig>,
    provider: Arc<dyn GameStateProvider>,
    device: Arc<dyn LightDevice>,
    memory: SessionMemory,
}

impl TeamSession {
    pub fn new(
        team: Arc<TeamConfig>,
        provider: Arc<dyn GameStateProvider>,
        device: Arc<dyn LightDevice>,
    ) -> Self {
        Self {
            team,
            provider,
            device,
            memory: SessionMemory::default(),
        }
    }

    pub fn team(&self) -> &TeamConfig {
        &self.team
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn phase(&self) -> SessionPhase {
        self.memory.phase
    }

    pub async fn tick(&mut self) -> TickOutcome {
        self.tick_at(Utc::now()).await
    }

    /// Run one poll with `now` as the current time
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let fetched = match (self.memory.phase, self.memory.tracked_game.as_deref()) {
            (SessionPhase::PreGame | SessionPhase::Live, Some(game_id)) => {
                self.provider.fetch_game(&self.team.query, game_id).await
            }
            _ => self.provider.fetch(&self.team.query).await,
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot.filter(|game| !self.is_foreign(game)),
            Err(e) => {
                warn!(
                    "{} fetch failed, skipping tick: {}",
                    self.provider.provider_name(),
                    e
                );
                return TickOutcome::Skipped;
            }
        };

        let outcome = match self.memory.phase {
            SessionPhase::Idle => self.on_idle(snapshot.as_ref(), now).await,
            SessionPhase::PreGame => self.on_pre_game(snapshot.as_ref()).await,
            SessionPhase::Live => self.on_live(snapshot.as_ref()).await,
            SessionPhase::Final => self.restore().await,
        };

        if snapshot.is_some() {
            self.memory.last_snapshot = snapshot;
        }
        outcome
    }

    /// A snapshot of some other game while one is being followed
    fn is_foreign(&self, game: &GameSnapshot) -> bool {
        let following = matches!(self.memory.phase, SessionPhase::PreGame | SessionPhase::Live);
        match self.memory.tracked_game.as_deref() {
            Some(tracked) if following && tracked != game.game_id => {
                warn!(
                    "Ignoring {} ({}) while following game {}",
                    game.name, game.game_id, tracked
                );
                true
            }
            _ => false,
        }
    }

    /// Delay before the next tick.
    ///
    /// From pre-game until restoration the live interval is used. While idle
    /// the normal interval is used, cut short so the session wakes when the
    /// next game's lead window opens.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self.memory.phase {
            SessionPhase::PreGame | SessionPhase::Live | SessionPhase::Final => {
                self.team.live_poll_interval
            }
            SessionPhase::Idle => {
                let until_window = self
                    .memory
                    .last_snapshot
                    .as_ref()
                    .filter(|game| game.phase == GamePhase::Scheduled)
                    .and_then(|game| game.start_time.checked_sub_signed(self.team.lead_window))
                    .map(|opens| (opens - now).to_std().unwrap_or(MIN_POLL_DELAY));

                match until_window {
                    Some(wait) => wait.clamp(MIN_POLL_DELAY, self.team.poll_interval),
                    None => self.team.poll_interval,
                }
            }
        }
    }

    async fn on_idle(&mut self, snapshot: Option<&GameSnapshot>, now: DateTime<Utc>) -> TickOutcome {
        let Some(game) = snapshot else {
            debug!("No upcoming games found");
            return TickOutcome::NoAction;
        };

        match game.phase {
            GamePhase::Scheduled if game.starts_within(now, self.team.lead_window) => {
                info!("Game time for {}! Kickoff at {} UTC", game.name, game.start_time);
                self.memory.phase = SessionPhase::PreGame;
                self.memory.tracked_game = Some(game.game_id.clone());
                self.memory.last_score = Some(game.score);
                self.ensure_team_color().await
            }
            GamePhase::Scheduled => {
                debug!("Next game {} at {} UTC", game.name, game.start_time);
                TickOutcome::NoAction
            }
            GamePhase::InProgress => {
                // Started mid-game: show the color but don't flash points already on the board
                info!("{} already in progress ({}), applying team color", game.name, game.score);
                self.memory.phase = SessionPhase::Live;
                self.memory.tracked_game = Some(game.game_id.clone());
                self.memory.last_score = Some(game.score);
                self.ensure_team_color().await
            }
            GamePhase::Final => {
                debug!("Most recent game {} is final, skipping", game.name);
                TickOutcome::NoAction
            }
        }
    }

    async fn on_pre_game(&mut self, snapshot: Option<&GameSnapshot>) -> TickOutcome {
        match snapshot {
            Some(game) if game.phase == GamePhase::InProgress => {
                info!("{} has started", game.name);
                self.memory.phase = SessionPhase::Live;
                self.on_live(snapshot).await
            }
            Some(game) if game.phase == GamePhase::Final => {
                info!("{} is final", game.name);
                self.memory.phase = SessionPhase::Final;
                self.restore().await
            }
            Some(game) => {
                // Still scheduled, possibly with a new start time after a delay
                self.memory.last_score = Some(game.score);
                self.ensure_team_color().await
            }
            None => self.ensure_team_color().await,
        }
    }

    async fn on_live(&mut self, snapshot: Option<&GameSnapshot>) -> TickOutcome {
        let Some(game) = snapshot else {
            return TickOutcome::NoAction;
        };

        let mut outcome = self.ensure_team_color().await;

        match self.memory.last_score {
            Some(last) if last != game.score => {
                info!("Score change {} -> {} in {}", last, game.score, game.name);
                outcome = self.flash(game.score).await;
            }
            Some(_) => {}
            None => self.memory.last_score = Some(game.score),
        }

        if game.phase == GamePhase::Final {
            info!("{} is final ({})", game.name, game.score);
            self.memory.phase = SessionPhase::Final;
            outcome = self.restore().await;
        } else {
            debug!(
                "{}: {}, score {}",
                game.name,
                game.detail.as_deref().unwrap_or("In Progress"),
                game.score
            );
        }

        outcome
    }

    /// Capture the pre-game baseline (once) and apply the team color.
    ///
    /// The color is never set without a baseline: if the read fails, nothing
    /// is written this tick.
    async fn ensure_team_color(&mut self) -> TickOutcome {
        if self.memory.color_applied {
            return TickOutcome::NoAction;
        }

        if self.memory.saved_state.is_none() {
            match self.device.get_state().await {
                Ok(state) => {
                    debug!("Captured pre-game light state {:?}", state);
                    self.memory.saved_state = Some(state);
                }
                Err(e) => {
                    warn!(
                        "Could not read light at {}, will retry: {}",
                        self.device.address(),
                        e
                    );
                    return TickOutcome::DevicePending;
                }
            }
        }

        match self.device.set_state(&LightState::from_hsv(self.team.color)).await {
            Ok(()) => {
                info!("Set light at {} to team color", self.device.address());
                self.memory.color_applied = true;
                TickOutcome::ColorApplied
            }
            Err(e) => {
                warn!("Failed to set team color, will retry: {}", e);
                TickOutcome::DevicePending
            }
        }
    }

    /// Flash for a score change and put the light back the way it was.
    /// The new score is recorded whether or not the flash worked.
    async fn flash(&mut self, score: Score) -> TickOutcome {
        let pre_flash = match self.device.get_state().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not read light before flash: {}", e);
                self.memory.last_score = Some(score);
                return TickOutcome::FlashFailed(score);
            }
        };

        let result = self.run_flash_sequence(&pre_flash).await;
        self.memory.last_score = Some(score);

        match result {
            Ok(()) => TickOutcome::Flashed(score),
            Err(e) => {
                warn!("Error during flash sequence: {}", e);
                if let Err(e) = self.device.set_state(&pre_flash).await {
                    warn!("Could not restore light after failed flash: {}", e);
                }
                TickOutcome::FlashFailed(score)
            }
        }
    }

    /// Alternate between the flash state and `pre_flash`, ending on `pre_flash`
    async fn run_flash_sequence(&self, pre_flash: &LightState) -> Result<(), DeviceError> {
        let flash = &self.team.flash;
        let flash_state = match flash.color {
            Some(color) => LightState::from_hsv(color),
            None => LightState {
                on: false,
                ..*pre_flash
            },
        };

        for i in 0..flash.count {
            self.device.set_state(&flash_state).await?;
            tokio::time::sleep(flash.on_duration).await;
            self.device.set_state(pre_flash).await?;
            if i + 1 < flash.count {
                tokio::time::sleep(flash.off_duration).await;
            }
        }
        Ok(())
    }

    /// Put back the captured pre-game state. Stays in `Final` until this works.
    async fn restore(&mut self) -> TickOutcome {
        let Some(saved) = self.memory.saved_state else {
            info!("No pre-game light state captured, nothing to restore");
            self.reset();
            return TickOutcome::NoAction;
        };

        match self.device.set_state(&saved).await {
            Ok(()) => {
                info!("Game over. Restored pre-game light state at {}", self.device.address());
                self.reset();
                TickOutcome::Restored
            }
            Err(e) => {
                warn!("Failed to restore pre-game light state, will retry: {}", e);
                TickOutcome::DevicePending
            }
        }
    }

    fn reset(&mut self) {
        self.memory.phase = SessionPhase::Idle;
        self.memory.tracked_game = None;
        self.memory.saved_state = None;
        self.memory.color_applied = false;
        self.memory.last_score = None;
    }

    /// Apply the team color, run one flash sequence and put the light back.
    /// Used by `--test-flash`; does not touch session memory.
    pub async fn flash_demo(&self) -> Result<(), DeviceError> {
        let original = self.device.get_state().await?;
        let team_color = LightState::from_hsv(self.team.color);

        self.device.set_state(&team_color).await?;
        let result = self.run_flash_sequence(&team_color).await;
        self.device.set_state(&original).await?;
        result
    }
}
