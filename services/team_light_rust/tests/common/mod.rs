//! Deterministic fakes for the provider and light seams

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gamelight_core::devices::LightDevice;
use gamelight_core::error::{DeviceError, ProviderError};
use gamelight_core::models::{GamePhase, GameSnapshot, Hsv, LightState, Score};
use gamelight_core::providers::{GameStateProvider, TeamQuery};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use team_light_rust::{FlashConfig, TeamConfig};

pub const TEAM_COLOR: Hsv = Hsv::new(280, 100, 100);

/// Pre-game light used across tests: hue 40, sat 60, brightness 70, on
pub const ORIGINAL_LIGHT: LightState = LightState {
    on: true,
    hue: 40,
    saturation: 60,
    brightness: 70,
    color_temp: 0,
};

pub fn team(label: &str, flash_count: u32) -> Arc<TeamConfig> {
    Arc::new(TeamConfig {
        label: label.to_string(),
        name: format!("{} Team", label),
        query: TeamQuery {
            team_id: "33".to_string(),
            sport_path: "football/nfl".to_string(),
        },
        color: TEAM_COLOR,
        device: "fake-bulb".to_string(),
        poll_interval: Duration::from_secs(1),
        live_poll_interval: Duration::from_secs(30),
        lead_window: chrono::Duration::minutes(5),
        flash: FlashConfig {
            color: None,
            count: flash_count,
            on_duration: Duration::ZERO,
            off_duration: Duration::ZERO,
        },
    })
}

pub fn game(
    phase: GamePhase,
    start_time: DateTime<Utc>,
    team_score: u16,
    opponent_score: u16,
) -> GameSnapshot {
    GameSnapshot {
        game_id: "401772".to_string(),
        name: "Browns at Ravens".to_string(),
        phase,
        score: Score::new(team_score, opponent_score),
        start_time,
        last_scoring_play: None,
        detail: None,
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Game(Option<GameSnapshot>),
    Fail,
}

/// Replays a script of responses; the last one repeats once the script runs out.
/// Schedule fetches and fetches of a followed game share the script.
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub fetches: AtomicUsize,
    followed: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Game ids requested through `fetch_game`, in order
    pub fn followed(&self) -> Vec<String> {
        self.followed.lock().unwrap().clone()
    }

    fn next_step(&self) -> Result<Option<GameSnapshot>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(step) = steps.pop_front() {
                *last = Some(step);
            }
            last.clone().unwrap_or(Step::Game(None))
        };

        match step {
            Step::Game(snapshot) => Ok(snapshot),
            Step::Fail => Err(ProviderError::Parse("scripted failure".to_string())),
        }
    }
}

#[async_trait]
impl GameStateProvider for ScriptedProvider {
    async fn fetch(&self, _query: &TeamQuery) -> Result<Option<GameSnapshot>, ProviderError> {
        self.next_step()
    }

    async fn fetch_game(
        &self,
        _query: &TeamQuery,
        game_id: &str,
    ) -> Result<Option<GameSnapshot>, ProviderError> {
        self.followed.lock().unwrap().push(game_id.to_string());
        self.next_step()
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Provider whose every fetch panics
#[derive(Default)]
pub struct PanickingProvider {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl GameStateProvider for PanickingProvider {
    async fn fetch(&self, _query: &TeamQuery) -> Result<Option<GameSnapshot>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        panic!("provider exploded");
    }

    async fn fetch_game(
        &self,
        _query: &TeamQuery,
        _game_id: &str,
    ) -> Result<Option<GameSnapshot>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        panic!("provider exploded");
    }

    fn provider_name(&self) -> &str {
        "panicking"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Get,
    Set(LightState),
}

/// In-memory light that records every call
pub struct FakeLight {
    state: Mutex<LightState>,
    calls: Mutex<Vec<DeviceCall>>,
    /// Fail this many upcoming reads
    pub fail_gets: AtomicUsize,
    /// Fail this many upcoming writes
    pub fail_sets: AtomicUsize,
    /// Fail the write with this zero-based index (counting every write)
    pub fail_set_index: Mutex<Option<usize>>,
    pub offline: AtomicBool,
    sets_seen: AtomicUsize,
}

impl FakeLight {
    pub fn new(initial: LightState) -> Self {
        Self {
            state: Mutex::new(initial),
            calls: Mutex::new(Vec::new()),
            fail_gets: AtomicUsize::new(0),
            fail_sets: AtomicUsize::new(0),
            fail_set_index: Mutex::new(None),
            offline: AtomicBool::new(false),
            sets_seen: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> LightState {
        *self.state.lock().unwrap()
    }

    /// Change the light behind the session's back
    pub fn set_externally(&self, state: LightState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn gets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Get))
            .count()
    }

    pub fn sets(&self) -> Vec<LightState> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Set(state) => Some(state),
                DeviceCall::Get => None,
            })
            .collect()
    }

    fn unreachable() -> DeviceError {
        DeviceError::Unreachable {
            host: "fake-bulb".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "offline"),
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LightDevice for FakeLight {
    async fn get_state(&self) -> Result<LightState, DeviceError> {
        self.calls.lock().unwrap().push(DeviceCall::Get);
        if self.offline.load(Ordering::SeqCst) || Self::take_failure(&self.fail_gets) {
            return Err(Self::unreachable());
        }
        Ok(self.current())
    }

    async fn set_state(&self, state: &LightState) -> Result<(), DeviceError> {
        self.calls.lock().unwrap().push(DeviceCall::Set(*state));
        let index = self.sets_seen.fetch_add(1, Ordering::SeqCst);
        let scheduled_failure = *self.fail_set_index.lock().unwrap() == Some(index);
        if self.offline.load(Ordering::SeqCst)
            || scheduled_failure
            || Self::take_failure(&self.fail_sets)
        {
            return Err(Self::unreachable());
        }
        *self.state.lock().unwrap() = *state;
        Ok(())
    }

    fn address(&self) -> &str {
        "fake-bulb"
    }
}
