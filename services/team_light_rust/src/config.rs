//! Configuration constants and environment loading for the team light service
//!
//! Global settings come from environment variables (a `.env` file is loaded
//! by `main`). The team roster comes from the JSON file named by `TEAMS_FILE`,
//! or the built-in roster when unset. Per-team fields left out of the file
//! fall back to the global settings.

use gamelight_core::circuit_breaker::BreakerConfig;
use gamelight_core::error::ConfigError;
use gamelight_core::models::Hsv;
use gamelight_core::providers::TeamQuery;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Default time between polls while no game is live
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 900;

/// Default time between polls from pre-game until restoration
pub const DEFAULT_LIVE_POLL_INTERVAL_SECS: u64 = 30;

/// Default minutes before kickoff to switch to the team color
pub const DEFAULT_PREGAME_LEAD_MINS: u64 = 5;

pub const DEFAULT_FLASH_COUNT: u32 = 6;
pub const DEFAULT_FLASH_ON_MS: u64 = 500;
pub const DEFAULT_FLASH_OFF_MS: u64 = 500;

/// Default socket timeout for bulb requests
pub const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 5;

/// Flashes beyond this are a typo, not a celebration
const MAX_FLASH_COUNT: u32 = 50;

/// Upper bound for the pre-game lead window (one week)
const MAX_LEAD_WINDOW_MINS: u64 = 7 * 24 * 60;

/// Game On: Purple
pub const RAVENS_COLOR: Hsv = Hsv::new(280, 100, 100);

pub const BUCKEYES_COLOR: Hsv = Hsv::new(348, 94, 73);

/// How a scoring flash looks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    /// Color to flash; `None` flashes by switching the light off
    pub color: Option<Hsv>,
    pub count: u32,
    pub on_duration: Duration,
    pub off_duration: Duration,
}

/// Everything one session needs to know about its team. Never mutated.
#[derive(Debug, Clone)]
pub struct TeamConfig {
    pub label: String,
    pub name: String,
    pub query: TeamQuery,
    pub color: Hsv,
    /// Light host, optionally with `:port`
    pub device: String,
    pub poll_interval: Duration,
    pub live_poll_interval: Duration,
    pub lead_window: chrono::Duration,
    pub flash: FlashConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub teams: Vec<TeamConfig>,
    pub device_timeout: Duration,
    pub espn_circuit_breaker: BreakerConfig,
}

/// One entry of the `TEAMS_FILE` roster
#[derive(Debug, Clone, Deserialize)]
pub struct TeamEntry {
    pub label: String,
    pub name: String,
    pub espn_team_id: String,
    pub sport_path: String,
    pub color: Hsv,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub live_poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub lead_window_mins: Option<u64>,
    #[serde(default)]
    pub flash_color: Option<Hsv>,
    #[serde(default)]
    pub flash_count: Option<u32>,
}

/// Built-in roster used when `TEAMS_FILE` is unset
pub fn default_roster() -> Vec<TeamEntry> {
    let entry = |label: &str, name: &str, id: &str, sport_path: &str, color: Hsv| TeamEntry {
        label: label.to_string(),
        name: name.to_string(),
        espn_team_id: id.to_string(),
        sport_path: sport_path.to_string(),
        color,
        device: None,
        poll_interval_secs: None,
        live_poll_interval_secs: None,
        lead_window_mins: None,
        flash_color: None,
        flash_count: None,
    };

    vec![
        entry("RAVENS", "Baltimore Ravens", "33", "football/nfl", RAVENS_COLOR),
        entry(
            "BUCKEYES",
            "Ohio State Buckeyes",
            "194",
            "football/college-football",
            BUCKEYES_COLOR,
        ),
    ]
}

impl Config {
    /// Load configuration from environment variables and the optional roster file
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        let roster = match lookup("TEAMS_FILE") {
            Some(path) => load_roster(&path)?,
            None => default_roster(),
        };
        Self::from_vars(lookup, roster)
    }

    /// Build and validate a configuration from a variable lookup and a roster
    pub fn from_vars<F>(lookup: F, roster: Vec<TeamEntry>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bulb_host = lookup("BULB_HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        let poll_interval_secs =
            parse_var(&lookup, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let live_poll_interval_secs = parse_var(
            &lookup,
            "LIVE_POLL_INTERVAL_SECS",
            DEFAULT_LIVE_POLL_INTERVAL_SECS,
        )?;
        let lead_window = lead_window_from_mins(
            "PREGAME_LEAD_MINS",
            parse_var(&lookup, "PREGAME_LEAD_MINS", DEFAULT_PREGAME_LEAD_MINS)?,
        )?;
        let flash_count = parse_var(&lookup, "FLASH_COUNT", DEFAULT_FLASH_COUNT)?;
        let flash_on = Duration::from_millis(parse_var(&lookup, "FLASH_ON_MS", DEFAULT_FLASH_ON_MS)?);
        let flash_off =
            Duration::from_millis(parse_var(&lookup, "FLASH_OFF_MS", DEFAULT_FLASH_OFF_MS)?);
        let device_timeout = Duration::from_secs(parse_var(
            &lookup,
            "DEVICE_TIMEOUT_SECS",
            DEFAULT_DEVICE_TIMEOUT_SECS,
        )?);

        let espn_circuit_breaker = BreakerConfig {
            failure_threshold: parse_var(&lookup, "ESPN_CB_FAILURE_THRESHOLD", 5)?,
            recovery_timeout: Duration::from_secs(parse_var(
                &lookup,
                "ESPN_CB_RECOVERY_TIMEOUT_SECS",
                30,
            )?),
            success_threshold: 2,
        };

        if roster.is_empty() {
            return Err(ConfigError::invalid("teams", "at least one team is required"));
        }

        let mut labels = HashSet::new();
        let mut teams = Vec::with_capacity(roster.len());
        for entry in roster {
            if !labels.insert(entry.label.clone()) {
                return Err(ConfigError::invalid(
                    "teams",
                    format!("duplicate label {}", entry.label),
                ));
            }

            let device = entry
                .device
                .clone()
                .or_else(|| bulb_host.clone())
                .ok_or_else(|| ConfigError::Missing("BULB_HOST".to_string()))?;

            let team_lead_window = match entry.lead_window_mins {
                Some(mins) => {
                    lead_window_from_mins(&format!("{}.lead_window_mins", entry.label), mins)?
                }
                None => lead_window,
            };

            let team = TeamConfig {
                poll_interval: Duration::from_secs(
                    entry.poll_interval_secs.unwrap_or(poll_interval_secs),
                ),
                live_poll_interval: Duration::from_secs(
                    entry.live_poll_interval_secs.unwrap_or(live_poll_interval_secs),
                ),
                lead_window: team_lead_window,
                flash: FlashConfig {
                    color: entry.flash_color,
                    count: entry.flash_count.unwrap_or(flash_count),
                    on_duration: flash_on,
                    off_duration: flash_off,
                },
                label: entry.label,
                name: entry.name,
                query: TeamQuery {
                    team_id: entry.espn_team_id,
                    sport_path: entry.sport_path,
                },
                color: entry.color,
                device,
            };
            validate_team(&team)?;
            teams.push(team);
        }

        Ok(Self {
            teams,
            device_timeout,
            espn_circuit_breaker,
        })
    }

    /// Distinct light hosts across all teams, in roster order
    pub fn device_hosts(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.teams
            .iter()
            .filter(|t| seen.insert(t.device.clone()))
            .map(|t| t.device.clone())
            .collect()
    }
}

pub fn load_roster(path: &str) -> Result<Vec<TeamEntry>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_string(),
        source,
    })
}

fn lead_window_from_mins(key: &str, mins: u64) -> Result<chrono::Duration, ConfigError> {
    if mins > MAX_LEAD_WINDOW_MINS {
        return Err(ConfigError::invalid(
            key,
            format!("must be at most {} minutes", MAX_LEAD_WINDOW_MINS),
        ));
    }
    i64::try_from(mins)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .ok_or_else(|| ConfigError::invalid(key, "out of range"))
}

fn validate_team(team: &TeamConfig) -> Result<(), ConfigError> {
    let key = |field: &str| format!("{}.{}", team.label, field);

    if team.label.trim().is_empty() {
        return Err(ConfigError::invalid("label", "must not be empty"));
    }
    if team.query.team_id.trim().is_empty() {
        return Err(ConfigError::invalid(key("espn_team_id"), "must not be empty"));
    }
    if team.query.sport_path.trim().is_empty() {
        return Err(ConfigError::invalid(key("sport_path"), "must not be empty"));
    }
    if !team.color.is_valid() {
        return Err(ConfigError::invalid(
            key("color"),
            "hue must be 0-360, saturation and value 0-100",
        ));
    }
    if team.flash.color.is_some_and(|c| !c.is_valid()) {
        return Err(ConfigError::invalid(
            key("flash_color"),
            "hue must be 0-360, saturation and value 0-100",
        ));
    }
    if team.flash.count > MAX_FLASH_COUNT {
        return Err(ConfigError::invalid(
            key("flash_count"),
            format!("must be at most {}", MAX_FLASH_COUNT),
        ));
    }
    if team.poll_interval.is_zero() || team.live_poll_interval.is_zero() {
        return Err(ConfigError::invalid(
            key("poll_interval"),
            "must be greater than zero",
        ));
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(key, format!("{:?}: {}", raw, e))),
        None => Ok(default),
    }
}
