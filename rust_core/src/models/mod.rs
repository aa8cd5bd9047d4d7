// Shared models for gamelight services
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Light Colors & State
// ============================================================================

/// Hue (0-360), saturation (0-100), value (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: u16,
    pub saturation: u8,
    pub value: u8,
}

impl Hsv {
    pub const fn new(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.hue <= 360 && self.saturation <= 100 && self.value <= 100
    }
}

/// Full observable state of a single light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    pub hue: u16,
    pub saturation: u8,
    pub brightness: u8,
    /// Color temperature in Kelvin; 0 means the light is in HSV mode
    pub color_temp: u16,
}

impl LightState {
    /// Powered-on HSV state for a team or flash color
    pub fn from_hsv(color: Hsv) -> Self {
        Self {
            on: true,
            hue: color.hue,
            saturation: color.saturation,
            brightness: color.value,
            color_temp: 0,
        }
    }

    /// Powered-on white state at the given temperature
    pub fn white(color_temp: u16, brightness: u8) -> Self {
        Self {
            on: true,
            hue: 0,
            saturation: 0,
            brightness,
            color_temp,
        }
    }

    pub fn is_hsv(&self) -> bool {
        self.color_temp == 0
    }
}

// ============================================================================
// Game Snapshots
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Scheduled,
    InProgress,
    Final,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Scheduled => "scheduled",
            GamePhase::InProgress => "in_progress",
            GamePhase::Final => "final",
        }
    }
}

/// Points for the tracked team and its opponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub team: u16,
    pub opponent: u16,
}

impl Score {
    pub const fn new(team: u16, opponent: u16) -> Self {
        Self { team, opponent }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.team, self.opponent)
    }
}

/// Point-in-time read of one game, normalized from the data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub name: String,
    pub phase: GamePhase,
    pub score: Score,
    pub start_time: DateTime<Utc>,
    /// Identifier of the most recent scoring play, when the source reports one
    pub last_scoring_play: Option<String>,
    /// Human readable status such as "2nd Quarter" or "Final"
    pub detail: Option<String>,
}

impl GameSnapshot {
    /// True when the game starts within `lead` of `now` (or already should have).
    /// A window reaching past the calendar's range counts as open.
    pub fn starts_within(&self, now: DateTime<Utc>, lead: chrono::Duration) -> bool {
        self.start_time
            .checked_sub_signed(lead)
            .map_or(true, |opens| opens <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot_at(start: DateTime<Utc>) -> GameSnapshot {
        GameSnapshot {
            game_id: "401".to_string(),
            name: "Test Game".to_string(),
            phase: GamePhase::Scheduled,
            score: Score::default(),
            start_time: start,
            last_scoring_play: None,
            detail: None,
        }
    }

    #[test]
    fn test_starts_within_lead_window() {
        let start = Utc.with_ymd_and_hms(2026, 1, 11, 18, 0, 0).unwrap();
        let game = snapshot_at(start);
        let lead = chrono::Duration::minutes(5);

        assert!(!game.starts_within(start - chrono::Duration::minutes(6), lead));
        assert!(game.starts_within(start - chrono::Duration::minutes(5), lead));
        assert!(game.starts_within(start - chrono::Duration::minutes(1), lead));
        assert!(game.starts_within(start + chrono::Duration::minutes(30), lead));
    }

    #[test]
    fn test_starts_within_huge_window_does_not_overflow() {
        let game = snapshot_at(Utc.with_ymd_and_hms(2026, 1, 11, 18, 0, 0).unwrap());
        assert!(game.starts_within(Utc::now(), chrono::Duration::weeks(1_000_000_000)));
    }

    #[test]
    fn test_hsv_validation() {
        assert!(Hsv::new(280, 100, 100).is_valid());
        assert!(Hsv::new(360, 0, 0).is_valid());
        assert!(!Hsv::new(361, 50, 50).is_valid());
        assert!(!Hsv::new(10, 101, 50).is_valid());
    }

    #[test]
    fn test_light_state_from_hsv_is_on_in_color_mode() {
        let state = LightState::from_hsv(Hsv::new(348, 94, 73));
        assert!(state.on);
        assert!(state.is_hsv());
        assert_eq!(state.brightness, 73);
        assert!(!LightState::white(2700, 100).is_hsv());
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::new(14, 7).to_string(), "14-7");
    }
}
