//! Team light service library
//!
//! Drives a smart light from live game state for each configured team:
//! team color before kickoff, a flash on every score, and the original light
//! back once the game is final.

pub mod config;
pub mod scheduler;
pub mod session;

pub use config::{Config, FlashConfig, TeamConfig};
pub use scheduler::Scheduler;
pub use session::{SessionMemory, SessionPhase, TeamSession, TickOutcome};
