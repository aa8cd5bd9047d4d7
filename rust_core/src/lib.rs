//! Gamelight Core - game state providers and smart lights.
//!
//! This crate provides:
//! - Normalized game snapshots and light state models
//! - The `GameStateProvider` and `LightDevice` seams
//! - ESPN site API client and provider
//! - TP-Link Kasa bulb client and device
//! - API circuit breaker for upstream resilience

pub mod circuit_breaker;
pub mod clients;
pub mod devices;
pub mod error;
pub mod models;
pub mod providers;

pub use devices::LightDevice;
pub use error::{ConfigError, DeviceError, ProviderError};
pub use models::{GamePhase, GameSnapshot, Hsv, LightState, Score};
pub use providers::{GameStateProvider, TeamQuery};
