//! Team Light Rust Service
//!
//! Watches each configured team's schedule on ESPN and drives a Kasa smart
//! bulb: team color shortly before kickoff, a flash whenever the score
//! changes, and the pre-game light restored when the game is final.
//!
//! `team_light_rust --test-flash [LABEL]` runs one flash sequence and exits.

use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use gamelight_core::clients::EspnClient;
use gamelight_core::devices::{KasaBulb, LightDevice};
use gamelight_core::providers::{EspnGameProvider, GameStateProvider};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use team_light_rust::{Config, Scheduler, TeamSession};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Team Light Service...");

    let config = Config::from_env().context("Invalid configuration")?;

    // Shared client; every team feed gets its own circuit breaker
    let provider: Arc<dyn GameStateProvider> = Arc::new(EspnGameProvider::new(EspnClient::new(
        config.espn_circuit_breaker.clone(),
    )));

    // One handle per bulb; teams sharing a host share the handle
    let mut devices: HashMap<String, Arc<dyn LightDevice>> = HashMap::new();
    for host in config.device_hosts() {
        let bulb = KasaBulb::new(&host, config.device_timeout);
        let state = bulb
            .get_state()
            .await
            .with_context(|| format!("Light at {} is not usable", host))?;
        info!("Connected to light at {} ({:?})", host, state);
        devices.insert(host, Arc::new(bulb));
    }

    let sessions = config
        .teams
        .iter()
        .map(|team| {
            let device = devices
                .get(&team.device)
                .cloned()
                .ok_or_else(|| anyhow!("No light configured for {}", team.label))?;
            Ok(TeamSession::new(
                Arc::new(team.clone()),
                provider.clone(),
                device,
            ))
        })
        .collect::<Result<Vec<TeamSession>>>()?;

    let args: Vec<String> = env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--test-flash") {
        let session = match args.get(1) {
            Some(label) => sessions
                .iter()
                .find(|s| s.team().label.eq_ignore_ascii_case(label))
                .ok_or_else(|| anyhow!("No team with label {}", label))?,
            None => sessions
                .first()
                .ok_or_else(|| anyhow!("No teams configured"))?,
        };
        info!("Running test flash for {}", session.team().name);
        session.flash_demo().await.context("Test flash failed")?;
        return Ok(());
    }

    Scheduler::new(sessions)
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Team Light Service stopped");
    Ok(())
}
