//! Two teams sharing one `EspnGameProvider` against a local ESPN stub

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{team, FakeLight, ORIGINAL_LIGHT, TEAM_COLOR};
use gamelight_core::circuit_breaker::{BreakerConfig, CircuitState};
use gamelight_core::clients::EspnClient;
use gamelight_core::models::LightState;
use gamelight_core::providers::EspnGameProvider;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use team_light_rust::{TeamSession, TickOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serves 404 for team `BAD` and a game two minutes out for everyone else
async fn spawn_espn_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(serve(socket));
        }
    });

    format!("http://{}", addr)
}

async fn serve(mut socket: TcpStream) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    let (status, body) = if path.contains("/teams/BAD/") {
        ("404 Not Found", json!({ "code": 404 }))
    } else if path.ends_with("/schedule") {
        let start = (Utc::now() + ChronoDuration::minutes(2)).format("%Y-%m-%dT%H:%MZ");
        let schedule = json!({ "events": [{
            "id": "401772",
            "date": start.to_string(),
            "name": "Cleveland Browns at Baltimore Ravens",
            "competitions": [{
                "status": { "type": { "state": "pre", "completed": false } },
                "competitors": [ { "id": "33" }, { "id": "5" } ]
            }]
        }]});
        ("200 OK", schedule)
    } else {
        ("404 Not Found", json!({}))
    };

    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

#[tokio::test]
async fn test_broken_team_feed_does_not_block_other_team() {
    let base_url = spawn_espn_stub().await;
    let provider = Arc::new(EspnGameProvider::new(EspnClient::with_base_url(
        &base_url,
        BreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 1,
        },
    )));

    let mut broken_team = (*team("BROKEN", 2)).clone();
    broken_team.query.team_id = "BAD".to_string();
    let mut broken = TeamSession::new(
        Arc::new(broken_team),
        provider.clone(),
        Arc::new(FakeLight::new(ORIGINAL_LIGHT)),
    );

    let healthy_light = Arc::new(FakeLight::new(ORIGINAL_LIGHT));
    let mut healthy = TeamSession::new(team("RAVENS", 2), provider.clone(), healthy_light.clone());

    for _ in 0..5 {
        assert_eq!(broken.tick().await, TickOutcome::Skipped);
    }
    assert_eq!(
        provider.client().breaker_state("football/nfl", "BAD"),
        CircuitState::Open
    );

    assert_eq!(healthy.tick().await, TickOutcome::ColorApplied);
    assert_eq!(healthy_light.current(), LightState::from_hsv(TEAM_COLOR));
    assert_eq!(
        provider.client().breaker_state("football/nfl", "33"),
        CircuitState::Closed
    );
}
