//! Runs every team session on its own tokio task
//!
//! Sessions share nothing mutable, so each loop polls at its own cadence and
//! a slow or failing team never holds up another. A panic inside a tick is
//! caught and logged; the session keeps its memory and polls again after its
//! normal delay.

use crate::session::TeamSession;
use chrono::Utc;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

pub struct Scheduler {
    sessions: Vec<TeamSession>,
}

impl Scheduler {
    pub fn new(sessions: Vec<TeamSession>) -> Self {
        Self { sessions }
    }

    /// Run all sessions forever
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run all sessions until `shutdown` resolves, then stop them
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut handles: Vec<JoinHandle<()>> = self
            .sessions
            .into_iter()
            .map(|session| {
                let span = info_span!("team", label = %session.team().label);
                tokio::spawn(run_session(session).instrument(span))
            })
            .collect();

        info!("Scheduler started {} team session(s)", handles.len());

        tokio::select! {
            _ = shutdown => info!("Shutdown requested, stopping team sessions"),
            results = join_all(handles.iter_mut()) => {
                for result in results {
                    if let Err(e) = result {
                        error!("Team session task ended unexpectedly: {}", e);
                    }
                }
            }
        }

        for handle in &handles {
            handle.abort();
        }
    }
}

async fn run_session(mut session: TeamSession) {
    info!("Starting light automation for {}", session.team().name);

    loop {
        match AssertUnwindSafe(session.tick()).catch_unwind().await {
            Ok(outcome) => debug!("Tick finished: {:?}", outcome),
            Err(panic) => error!(
                "Tick panicked, continuing with next poll: {}",
                panic_message(panic.as_ref())
            ),
        }

        let delay = session.next_delay(Utc::now());
        debug!("Next poll in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
