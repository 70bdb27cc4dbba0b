use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;

/// Capped exponential backoff with a bounded number of consecutive failures.
///
/// A session that ends before `stable_after` counts as a failure, so a server
/// that accepts and immediately drops connections still ends in `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub stable_after: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.reconnect_initial_delay_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_attempts: config.reconnect_max_attempts,
            stable_after: Duration::from_millis(config.reconnect_stable_after_ms),
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, retry_in_ms: u64 },
    Offline,
}

pub trait Connector {
    type Session: Send;

    fn connect(&mut self) -> impl Future<Output = Result<Self::Session, AppError>> + Send;

    /// Consumes the session until it ends. `Ok` means the caller asked to stop;
    /// `Err` means the link dropped and should be re-established. Implementations
    /// re-fetch state through the query surface at the start of each session.
    fn run(&mut self, session: Self::Session) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Keeps a connector alive, publishing its state on `state_tx`.
///
/// Gives up after `max_attempts` consecutive failures, leaving the state at
/// `Offline`. Only a session that stayed up for `stable_after` resets the count.
pub async fn maintain_connection<C>(
    mut connector: C,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<LinkState>,
) -> Result<(), AppError>
where
    C: Connector,
{
    let mut failures = 0u32;

    loop {
        state_tx.send_replace(LinkState::Connecting);

        let err = match connector.connect().await {
            Ok(session) => {
                state_tx.send_replace(LinkState::Connected);
                info!("event stream connected");

                let started = Instant::now();
                match connector.run(session).await {
                    Ok(()) => {
                        info!("event stream closed by client");
                        return Ok(());
                    }
                    Err(err) => {
                        if started.elapsed() >= policy.stable_after {
                            failures = 0;
                        }
                        err
                    }
                }
            }
            Err(err) => err,
        };

        failures += 1;
        if failures > policy.max_attempts {
            warn!(attempts = failures - 1, error = %err, "giving up on event stream; offline");
            state_tx.send_replace(LinkState::Offline);
            return Err(err);
        }

        let delay = policy.delay_for(failures);
        warn!(attempt = failures, delay_ms = delay.as_millis() as u64, error = %err, "event stream lost; retrying");
        state_tx.send_replace(LinkState::Reconnecting {
            attempt: failures,
            retry_in_ms: delay.as_millis() as u64,
        });
        sleep(delay).await;
    }
}
