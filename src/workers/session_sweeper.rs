//! Session sweeper worker
//!
//! Best-effort background reaper for abandoned payment attempts: any session
//! still `initiated` past its expiry window is transitioned to `expired`. The
//! transition is guarded in SQL, so a late real callback that already settled
//! the session always wins over the sweep. A failed cycle is logged and the
//! loop keeps running; a single bad pass never crashes the worker.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::database::session_repository::PaymentSessionRepository;

#[derive(Debug, Clone)]
pub struct SessionSweeperConfig {
    /// How often the worker wakes up to reap overdue sessions.
    pub sweep_interval: Duration,
}

impl SessionSweeperConfig {
    pub fn new(sweep_interval_seconds: u64) -> Self {
        Self {
            sweep_interval: Duration::from_secs(sweep_interval_seconds),
        }
    }
}

pub struct SessionSweeper {
    sessions: PaymentSessionRepository,
    config: SessionSweeperConfig,
}

impl SessionSweeper {
    pub fn new(sessions: PaymentSessionRepository, config: SessionSweeperConfig) -> Self {
        Self { sessions, config }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "session sweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sessions.expire_overdue(Utc::now()).await {
                        Ok(0) => {}
                        Ok(expired) => {
                            info!(expired, "swept overdue payment sessions");
                        }
                        Err(e) => {
                            warn!(error = %e, "session sweep cycle failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("session sweeper shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_carries_interval() {
        let config = SessionSweeperConfig::new(90);
        assert_eq!(config.sweep_interval, Duration::from_secs(90));
    }
}
