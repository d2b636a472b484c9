//! Background eviction of idle, unattended sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::binding::ConnectionBinding;
use crate::coordinator::MoveCoordinator;
use crate::registry::SessionRegistry;

/// Periodically retries pending write-throughs and retires sessions that
/// have no bound participants and no recent activity.
///
/// Retired sessions keep their stored record and are cold-loaded again on
/// the next lookup.
pub struct IdleReaper {
    registry: Arc<SessionRegistry>,
    binding: Arc<ConnectionBinding>,
    coordinator: Arc<MoveCoordinator>,
    idle_timeout: Duration,
    interval: Duration,
}

impl IdleReaper {
    /// Create a reaper. Call [`IdleReaper::run`] to start it.
    pub fn new(
        registry: Arc<SessionRegistry>,
        binding: Arc<ConnectionBinding>,
        coordinator: Arc<MoveCoordinator>,
        idle_timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            binding,
            coordinator,
            idle_timeout,
            interval,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            idle_timeout_secs = self.idle_timeout.as_secs(),
            interval_secs = self.interval.as_secs(),
            "idle reaper started"
        );
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {
                    let _ = self.reap_once().await;
                }
            }
        }
        debug!("idle reaper stopped");
    }

    /// One pass over every cached session. Returns the number retired.
    #[instrument(skip(self))]
    pub async fn reap_once(&self) -> usize {
        let mut retired = 0;
        for session_id in self.registry.session_ids() {
            match self.coordinator.retry_persist(&session_id).await {
                Ok(true) => info!(session_id = %session_id, "pending write flushed by reaper"),
                Ok(false) => {}
                Err(e) => warn!(session_id = %session_id, error = %e, "pending write still failing"),
            }

            let unattended = self.binding.participant_count(&session_id) == 0;
            if !unattended {
                continue;
            }
            let idle_timeout = self.idle_timeout;
            let binding = &self.binding;
            let id = session_id.clone();
            let evicted = self
                .registry
                .retire_session_if(&session_id, move |session| {
                    binding.participant_count(&id) == 0 && session.idle_for() >= idle_timeout
                })
                .await;
            if evicted {
                retired += 1;
            }
        }
        if retired > 0 {
            debug!(retired, "reaped idle sessions");
        }
        retired
    }
}
