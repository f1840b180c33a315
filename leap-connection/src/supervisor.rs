//! Periodic liveness probing and reconnection
//!
//! The [`ReconnectSupervisor`] runs a fixed-period background task. Each tick
//! pings the gateway, then checks the connection flag; when the connection is
//! down it makes exactly one reconnect attempt and goes back to probing
//! whatever the outcome. The tick period is the only rate limit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::connection::GatewayConnection;
use crate::error::{GatewayError, Result};

/// What the supervisor needs from a connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Liveness: Send + Sync {
    async fn ping(&self) -> bool;
    fn is_connected(&self) -> bool;
    async fn reconnect(&self) -> Result<()>;
}

#[async_trait]
impl Liveness for GatewayConnection {
    async fn ping(&self) -> bool {
        GatewayConnection::ping(self).await
    }

    fn is_connected(&self) -> bool {
        GatewayConnection::is_connected(self)
    }

    async fn reconnect(&self) -> Result<()> {
        self.connect().await
    }
}

/// Supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Probing,
    Reconnecting,
}

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    Reconnected,
    ReconnectFailed(GatewayError),
}

/// Background task keeping the gateway connection alive.
///
/// # Shutdown
///
/// `shutdown()` signals the task and waits up to 5 seconds for it to stop.
pub struct ReconnectSupervisor {
    background_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    state: Arc<RwLock<SupervisorState>>,
}

impl ReconnectSupervisor {
    /// Start probing `liveness` every `period`. The first probe happens one
    /// period after start.
    pub fn start(liveness: Arc<dyn Liveness>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let state = Arc::new(RwLock::new(SupervisorState::Probing));

        let background_task = tokio::spawn(Self::probe_task(
            liveness,
            period,
            Arc::clone(&state),
            shutdown_rx,
        ));

        info!(?period, "Reconnect supervisor started");
        Self {
            background_task: Some(background_task),
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Start probing a gateway connection at its configured interval.
    pub fn for_connection(connection: &GatewayConnection) -> Self {
        let period = connection.config().probe_interval;
        Self::start(Arc::new(connection.clone()), period)
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    /// Run one probe: ping, check the flag, reconnect at most once.
    pub async fn tick<L>(liveness: &L, state: &RwLock<SupervisorState>) -> TickOutcome
    where
        L: Liveness + ?Sized,
    {
        let alive = liveness.ping().await;
        debug!(alive, "Probe finished");

        if liveness.is_connected() {
            return TickOutcome::Healthy;
        }

        *state.write() = SupervisorState::Reconnecting;
        info!("Gateway not connected, reconnecting");
        let outcome = match liveness.reconnect().await {
            Ok(()) => {
                info!("Reconnected to gateway");
                TickOutcome::Reconnected
            }
            Err(e) => {
                warn!(error = %e, "Reconnect attempt failed");
                TickOutcome::ReconnectFailed(e)
            }
        };
        *state.write() = SupervisorState::Probing;
        outcome
    }

    async fn probe_task(
        liveness: Arc<dyn Liveness>,
        period: Duration,
        state: Arc<RwLock<SupervisorState>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut probe_interval = interval_at(Instant::now() + period, period);
        probe_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = probe_interval.tick() => {
                    Self::tick(liveness.as_ref(), &state).await;
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        debug!("Reconnect supervisor stopped");
    }

    /// Stop the background task.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Shutdown` when the task panicked or did not stop
    /// within 5 seconds.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        match self.background_task.take() {
            Some(task) => match timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(GatewayError::Shutdown(format!(
                    "Supervisor task panicked: {e}"
                ))),
                Err(_) => Err(GatewayError::Shutdown(
                    "Supervisor task shutdown timed out after 5 seconds".to_string(),
                )),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn probing() -> RwLock<SupervisorState> {
        RwLock::new(SupervisorState::Probing)
    }

    #[tokio::test]
    async fn test_healthy_tick_does_not_reconnect() {
        let mut liveness = MockLiveness::new();
        liveness.expect_ping().times(1).returning(|| true);
        liveness.expect_is_connected().times(1).returning(|| true);
        liveness.expect_reconnect().never();

        let state = probing();
        let outcome = ReconnectSupervisor::tick(&liveness, &state).await;

        assert_eq!(outcome, TickOutcome::Healthy);
        assert_eq!(*state.read(), SupervisorState::Probing);
    }

    #[tokio::test]
    async fn test_successful_ping_but_disconnected_reconnects_once() {
        let mut seq = Sequence::new();
        let mut liveness = MockLiveness::new();
        liveness
            .expect_ping()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| true);
        liveness
            .expect_is_connected()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| false);
        liveness
            .expect_reconnect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let state = probing();
        let outcome = ReconnectSupervisor::tick(&liveness, &state).await;

        assert_eq!(outcome, TickOutcome::Reconnected);
        assert_eq!(*state.read(), SupervisorState::Probing);
    }

    #[tokio::test]
    async fn test_failed_reconnect_returns_to_probing() {
        let mut liveness = MockLiveness::new();
        liveness.expect_ping().returning(|| false);
        liveness.expect_is_connected().returning(|| false);
        liveness
            .expect_reconnect()
            .times(1)
            .returning(|| Err(GatewayError::ConnectFailed("refused".to_string())));

        let state = probing();
        let outcome = ReconnectSupervisor::tick(&liveness, &state).await;

        assert_eq!(
            outcome,
            TickOutcome::ReconnectFailed(GatewayError::ConnectFailed("refused".to_string()))
        );
        assert_eq!(*state.read(), SupervisorState::Probing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_ticks_each_period() {
        let mut liveness = MockLiveness::new();
        liveness.expect_ping().times(3).returning(|| true);
        liveness.expect_is_connected().times(3).returning(|| true);
        liveness.expect_reconnect().never();

        let supervisor = ReconnectSupervisor::start(Arc::new(liveness), Duration::from_secs(30));

        // No probe at start, then one per period
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(supervisor.state(), SupervisorState::Probing);
        assert!(supervisor.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let mut liveness = MockLiveness::new();
        liveness.expect_ping().never();

        let supervisor = ReconnectSupervisor::start(Arc::new(liveness), Duration::from_secs(3600));
        assert!(supervisor.shutdown().await.is_ok());
    }
}
