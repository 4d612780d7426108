//! Cooperative stop/pause handle shared between a session and its driver.
//!
//! Pause granularity is "between turns": the orchestrator never interrupts an
//! in-flight generation call. A driver that wants to honour a pause awaits
//! [`SessionControl::wait_until_runnable`] before asking for the next turn.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub struct SessionControl {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(paused),
        }
    }

    /// Requests termination. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Resolves once the session is not paused, or immediately once stopped.
    pub async fn wait_until_runnable(&self) {
        let mut paused = self.paused.subscribe();
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = paused.wait_for(|paused| !*paused) => {}
        }
    }

    /// Resolves when `stop` has been called.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stop_is_idempotent() {
        let control = SessionControl::new();
        control.stop();
        control.stop();
        assert!(control.is_stopped());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_running() {
        let control = SessionControl::new();
        tokio::time::timeout(Duration::from_millis(50), control.wait_until_runnable())
            .await
            .expect("should not block while running");
    }

    #[tokio::test]
    async fn wait_blocks_until_resumed() {
        let control = SessionControl::new();
        control.pause();
        assert!(control.is_paused());

        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_until_runnable().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        control.resume();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("resume should release the waiter")
            .unwrap();
    }

    #[tokio::test]
    async fn stop_releases_a_paused_waiter() {
        let control = SessionControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_until_runnable().await })
        };
        control.stop();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("stop should release the waiter")
            .unwrap();
    }
}
