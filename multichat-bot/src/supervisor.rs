//! Restarting the chat connection so a new channel list takes effect.
//!
//! The persisted channel list is only read when a connection starts. After a
//! membership change the supervisor ends the current connection and asks
//! for a restart: by default [`SessionRunner`](crate::runner::SessionRunner) reconnects
//! in-process and re-reads the list; with a restart command configured an
//! external process manager restarts the whole binary instead.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::session::ChatSession;

pub const QUIT_REASON: &str = "Rejoining channels";

/// Signals from the core to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Reconnect now and re-read the channel list.
    Restart,
    /// Unrecoverable fault (persistence); the process should exit.
    Fatal(String),
    /// Quit cleanly and stop.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartMode {
    /// Reconnect inside this process.
    Reconnect,
    /// Run this shell command (e.g. `pm2 restart multichat-bot`).
    Command(String),
}

/// Something that can make a channel list change take effect.
#[async_trait]
pub trait Restart: Send + Sync {
    /// Best effort: failures are logged, never returned.
    async fn restart(&self);
}

pub struct ReconnectSupervisor {
    session: Arc<dyn ChatSession>,
    mode: RestartMode,
    control: mpsc::UnboundedSender<Control>,
}

impl ReconnectSupervisor {
    pub fn new(
        session: Arc<dyn ChatSession>,
        mode: RestartMode,
    ) -> (Self, mpsc::UnboundedReceiver<Control>) {
        let (control, control_rx) = mpsc::unbounded_channel();
        (
            Self {
                session,
                mode,
                control,
            },
            control_rx,
        )
    }

    /// Sender for other components that need to signal the session loop.
    pub fn control(&self) -> mpsc::UnboundedSender<Control> {
        self.control.clone()
    }
}

#[async_trait]
impl Restart for ReconnectSupervisor {
    async fn restart(&self) {
        if let Err(e) = self.session.quit(QUIT_REASON).await {
            tracing::warn!(error = %e, "Could not end chat session cleanly");
        }
        match &self.mode {
            RestartMode::Reconnect => {
                tracing::info!("Requesting reconnect");
                if self.control.send(Control::Restart).is_err() {
                    tracing::warn!("Session loop is gone, restart dropped");
                }
            }
            RestartMode::Command(command) => {
                tracing::info!(%command, "Requesting process restart");
                let command = command.clone();
                tokio::spawn(async move {
                    match tokio::process::Command::new("sh")
                        .arg("-c")
                        .arg(&command)
                        .status()
                        .await
                    {
                        Ok(status) if status.success() => {}
                        Ok(status) => tracing::warn!(%command, %status, "Restart command failed"),
                        Err(e) => tracing::warn!(%command, error = %e, "Restart command failed"),
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSession;

    #[tokio::test]
    async fn reconnect_mode_quits_then_signals() {
        let session = Arc::new(FakeSession::joined(&["#multibot"]));
        let (supervisor, mut control) =
            ReconnectSupervisor::new(session.clone(), RestartMode::Reconnect);

        supervisor.restart().await;

        assert_eq!(session.quits(), vec![QUIT_REASON.to_string()]);
        assert_eq!(control.try_recv().unwrap(), Control::Restart);
        assert!(control.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_still_signals_when_quit_fails() {
        let session = Arc::new(FakeSession::disconnected());
        let (supervisor, mut control) =
            ReconnectSupervisor::new(session.clone(), RestartMode::Reconnect);

        supervisor.restart().await;
        assert_eq!(control.try_recv().unwrap(), Control::Restart);
    }

    #[tokio::test]
    async fn command_mode_does_not_signal_the_loop() {
        let session = Arc::new(FakeSession::joined(&["#multibot"]));
        let (supervisor, mut control) =
            ReconnectSupervisor::new(session.clone(), RestartMode::Command("true".into()));

        supervisor.restart().await;
        assert_eq!(session.quits().len(), 1);
        assert!(control.try_recv().is_err());
    }
}
