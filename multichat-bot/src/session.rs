//! The live chat connection, as seen by the rest of the bot.
//!
//! [`Session`] is created once in `main` and handed to every component that
//! talks to chat. The session loop attaches a fresh [`ClientHandle`] after
//! each (re)connect and detaches it on disconnect, so holders of a
//! `Session` never see a stale connection.

use std::sync::Arc;

use async_trait::async_trait;
use multichat_sdk::client::ClientHandle;
use parking_lot::RwLock;

use crate::channels::{display, normalize};
use crate::output::wrap_lines;

/// Twitch drops PRIVMSG bodies longer than this.
pub const MAX_MESSAGE_LEN: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("not connected to chat")]
    NotConnected,

    #[error("chat connection closed: {0}")]
    Closed(String),
}

/// Operations on the live connection used by the core.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Channels (`#name`) the current connection was started with. Lags the
    /// persisted list until the next reconnect.
    fn joined_channels(&self) -> Vec<String>;

    /// Whether `channel` is in [`joined_channels`](Self::joined_channels).
    fn is_joined(&self, channel: &str) -> bool {
        let wanted = normalize(channel);
        self.joined_channels().iter().any(|c| normalize(c) == wanted)
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), SendError>;

    /// End the connection gracefully.
    async fn quit(&self, reason: &str) -> Result<(), SendError>;
}

struct Live {
    handle: ClientHandle,
    channels: Vec<String>,
}

#[derive(Clone, Default)]
pub struct Session {
    live: Arc<RwLock<Option<Live>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handle of a new connection and the join list it uses.
    pub fn attach(&self, handle: ClientHandle, channels: Vec<String>) {
        *self.live.write() = Some(Live { handle, channels });
    }

    pub fn detach(&self) {
        *self.live.write() = None;
    }

    fn handle(&self) -> Result<ClientHandle, SendError> {
        self.live
            .read()
            .as_ref()
            .map(|l| l.handle.clone())
            .ok_or(SendError::NotConnected)
    }
}

#[async_trait]
impl ChatSession for Session {
    fn joined_channels(&self) -> Vec<String> {
        self.live
            .read()
            .as_ref()
            .map(|l| l.channels.clone())
            .unwrap_or_default()
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), SendError> {
        let handle = self.handle()?;
        let target = display(channel);
        for line in wrap_lines(text, MAX_MESSAGE_LEN) {
            handle
                .privmsg(&target, &line)
                .await
                .map_err(|e| SendError::Closed(e.to_string()))?;
        }
        Ok(())
    }

    async fn quit(&self, reason: &str) -> Result<(), SendError> {
        let handle = self.handle()?;
        handle
            .quit(Some(reason))
            .await
            .map_err(|e| SendError::Closed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_session_reports_not_connected() {
        let session = Session::new();
        assert!(session.joined_channels().is_empty());
        assert!(matches!(
            session.say("#alice", "hi").await,
            Err(SendError::NotConnected)
        ));
        assert!(matches!(session.quit("bye").await, Err(SendError::NotConnected)));
    }
}
