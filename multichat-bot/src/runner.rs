//! The chat session loop.
//!
//! Each pass reads the channel list, connects, joins everything on it and
//! dispatches events until the connection ends. A [`Control::Restart`]
//! reconnects immediately so a membership change takes effect; any other
//! loss backs off first. Only persistence faults (an unreadable channel
//! list or [`Control::Fatal`]) and login rejection stop the loop with an
//! error.

use std::sync::Arc;

use anyhow::{Result, bail};
use multichat_sdk::client::{self, ClientHandle, ConnectConfig, ReconnectConfig};
use multichat_sdk::event::Event;
use tokio::sync::mpsc;

use crate::bot::Bot;
use crate::channels::{ChannelStore, display};
use crate::session::Session;
use crate::supervisor::Control;

enum Ended {
    /// Membership changed; reconnect right away with the new list.
    Restart,
    /// Connection dropped on its own; back off before reconnecting.
    Lost(String),
    Shutdown,
}

pub struct SessionRunner {
    connect: ConnectConfig,
    store: Arc<ChannelStore>,
    session: Session,
    bot: Arc<Bot>,
    backoff: ReconnectConfig,
}

impl SessionRunner {
    pub fn new(
        connect: ConnectConfig,
        store: Arc<ChannelStore>,
        session: Session,
        bot: Arc<Bot>,
    ) -> Self {
        Self {
            connect,
            store,
            session,
            bot,
            backoff: ReconnectConfig::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: ReconnectConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until shutdown or a fatal signal.
    pub async fn run(&self, mut control_rx: mpsc::UnboundedReceiver<Control>) -> Result<()> {
        let mut delay = self.backoff.initial_delay;

        loop {
            // A restart requested while we were already reconnecting is
            // satisfied by this connection.
            while let Ok(signal) = control_rx.try_recv() {
                match signal {
                    Control::Restart => {}
                    Control::Fatal(reason) => bail!("fatal: {reason}"),
                    Control::Shutdown => return Ok(()),
                }
            }

            let channels: Vec<String> = self.store.load()?.iter().map(|c| display(c)).collect();
            let ended = match client::establish_connection(&self.connect).await {
                Ok(conn) => {
                    let (handle, events) = client::connect_with_stream(conn, self.connect.clone());
                    self.session.attach(handle.clone(), channels.clone());
                    let ended = self
                        .drive(&handle, events, &channels, &mut control_rx, &mut delay)
                        .await;
                    self.session.detach();
                    ended?
                }
                Err(e) => Ended::Lost(e.to_string()),
            };

            match ended {
                Ended::Shutdown => {
                    tracing::info!("Shutting down");
                    return Ok(());
                }
                Ended::Restart => {
                    tracing::info!("Reconnecting with updated channel list");
                    delay = self.backoff.initial_delay;
                }
                Ended::Lost(reason) => {
                    tracing::warn!(%reason, ?delay, "Chat connection lost, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        signal = control_rx.recv() => match signal {
                            Some(Control::Fatal(reason)) => bail!("fatal: {reason}"),
                            Some(Control::Shutdown) => return Ok(()),
                            Some(Control::Restart) => {}
                            None => bail!("control channel closed"),
                        },
                    }
                    delay = self.backoff.next_delay(delay);
                }
            }
        }
    }

    async fn drive(
        &self,
        handle: &ClientHandle,
        mut events: mpsc::Receiver<Event>,
        channels: &[String],
        control_rx: &mut mpsc::UnboundedReceiver<Control>,
        delay: &mut std::time::Duration,
    ) -> Result<Ended> {
        loop {
            tokio::select! {
                biased;
                signal = control_rx.recv() => match signal {
                    Some(Control::Restart) => return Ok(Ended::Restart),
                    Some(Control::Fatal(reason)) => bail!("fatal: {reason}"),
                    Some(Control::Shutdown) => {
                        let _ = handle.quit(Some("Shutting down")).await;
                        return Ok(Ended::Shutdown);
                    }
                    None => bail!("control channel closed"),
                },
                event = events.recv() => {
                    let Some(event) = event else {
                        return Ok(Ended::Lost("event stream closed".to_string()));
                    };
                    match &event {
                        Event::Registered { nick } => {
                            tracing::info!(%nick, "Registered");
                            if let Err(e) = handle.join_many(channels).await {
                                return Ok(Ended::Lost(format!("joining channels: {e}")));
                            }
                            tracing::info!("Connected to channels: {}", channels.join(", "));
                            *delay = self.backoff.initial_delay;
                        }
                        Event::AuthFailed { reason } => bail!("chat login rejected: {reason}"),
                        Event::ServerNotice { text } => {
                            tracing::warn!(notice = %text, "Server notice");
                        }
                        Event::Disconnected { reason } => return Ok(Ended::Lost(reason.clone())),
                        Event::Message { .. } => {
                            self.bot.handle_event(&event);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
