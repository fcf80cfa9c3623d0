//! IRC client for Twitch-style chat networks.
//!
//! Manages the TCP (optionally TLS) connection, registration with an OAuth
//! password, keepalive, and emits [`Event`]s. Outgoing commands issued
//! through a [`ClientHandle`] are written to the wire in the order they
//! were queued, so a reply followed by a quit always reaches the server in
//! that order.
//!
//! ## Reconnection
//!
//! The client itself never reconnects. Consumers drive reconnects and use
//! [`ReconnectConfig::next_delay`] for backoff.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;

use crate::event::Event;
use crate::irc::Message;

/// Capabilities requested from Twitch so PRIVMSGs carry badge tags.
pub const TWITCH_CAPABILITIES: &[&str] = &[
    "twitch.tv/tags",
    "twitch.tv/commands",
    "twitch.tv/membership",
];

/// Configuration for connecting to a chat server.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Login nick. Twitch requires this to be lowercase.
    pub nick: String,
    /// Server password, sent as `PASS` before `NICK` (e.g. `oauth:...`).
    pub password: Option<String>,
    /// Use TLS. Port 6697 implies TLS regardless.
    pub tls: bool,
    /// Capabilities requested with a single `CAP REQ`.
    pub capabilities: Vec<String>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_addr: "irc.chat.twitch.tv:6697".to_string(),
            nick: "justinfan12345".to_string(),
            password: None,
            tls: true,
            capabilities: TWITCH_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Commands the consumer can send to the client.
#[derive(Debug)]
pub enum Command {
    Join(String),
    Privmsg { target: String, text: String },
    Quit(Option<String>),
}

/// A handle to a running IRC client connection.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn join(&self, channel: &str) -> Result<()> {
        self.cmd_tx.send(Command::Join(channel.to_string())).await?;
        Ok(())
    }

    /// Join multiple channels with one comma-separated JOIN.
    pub async fn join_many(&self, channels: &[String]) -> Result<()> {
        if channels.is_empty() {
            return Ok(());
        }
        self.join(&channels.join(",")).await
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.cmd_tx
            .send(Command::Privmsg {
                target: target.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn quit(&self, message: Option<&str>) -> Result<()> {
        self.cmd_tx
            .send(Command::Quit(message.map(|s| s.to_string())))
            .await?;
        Ok(())
    }
}

/// A connection that has completed TCP (and optionally TLS) but hasn't
/// started IRC registration yet.
pub enum EstablishedConnection {
    Plain(TcpStream),
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

/// Establish TCP (and optionally TLS) connection to the server.
pub async fn establish_connection(config: &ConnectConfig) -> Result<EstablishedConnection> {
    let use_tls = config.tls || config.server_addr.ends_with(":6697");
    let mode = if use_tls { "TLS" } else { "plain" };

    tracing::debug!("Resolving {}...", config.server_addr);
    let tcp = TcpStream::connect(&config.server_addr)
        .await
        .map_err(|e| anyhow::anyhow!("TCP connect to {} failed: {e}", config.server_addr))?;
    tracing::debug!("TCP connected to {} ({mode})", config.server_addr);

    if !use_tls {
        return Ok(EstablishedConnection::Plain(tcp));
    }

    let connector = TlsConnector::from(Arc::new(rustls_default_config()));
    let server_name = config
        .server_addr
        .split(':')
        .next()
        .unwrap_or("localhost");
    let dns_name = rustls::pki_types::ServerName::try_from(server_name.to_string())?;
    let tls_stream = connector
        .connect(dns_name, tcp)
        .await
        .map_err(|e| anyhow::anyhow!("TLS handshake with {} failed: {e}", config.server_addr))?;
    tracing::debug!("TLS handshake complete");
    Ok(EstablishedConnection::Tls(tls_stream))
}

fn rustls_default_config() -> rustls::ClientConfig {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Connect using an already-established connection.
///
/// Returns a handle for sending commands and a receiver for events.
/// The IRC protocol runs in a spawned task.
pub fn connect_with_stream(
    conn: EstablishedConnection,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = ClientHandle { cmd_tx };

    tokio::spawn(async move {
        let _ = event_tx.send(Event::Connected).await;
        let result = match conn {
            EstablishedConnection::Plain(tcp) => {
                let (reader, writer) = tokio::io::split(tcp);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
            EstablishedConnection::Tls(tls) => {
                let (reader, writer) = tokio::io::split(tls);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
        };
        if let Err(e) = result {
            let _ = event_tx
                .send(Event::Disconnected {
                    reason: e.to_string(),
                })
                .await;
        }
    });

    (handle, event_rx)
}

async fn run_irc<R, W>(
    mut reader: R,
    mut writer: W,
    config: &ConnectConfig,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if !config.capabilities.is_empty() {
        let caps = config.capabilities.join(" ");
        write_message(&mut writer, &Message::new("CAP", vec!["REQ".into(), caps])).await?;
    }
    if let Some(password) = &config.password {
        write_message(&mut writer, &Message::new("PASS", vec![password.clone()])).await?;
    }
    write_message(&mut writer, &Message::new("NICK", vec![config.nick.clone()])).await?;

    let mut registered = false;
    let mut pending_commands: Vec<Command> = Vec::new();
    let mut line_buf = String::new();
    let mut last_activity = tokio::time::Instant::now();
    let mut awaiting_pong = false;
    let ping_interval = Duration::from_secs(60);
    let ping_timeout = Duration::from_secs(120);

    loop {
        // One keepalive PING per silent interval, then wait out the timeout.
        let deadline = if awaiting_pong {
            last_activity + ping_timeout
        } else {
            last_activity + ping_interval
        };
        tokio::select! {
            result = reader.read_line(&mut line_buf) => {
                let n = result?;
                if n == 0 {
                    let _ = event_tx.send(Event::Disconnected { reason: "EOF".to_string() }).await;
                    break;
                }

                last_activity = tokio::time::Instant::now();
                awaiting_pong = false;
                let raw = line_buf.trim_end().to_string();
                let _ = event_tx.send(Event::RawLine(raw)).await;

                if let Some(msg) = Message::parse(&line_buf) {
                    match msg.command.as_str() {
                        "PING" => {
                            let token = msg.params.first().cloned().unwrap_or_default();
                            write_message(&mut writer, &Message::new("PONG", vec![token])).await?;
                        }
                        // RPL_WELCOME
                        "001" => {
                            registered = true;
                            let nick = msg.params.first().cloned().unwrap_or_else(|| config.nick.clone());
                            let _ = event_tx.send(Event::Registered { nick }).await;
                            for cmd in pending_commands.drain(..) {
                                execute_command(&mut writer, cmd).await?;
                            }
                        }
                        "CAP" => {
                            if msg.params.get(1).is_some_and(|s| s.eq_ignore_ascii_case("NAK")) {
                                tracing::warn!(caps = ?msg.params.last(), "Capabilities rejected");
                            }
                        }
                        "JOIN" => {
                            if let (Some(nick), Some(channel)) = (msg.nick(), msg.params.first()) {
                                let _ = event_tx.send(Event::Joined {
                                    channel: channel.clone(),
                                    nick: nick.to_string(),
                                }).await;
                            }
                        }
                        "PART" => {
                            if let (Some(nick), Some(channel)) = (msg.nick(), msg.params.first()) {
                                let _ = event_tx.send(Event::Parted {
                                    channel: channel.clone(),
                                    nick: nick.to_string(),
                                }).await;
                            }
                        }
                        "PRIVMSG" => {
                            if msg.params.len() >= 2 {
                                let from = msg.nick().unwrap_or("").to_string();
                                let _ = event_tx.send(Event::Message {
                                    from,
                                    target: msg.params[0].clone(),
                                    text: msg.params[1].clone(),
                                    tags: msg.tags.clone(),
                                }).await;
                            }
                        }
                        "NOTICE" => {
                            let text = msg.params.last().cloned().unwrap_or_default();
                            if is_auth_failure(&text) {
                                let _ = event_tx.send(Event::AuthFailed { reason: text }).await;
                            } else {
                                let _ = event_tx.send(Event::ServerNotice { text }).await;
                            }
                        }
                        // Twitch asks clients to reconnect before server maintenance.
                        "RECONNECT" => {
                            let _ = event_tx.send(Event::Disconnected {
                                reason: "Server requested reconnect".to_string(),
                            }).await;
                            break;
                        }
                        _ => {
                            if let Ok(num) = msg.command.parse::<u16>() {
                                if (400..600).contains(&num) {
                                    let text = if msg.params.len() > 1 {
                                        msg.params[1..].join(" ")
                                    } else {
                                        msg.params.join(" ")
                                    };
                                    let _ = event_tx.send(Event::ServerNotice { text }).await;
                                }
                            }
                        }
                    }
                }

                line_buf.clear();
            }
            cmd = cmd_rx.recv() => {
                // Every handle is gone; nobody can use this connection.
                let Some(cmd) = cmd else { break };
                if registered || matches!(cmd, Command::Quit(_)) {
                    let quitting = matches!(cmd, Command::Quit(_));
                    execute_command(&mut writer, cmd).await?;
                    if quitting {
                        let _ = event_tx.send(Event::Disconnected { reason: "Client quit".to_string() }).await;
                        break;
                    }
                } else {
                    // Queue until registered; JOINs sent earlier are dropped by the server.
                    pending_commands.push(cmd);
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                if awaiting_pong {
                    let _ = event_tx.send(Event::Disconnected { reason: "Ping timeout".to_string() }).await;
                    break;
                }
                write_message(&mut writer, &Message::new("PING", vec!["keepalive".into()])).await?;
                awaiting_pong = true;
            }
        }
    }

    Ok(())
}

fn is_auth_failure(text: &str) -> bool {
    text.contains("Login authentication failed") || text.contains("Improperly formatted auth")
}

/// Strip CR/LF so a message body can never smuggle in a second command.
fn sanitize(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Execute a single IRC command on the wire.
async fn execute_command<W: AsyncWrite + Unpin>(writer: &mut W, cmd: Command) -> Result<()> {
    let msg = match cmd {
        Command::Join(channel) => Message::new("JOIN", vec![channel]),
        Command::Privmsg { target, text } => Message::new("PRIVMSG", vec![target, sanitize(&text)]),
        Command::Quit(Some(m)) => Message::new("QUIT", vec![sanitize(&m)]),
        Command::Quit(None) => Message::new("QUIT", Vec::new()),
    };
    write_message(writer, &msg).await
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    writer.write_all(format!("{msg}\r\n").as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ── Reconnect helper ──

/// Backoff policy for reconnecting after an unexpected disconnect.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Delay to use after `current`, with up to 25% jitter, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let current_ms = current.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=current_ms / 4);
        let next = (current_ms as f64 * self.backoff_factor) as u64 + jitter;
        Duration::from_millis(next.min(self.max_delay.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;
    use tokio::time::timeout;

    async fn next_event(
        events: &mut mpsc::Receiver<Event>,
        predicate: impl Fn(&Event) -> bool,
    ) -> Event {
        loop {
            match timeout(Duration::from_secs(5), events.recv()).await {
                Ok(Some(event)) if predicate(&event) => return event,
                Ok(Some(_)) => continue,
                other => panic!("no matching event: {other:?}"),
            }
        }
    }

    fn spawn_client(
        config: ConnectConfig,
    ) -> (ClientHandle, mpsc::Receiver<Event>, DuplexStream) {
        let (client_side, server_side) = tokio::io::duplex(8192);
        let (event_tx, event_rx) = mpsc::channel(256);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(client_side);
            run_irc(BufReader::new(reader), writer, &config, event_tx, cmd_rx).await
        });
        (ClientHandle { cmd_tx }, event_rx, server_side)
    }

    #[tokio::test]
    async fn registers_flushes_queue_and_delivers_messages() {
        let config = ConnectConfig {
            nick: "multibot".to_string(),
            password: Some("oauth:abc".to_string()),
            ..Default::default()
        };
        let (handle, mut events, server) = spawn_client(config);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut lines = BufReader::new(server_read).lines();

        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership"
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PASS oauth:abc");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK multibot");

        handle.privmsg("#multibot", "hello").await.unwrap();
        server_write
            .write_all(b":tmi.twitch.tv 001 multibot :Welcome, GLHF!\r\n")
            .await
            .unwrap();
        let event = next_event(&mut events, |e| matches!(e, Event::Registered { .. })).await;
        assert!(matches!(event, Event::Registered { nick } if nick == "multibot"));
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "PRIVMSG #multibot hello"
        );

        server_write.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG tmi.twitch.tv");

        server_write
            .write_all(b"@badges=moderator/1;mod=1 :carol!carol@carol.tmi.twitch.tv PRIVMSG #alice :!blacklist troll\r\n")
            .await
            .unwrap();
        let event = next_event(&mut events, |e| matches!(e, Event::Message { .. })).await;
        match event {
            Event::Message { from, target, text, tags } => {
                assert_eq!(from, "carol");
                assert_eq!(target, "#alice");
                assert_eq!(text, "!blacklist troll");
                assert_eq!(tags.get("mod").map(String::as_str), Some("1"));
            }
            other => panic!("unexpected {other:?}"),
        }

        handle.privmsg("#alice", "line one\r\nQUIT").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "PRIVMSG #alice :line one  QUIT"
        );

        handle.quit(Some("see you later")).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "QUIT :see you later");
        let event = next_event(&mut events, |e| matches!(e, Event::Disconnected { .. })).await;
        assert!(matches!(event, Event::Disconnected { reason } if reason == "Client quit"));
    }

    #[tokio::test]
    async fn login_failure_notice_is_reported() {
        let (_handle, mut events, server) = spawn_client(ConnectConfig::default());
        let (_server_read, mut server_write) = tokio::io::split(server);
        server_write
            .write_all(b":tmi.twitch.tv NOTICE * :Login authentication failed\r\n")
            .await
            .unwrap();
        let event = next_event(&mut events, |e| matches!(e, Event::AuthFailed { .. })).await;
        assert!(matches!(event, Event::AuthFailed { reason } if reason.contains("failed")));
    }

    #[tokio::test]
    async fn server_reconnect_request_disconnects() {
        let (_handle, mut events, server) = spawn_client(ConnectConfig::default());
        let (_server_read, mut server_write) = tokio::io::split(server);
        server_write
            .write_all(b":tmi.twitch.tv RECONNECT\r\n")
            .await
            .unwrap();
        let event = next_event(&mut events, |e| matches!(e, Event::Disconnected { .. })).await;
        assert!(matches!(event, Event::Disconnected { reason } if reason.contains("reconnect")));
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_sends_one_ping_per_silent_interval() {
        let (_handle, mut events, server) = spawn_client(ConnectConfig {
            capabilities: Vec::new(),
            ..Default::default()
        });
        let (server_read, _server_write) = tokio::io::split(server);
        let mut lines = BufReader::new(server_read).lines();
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("NICK"));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PING keepalive");
        // Nothing more until the timeout expires.
        assert!(timeout(Duration::from_secs(30), lines.next_line()).await.is_err());

        let reason = loop {
            match timeout(Duration::from_secs(120), events.recv()).await {
                Ok(Some(Event::Disconnected { reason })) => break reason,
                Ok(Some(_)) => continue,
                other => panic!("no disconnect: {other:?}"),
            }
        };
        assert_eq!(reason, "Ping timeout");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropping_every_handle_ends_the_connection() {
        let (handle, mut events, _server) = spawn_client(ConnectConfig::default());
        drop(handle);
        let closed = timeout(Duration::from_secs(5), async {
            while events.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let cfg = ReconnectConfig::default();
        let next = cfg.next_delay(cfg.initial_delay);
        assert!(next >= Duration::from_secs(4));
        assert!(next <= Duration::from_secs(5));
        assert_eq!(cfg.next_delay(Duration::from_secs(60)), cfg.max_delay);
    }
}
