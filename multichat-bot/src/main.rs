//! multichat-bot binary: wires the chat connection, the HTTP surface and
//! the command handlers together, and keeps the connection alive.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use multichat_bot::authority::AuthorityClient;
use multichat_bot::bot::Bot;
use multichat_bot::channels::ChannelStore;
use multichat_bot::config::{BotConfig, Cli, FileConfig};
use multichat_bot::membership::MembershipCoordinator;
use multichat_bot::outbound::OutboundMessageService;
use multichat_bot::permission::PermissionModel;
use multichat_bot::router::CommandRouter;
use multichat_bot::runner::SessionRunner;
use multichat_bot::session::Session;
use multichat_bot::supervisor::{Control, ReconnectSupervisor};
use multichat_bot::web;
use multichat_sdk::client::ConnectConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs in production (MULTICHAT_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("MULTICHAT_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "multichat_bot=info,multichat_sdk=info".into());
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = BotConfig::resolve(cli, file, std::env::var("PORT").ok())?;

    let store = Arc::new(ChannelStore::open(&config.channels_file, config.home())?);
    tracing::info!(path = %store.path().display(), "Using channel list");
    let authority = Arc::new(AuthorityClient::new(
        &config.api_url,
        &config.secret_key,
        config.api_insecure,
    )?);
    if config.api_insecure {
        tracing::warn!(url = %config.api_url, "TLS verification disabled for the web service");
    }

    let session = Session::new();
    let chat = Arc::new(session.clone());
    let (supervisor, control_rx) = ReconnectSupervisor::new(chat.clone(), config.restart.clone());
    let control = supervisor.control();
    let shutdown = supervisor.control();
    let coordinator =
        MembershipCoordinator::new(store.clone(), authority.clone(), chat.clone(), Arc::new(supervisor));
    let bot = Arc::new(Bot::new(
        &config.username,
        CommandRouter::new(PermissionModel::new(&config.owner, config.home())),
        authority,
        coordinator,
        chat.clone(),
        control,
    ));

    let outbound = Arc::new(OutboundMessageService::new(&config.secret_key, chat));
    let listen = config.listen.clone();
    tokio::spawn(async move {
        if let Err(e) = web::serve(&listen, outbound).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(Control::Shutdown);
        }
    });

    let connect = ConnectConfig {
        server_addr: config.server.clone(),
        nick: config.username.clone(),
        password: Some(config.token.clone()),
        tls: config.server.ends_with(":6697"),
        ..Default::default()
    };
    SessionRunner::new(connect, store, session, bot)
        .run(control_rx)
        .await
}
