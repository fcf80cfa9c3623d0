//! Command line, environment and config file settings.
//!
//! Every key can come from a flag, its `MULTICHAT_*` environment variable
//! or the optional TOML file given with `--config`, in that order of
//! precedence.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::channels::normalize;
use crate::supervisor::RestartMode;

pub const DEFAULT_SERVER: &str = "irc.chat.twitch.tv:6697";
pub const DEFAULT_API_URL: &str = "https://randomtwitch.chat/api";
pub const DEFAULT_CHANNELS_FILE: &str = "channels.json";
pub const DEFAULT_PORT: &str = "3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("can't read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Parser)]
#[command(name = "multichat-bot", about = "Twitch chat bot bridging channels to a web chat")]
pub struct Cli {
    /// TOML file with defaults for any of the settings below
    #[arg(long, env = "MULTICHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// IRC server address (host:port)
    #[arg(long, env = "MULTICHAT_SERVER")]
    pub server: Option<String>,

    /// Bot account name; also the bot's own channel
    #[arg(long, env = "MULTICHAT_USERNAME")]
    pub username: Option<String>,

    /// OAuth token for the bot account
    #[arg(long, env = "MULTICHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Account allowed to force channel changes
    #[arg(long, env = "MULTICHAT_OWNER")]
    pub owner: Option<String>,

    /// Secret shared with the web service
    #[arg(long, env = "MULTICHAT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Base URL of the web service API
    #[arg(long, env = "MULTICHAT_API_URL")]
    pub api_url: Option<String>,

    /// Skip TLS certificate verification for the web service
    #[arg(
        long,
        env = "MULTICHAT_API_INSECURE",
        value_parser = clap::builder::BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub api_insecure: Option<bool>,

    /// Persisted channel list
    #[arg(long, env = "MULTICHAT_CHANNELS_FILE")]
    pub channels_file: Option<PathBuf>,

    /// HTTP listen address (default 0.0.0.0:$PORT)
    #[arg(long, env = "MULTICHAT_LISTEN")]
    pub listen: Option<String>,

    /// Shell command that restarts the process after a channel change.
    /// Without it the bot reconnects in-process.
    #[arg(long, env = "MULTICHAT_RESTART_COMMAND")]
    pub restart_command: Option<String>,
}

/// Contents of the `--config` file. Same keys as the flags.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
    pub owner: Option<String>,
    pub secret_key: Option<String>,
    pub api_url: Option<String>,
    pub api_insecure: Option<bool>,
    pub channels_file: Option<PathBuf>,
    pub listen: Option<String>,
    pub restart_command: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server: String,
    /// Normalized; doubles as the home channel.
    pub username: String,
    /// Always carries the `oauth:` prefix.
    pub token: String,
    pub owner: String,
    pub secret_key: String,
    pub api_url: String,
    pub api_insecure: bool,
    pub channels_file: PathBuf,
    pub listen: String,
    pub restart: RestartMode,
}

impl BotConfig {
    /// Merge flags/env over the file. `port` is the value of `$PORT`, used
    /// only when no listen address is set.
    pub fn resolve(
        cli: Cli,
        file: FileConfig,
        port: Option<String>,
    ) -> Result<Self, ConfigError> {
        let username = required("username", cli.username.or(file.username))?;
        let token = required("token", cli.token.or(file.token))?;
        let owner = required("owner", cli.owner.or(file.owner))?;
        let secret_key = required("secret_key", cli.secret_key.or(file.secret_key))?;

        let token = if token.starts_with("oauth:") {
            token
        } else {
            format!("oauth:{token}")
        };
        let listen = cli
            .listen
            .or(file.listen)
            .unwrap_or_else(|| format!("0.0.0.0:{}", port.as_deref().unwrap_or(DEFAULT_PORT)));
        let restart = match cli.restart_command.or(file.restart_command) {
            Some(cmd) if !cmd.trim().is_empty() => RestartMode::Command(cmd),
            _ => RestartMode::Reconnect,
        };

        Ok(Self {
            server: cli
                .server
                .or(file.server)
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            username: normalize(&username),
            token,
            owner: normalize(&owner),
            secret_key,
            api_url: cli
                .api_url
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_insecure: cli.api_insecure.or(file.api_insecure).unwrap_or(true),
            channels_file: cli
                .channels_file
                .or(file.channels_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHANNELS_FILE)),
            listen,
            restart,
        })
    }

    pub fn home(&self) -> &str {
        &self.username
    }
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}
