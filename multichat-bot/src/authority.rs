//! Client for the remote authority service.
//!
//! The authority owns the canonical blacklist and the record of which
//! channels the bot may be in. Every call is one authenticated POST; any
//! non-2xx status or transport error is a failure. Nothing is retried.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("authority request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authority rejected {endpoint} with {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Mutations the bot asks the authority to perform.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    async fn add_channel(&self, name: &str) -> Result<(), AuthorityError>;
    async fn remove_channel(&self, name: &str) -> Result<(), AuthorityError>;
    async fn set_blacklist(
        &self,
        username: &str,
        channel_name: &str,
        status: bool,
    ) -> Result<(), AuthorityError>;
}

#[derive(Serialize)]
struct ChannelBody<'a> {
    channel: &'a str,
    key: &'a str,
}

#[derive(Serialize)]
struct BlacklistBody<'a> {
    username: &'a str,
    key: &'a str,
    channel_name: &'a str,
    status: bool,
}

pub struct AuthorityClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl AuthorityClient {
    /// `accept_invalid_certs` disables TLS verification for authorities
    /// running on self-signed certificates.
    pub fn new(
        base_url: &str,
        key: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self, AuthorityError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), AuthorityError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.http.post(&url).json(body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AuthorityError::Status {
            endpoint: path.to_string(),
            status,
            body,
        })
    }
}

#[async_trait]
impl RemoteAuthority for AuthorityClient {
    async fn add_channel(&self, name: &str) -> Result<(), AuthorityError> {
        self.post("/channels/add", &ChannelBody { channel: name, key: &self.key })
            .await
    }

    async fn remove_channel(&self, name: &str) -> Result<(), AuthorityError> {
        self.post("/channels/remove", &ChannelBody { channel: name, key: &self.key })
            .await
    }

    async fn set_blacklist(
        &self,
        username: &str,
        channel_name: &str,
        status: bool,
    ) -> Result<(), AuthorityError> {
        let body = BlacklistBody {
            username,
            key: &self.key,
            channel_name,
            status,
        };
        self.post("/blacklist", &body).await
    }
}
