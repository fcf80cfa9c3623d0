//! Messages pushed into chat by the external authority over HTTP.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::session::{ChatSession, SendError};

#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Message is required")]
    MissingMessage,

    #[error("Channel is required")]
    MissingChannel,

    #[error("Failed to send message")]
    Send(#[source] SendError),
}

pub struct OutboundMessageService {
    secret: String,
    session: Arc<dyn ChatSession>,
}

impl OutboundMessageService {
    pub fn new(secret: &str, session: Arc<dyn ChatSession>) -> Self {
        Self {
            secret: secret.to_string(),
            session,
        }
    }

    /// Checks run in order: credential, message, channel. Empty strings count
    /// as absent. The channel is passed to the session as given.
    pub async fn send(
        &self,
        credential: Option<&str>,
        channel: Option<&str>,
        message: Option<&str>,
    ) -> Result<(), OutboundError> {
        let authorized = credential
            .is_some_and(|key| bool::from(key.as_bytes().ct_eq(self.secret.as_bytes())));
        if !authorized {
            return Err(OutboundError::Unauthorized);
        }
        let message = message
            .filter(|m| !m.is_empty())
            .ok_or(OutboundError::MissingMessage)?;
        let channel = channel
            .filter(|c| !c.is_empty())
            .ok_or(OutboundError::MissingChannel)?;

        self.session
            .say(channel, message)
            .await
            .map_err(OutboundError::Send)?;
        tracing::debug!(channel, "Outbound message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSession;

    fn service(session: Arc<FakeSession>) -> OutboundMessageService {
        OutboundMessageService::new("s3cret", session)
    }

    #[tokio::test]
    async fn wrong_or_missing_key_never_sends() {
        let session = Arc::new(FakeSession::joined(&["#foo"]));
        let svc = service(session.clone());
        assert!(matches!(
            svc.send(Some("nope"), Some("#foo"), Some("hi")).await,
            Err(OutboundError::Unauthorized)
        ));
        assert!(matches!(
            svc.send(None, Some("#foo"), Some("hi")).await,
            Err(OutboundError::Unauthorized)
        ));
        assert!(session.said().is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let session = Arc::new(FakeSession::joined(&["#foo"]));
        let svc = service(session.clone());
        assert!(matches!(
            svc.send(Some("s3cret"), Some("#foo"), None).await,
            Err(OutboundError::MissingMessage)
        ));
        assert!(matches!(
            svc.send(Some("s3cret"), Some(""), Some("hi")).await,
            Err(OutboundError::MissingChannel)
        ));
        assert!(session.said().is_empty());
    }

    #[tokio::test]
    async fn forwards_exact_arguments() {
        let session = Arc::new(FakeSession::joined(&["#foo"]));
        let svc = service(session.clone());
        svc.send(Some("s3cret"), Some("#foo"), Some("hi")).await.unwrap();
        assert_eq!(session.said(), vec![("#foo".to_string(), "hi".to_string())]);
    }

    #[tokio::test]
    async fn session_failure_is_reported() {
        let session = Arc::new(FakeSession::disconnected());
        let svc = service(session);
        assert!(matches!(
            svc.send(Some("s3cret"), Some("#foo"), Some("hi")).await,
            Err(OutboundError::Send(SendError::NotConnected))
        ));
    }
}
