//! Joining and leaving user channels.
//!
//! A change is applied in a fixed order: check the live connection, ask the
//! authority, persist, announce, restart. The authority decides whether a
//! channel may be joined at all, so the channel list never records a
//! channel it rejected, and the live connection only changes after the
//! restart re-reads the list.

use std::sync::Arc;

use crate::authority::RemoteAuthority;
use crate::channels::{ChannelStore, StoreError};
use crate::output::membership_reply;
use crate::session::ChatSession;
use crate::supervisor::Restart;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Join,
    Leave,
}

/// A parsed `!join`/`!leave`/`!forcejoin`/`!forceleave`. Consumed
/// immediately, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRequest {
    /// Normalized channel name.
    pub target: String,
    pub requested_by: String,
    pub operation: Operation,
    /// Issued by the owner on someone else's behalf.
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Already joined (Join) or not joined (Leave). Nothing was changed.
    AlreadyInState,
    Failed(String),
}

pub struct MembershipCoordinator {
    store: Arc<ChannelStore>,
    authority: Arc<dyn RemoteAuthority>,
    session: Arc<dyn ChatSession>,
    restarter: Arc<dyn Restart>,
}

impl MembershipCoordinator {
    pub fn new(
        store: Arc<ChannelStore>,
        authority: Arc<dyn RemoteAuthority>,
        session: Arc<dyn ChatSession>,
        restarter: Arc<dyn Restart>,
    ) -> Self {
        Self {
            store,
            authority,
            session,
            restarter,
        }
    }

    /// Apply `request` and announce the outcome in the bot's own channel.
    ///
    /// Only persistence failures are returned as errors; authority failures
    /// become [`Outcome::Failed`] with the channel list untouched.
    pub async fn apply(&self, request: &MembershipRequest) -> Result<Outcome, StoreError> {
        let outcome = match request.operation {
            Operation::Join => self.join(request).await?,
            Operation::Leave => self.leave(request).await?,
        };

        let reply = membership_reply(request, &outcome);
        if let Err(e) = self.session.say(self.store.home(), &reply).await {
            tracing::warn!(error = %e, channel = %request.target, "Could not announce membership change");
        }

        if outcome == Outcome::Applied {
            self.restarter.restart().await;
        }
        Ok(outcome)
    }

    async fn join(&self, request: &MembershipRequest) -> Result<Outcome, StoreError> {
        let target = &request.target;
        if target.is_empty() || self.session.is_joined(target) {
            return Ok(Outcome::AlreadyInState);
        }
        if let Err(e) = self.authority.add_channel(target).await {
            tracing::error!(error = %e, channel = %target, user = %request.requested_by, "Error adding channel");
            return Ok(Outcome::Failed(e.to_string()));
        }
        self.store.add(target)?;
        tracing::info!(channel = %display(target), user = %request.requested_by, "Channel added");
        Ok(Outcome::Applied)
    }

    async fn leave(&self, request: &MembershipRequest) -> Result<Outcome, StoreError> {
        let target = &request.target;
        if target.is_empty() || !self.session.is_joined(target) {
            return Ok(Outcome::AlreadyInState);
        }
        if target == self.store.home() {
            return Ok(Outcome::Failed("the bot's own channel cannot be left".to_string()));
        }
        if let Err(e) = self.authority.remove_channel(target).await {
            tracing::error!(error = %e, channel = %target, user = %request.requested_by, "Error removing channel");
            return Ok(Outcome::Failed(e.to_string()));
        }
        self.store.remove(target)?;
        tracing::info!(channel = %display(target), user = %request.requested_by, "Channel removed");
        Ok(Outcome::Applied)
    }
}
