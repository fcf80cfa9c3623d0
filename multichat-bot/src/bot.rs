//! Dispatch of chat events to commands.

use std::sync::Arc;

use multichat_sdk::event::Event;
use tokio::sync::mpsc;

use crate::authority::RemoteAuthority;
use crate::membership::MembershipCoordinator;
use crate::output::{blacklist_reply, denial_reply};
use crate::permission::Sender;
use crate::router::{Action, BlacklistRequest, CommandRouter};
use crate::session::ChatSession;
use crate::supervisor::Control;

pub struct Bot {
    nick: String,
    router: CommandRouter,
    authority: Arc<dyn RemoteAuthority>,
    coordinator: MembershipCoordinator,
    session: Arc<dyn ChatSession>,
    control: mpsc::UnboundedSender<Control>,
}

impl Bot {
    pub fn new(
        nick: &str,
        router: CommandRouter,
        authority: Arc<dyn RemoteAuthority>,
        coordinator: MembershipCoordinator,
        session: Arc<dyn ChatSession>,
        control: mpsc::UnboundedSender<Control>,
    ) -> Self {
        Self {
            nick: nick.to_lowercase(),
            router,
            authority,
            coordinator,
            session,
            control,
        }
    }

    /// Route a channel message and run each resulting action on its own
    /// task. Returns the spawned tasks; callers in `main` drop them.
    pub fn handle_event(self: &Arc<Self>, event: &Event) -> Vec<tokio::task::JoinHandle<()>> {
        let Event::Message {
            from,
            target,
            text,
            tags,
        } = event
        else {
            return Vec::new();
        };
        if !target.starts_with('#') || from.eq_ignore_ascii_case(&self.nick) {
            return Vec::new();
        }

        let sender = Sender::from_tags(from, tags);
        self.router
            .route(target, &sender, text.trim())
            .into_iter()
            .map(|action| {
                let bot = Arc::clone(self);
                tokio::spawn(async move { bot.execute(action).await })
            })
            .collect()
    }

    pub async fn execute(&self, action: Action) {
        match action {
            Action::Blacklist(request) => self.blacklist(request).await,
            Action::Membership(request) => match self.coordinator.apply(&request).await {
                Ok(outcome) => {
                    tracing::debug!(channel = %request.target, ?outcome, "Membership request done")
                }
                Err(e) => {
                    tracing::error!(error = %e, channel = %request.target, "Channel list unusable");
                    let _ = self.control.send(Control::Fatal(e.to_string()));
                }
            },
            Action::Denied {
                channel,
                sender,
                command,
            } => self.reply(&channel, &denial_reply(&sender, command)).await,
        }
    }

    async fn blacklist(&self, request: BlacklistRequest) {
        let result = self
            .authority
            .set_blacklist(&request.username, &request.channel, request.status)
            .await;
        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                user = %request.username,
                channel = %request.channel,
                status = request.status,
                "Error updating blacklist"
            );
        }
        self.reply(&request.channel, &blacklist_reply(&request, result.is_ok()))
            .await;
    }

    async fn reply(&self, channel: &str, text: &str) {
        if let Err(e) = self.session.say(channel, text).await {
            tracing::warn!(error = %e, channel, "Could not send reply");
        }
    }
}
