//! Who may run which command.

use std::collections::HashMap;

use crate::channels::normalize;

/// Ordered: `Viewer < Moderator < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    Viewer,
    Moderator,
    Owner,
}

/// The author of one chat line, derived from its tags. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub username: String,
    pub broadcaster: bool,
    pub moderator: bool,
}

impl Sender {
    /// Build from the prefix nick and the Twitch `badges` / `mod` tags.
    pub fn from_tags(from: &str, tags: &HashMap<String, String>) -> Self {
        let badges = tags.get("badges").map(String::as_str).unwrap_or("");
        let has_badge = |name: &str| {
            badges
                .split(',')
                .filter_map(|b| b.split('/').next())
                .any(|b| b == name)
        };
        Self {
            username: from.to_lowercase(),
            broadcaster: has_badge("broadcaster"),
            moderator: tags.get("mod").is_some_and(|v| v == "1") || has_badge("moderator"),
        }
    }
}

/// Moderator: moderator or broadcaster of the channel the line arrived on.
/// Owner: the configured owner, and only inside the bot's own channel.
#[derive(Debug, Clone)]
pub struct PermissionModel {
    owner: String,
    home: String,
}

impl PermissionModel {
    pub fn new(owner: &str, home: &str) -> Self {
        Self {
            owner: normalize(owner),
            home: normalize(home),
        }
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn is_home(&self, channel: &str) -> bool {
        normalize(channel) == self.home
    }

    pub fn classify(&self, sender: &Sender, channel: &str) -> PermissionLevel {
        if self.is_home(channel) && !self.owner.is_empty() && normalize(&sender.username) == self.owner
        {
            PermissionLevel::Owner
        } else if sender.moderator || sender.broadcaster {
            PermissionLevel::Moderator
        } else {
            PermissionLevel::Viewer
        }
    }
}
