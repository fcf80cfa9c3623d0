//! Chat command parsing and authorization.
//!
//! Every line is matched once against a single command table. Each entry
//! carries its scope and the permission it needs, so the whole
//! authorization matrix lives in [`COMMANDS`]:
//!
//! | command        | scope       | needs        | subject    |
//! |----------------|-------------|--------------|------------|
//! | `!blacklist`   | any channel | Moderator    | argument   |
//! | `!unblacklist` | any channel | Moderator    | argument   |
//! | `!join`        | home only   | Viewer       | sender     |
//! | `!leave`       | home only   | Viewer       | sender     |
//! | `!forcejoin`   | home only   | Owner        | argument   |
//! | `!forceleave`  | home only   | Owner        | argument   |

use crate::channels::normalize;
use crate::membership::{MembershipRequest, Operation};
use crate::permission::{PermissionLevel, PermissionModel, Sender};

/// Where a command may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Any channel the bot is in.
    Moderation,
    /// Only the bot's own channel.
    Membership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Blacklist,
    Unblacklist,
    Join,
    Leave,
    ForceJoin,
    ForceLeave,
}

#[derive(Debug)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub token: &'static str,
    pub scope: Scope,
    pub required: PermissionLevel,
    pub takes_argument: bool,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Blacklist,
        token: "!blacklist",
        scope: Scope::Moderation,
        required: PermissionLevel::Moderator,
        takes_argument: true,
    },
    CommandSpec {
        kind: CommandKind::Unblacklist,
        token: "!unblacklist",
        scope: Scope::Moderation,
        required: PermissionLevel::Moderator,
        takes_argument: true,
    },
    CommandSpec {
        kind: CommandKind::Join,
        token: "!join",
        scope: Scope::Membership,
        required: PermissionLevel::Viewer,
        takes_argument: false,
    },
    CommandSpec {
        kind: CommandKind::Leave,
        token: "!leave",
        scope: Scope::Membership,
        required: PermissionLevel::Viewer,
        takes_argument: false,
    },
    CommandSpec {
        kind: CommandKind::ForceJoin,
        token: "!forcejoin",
        scope: Scope::Membership,
        required: PermissionLevel::Owner,
        takes_argument: true,
    },
    CommandSpec {
        kind: CommandKind::ForceLeave,
        token: "!forceleave",
        scope: Scope::Membership,
        required: PermissionLevel::Owner,
        takes_argument: true,
    },
];

/// A blacklist toggle for the authority service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistRequest {
    /// Target user, case preserved as typed.
    pub username: String,
    /// Channel the command was issued in, without `#`.
    pub channel: String,
    /// `true` to blacklist, `false` to lift it.
    pub status: bool,
}

/// What a chat line asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Blacklist(BlacklistRequest),
    Membership(MembershipRequest),
    /// A recognised command the sender may not use here.
    Denied {
        channel: String,
        sender: String,
        command: &'static str,
    },
}

pub struct CommandRouter {
    permissions: PermissionModel,
}

impl CommandRouter {
    pub fn new(permissions: PermissionModel) -> Self {
        Self { permissions }
    }

    pub fn permissions(&self) -> &PermissionModel {
        &self.permissions
    }

    /// Classify `raw` from `sender` in `channel`. Unknown commands, commands
    /// used outside their scope and invocations missing their argument
    /// yield nothing.
    pub fn route(&self, channel: &str, sender: &Sender, raw: &str) -> Vec<Action> {
        let mut words = raw.split_whitespace();
        let Some(first) = words.next() else {
            return Vec::new();
        };
        let Some(spec) = COMMANDS.iter().find(|c| c.token == first) else {
            return Vec::new();
        };
        let argument = words.next();
        if spec.takes_argument && argument.is_none() {
            return Vec::new();
        }
        if spec.scope == Scope::Membership && !self.permissions.is_home(channel) {
            return Vec::new();
        }

        let level = self.permissions.classify(sender, channel);
        if level < spec.required {
            tracing::debug!(
                channel,
                user = %sender.username,
                command = spec.token,
                ?level,
                "Command denied"
            );
            return vec![Action::Denied {
                channel: channel.to_string(),
                sender: sender.username.clone(),
                command: spec.token,
            }];
        }

        let argument = argument.unwrap_or_default();
        let action = match spec.kind {
            CommandKind::Blacklist | CommandKind::Unblacklist => {
                Action::Blacklist(BlacklistRequest {
                    username: argument.to_string(),
                    channel: channel.trim_start_matches('#').to_string(),
                    status: spec.kind == CommandKind::Blacklist,
                })
            }
            CommandKind::Join | CommandKind::Leave => Action::Membership(MembershipRequest {
                target: normalize(&sender.username),
                requested_by: sender.username.clone(),
                operation: operation_for(spec.kind),
                forced: false,
            }),
            CommandKind::ForceJoin | CommandKind::ForceLeave => {
                Action::Membership(MembershipRequest {
                    target: normalize(argument),
                    requested_by: sender.username.clone(),
                    operation: operation_for(spec.kind),
                    forced: true,
                })
            }
        };
        vec![action]
    }
}

fn operation_for(kind: CommandKind) -> Operation {
    match kind {
        CommandKind::Join | CommandKind::ForceJoin => Operation::Join,
        _ => Operation::Leave,
    }
}
