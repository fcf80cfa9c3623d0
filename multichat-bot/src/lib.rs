//! multichat-bot: Twitch chat bot for a multi-channel web chat.
//!
//! Joins the channels of users who opt in from the bot's own channel,
//! forwards moderator blacklist commands to the web service, and accepts
//! outbound messages from it over HTTP:
//!
//!   !join / !leave                  (bot's channel, anyone)
//!   !forcejoin / !forceleave <chan> (bot's channel, owner)
//!   !blacklist / !unblacklist <user> (any channel, moderators)

pub mod authority;
pub mod bot;
pub mod channels;
pub mod config;
pub mod membership;
pub mod outbound;
pub mod output;
pub mod permission;
pub mod router;
pub mod runner;
pub mod session;
pub mod supervisor;
pub mod web;

#[cfg(test)]
mod testing;
