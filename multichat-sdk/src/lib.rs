//! multichat-sdk: a small IRC client for Twitch-style chat networks.
//!
//! - [`client`]: connection, registration, keepalive, command handle
//! - [`event`]: events emitted to the consumer
//! - [`irc`]: line parsing and serialization with IRCv3 tags

pub mod client;
pub mod event;
pub mod irc;
