//! Events emitted by the IRC client for the bot layer to consume.

use std::collections::HashMap;

/// Events that the SDK emits to the consumer.
#[derive(Debug, Clone)]
pub enum Event {
    /// Transport is up; registration has been sent.
    Connected,

    /// IRC registration complete (`001`). `nick` is our confirmed nick.
    Registered {
        nick: String,
    },

    /// The server rejected our credentials.
    AuthFailed {
        reason: String,
    },

    /// Someone (possibly us) joined a channel.
    Joined {
        channel: String,
        nick: String,
    },

    /// Someone (possibly us) left a channel.
    Parted {
        channel: String,
        nick: String,
    },

    /// A message in a channel or a whisper.
    Message {
        from: String,
        target: String,
        text: String,
        /// IRCv3 message tags (badges, mod, display-name, ...).
        tags: HashMap<String, String>,
    },

    /// Server NOTICE or error numeric.
    ServerNotice {
        text: String,
    },

    /// Connection was closed.
    Disconnected {
        reason: String,
    },

    /// Raw server line (for debugging).
    RawLine(String),
}
