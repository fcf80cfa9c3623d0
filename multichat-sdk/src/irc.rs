//! IRC line codec with IRCv3 message tags.
//!
//! Twitch chat sends every PRIVMSG with a tag block (`@badges=...;mod=1 ...`),
//! so tags are parsed eagerly into a map. Values are unescaped on parse and
//! escaped again on serialization.

use std::collections::HashMap;
use std::fmt;

/// A single IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// IRCv3 tags (empty if the line had none).
    pub tags: HashMap<String, String>,
    /// Source prefix without the leading `:` (e.g. `nick!user@host`).
    pub prefix: Option<String>,
    /// Command word or three-digit numeric.
    pub command: String,
    /// Parameters, with the trailing parameter (if any) as the last entry.
    pub params: Vec<String>,
}

impl Message {
    /// Build a message with no tags or prefix.
    pub fn new(command: &str, params: Vec<String>) -> Self {
        Self {
            tags: HashMap::new(),
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Parse a raw line. Returns `None` for empty or command-less lines.
    pub fn parse(line: &str) -> Option<Message> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        if rest.is_empty() {
            return None;
        }

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (tag_block, remainder) = stripped.split_once(' ')?;
            for pair in tag_block.split(';').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((k, v)) => tags.insert(k.to_string(), unescape_tag_value(v)),
                    None => tags.insert(pair.to_string(), String::new()),
                };
            }
            rest = remainder.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, remainder) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = remainder.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, r)) => {
                    params.push(p.to_string());
                    rest = r;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Message {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick portion of the prefix (`nick` in `nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split(['!', '@']).next())
            .filter(|n| !n.is_empty())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_str("@")?;
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(key)?;
                let value = &self.tags[key];
                if !value.is_empty() {
                    f.write_str("=")?;
                    escape_tag_value(f, value)?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, init)) = self.params.split_last() {
            for p in init {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

fn escape_tag_value(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    use fmt::Write;
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Reverse IRCv3 tag escaping. A lone trailing backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_twitch_privmsg_with_tags() {
        let line = "@badges=broadcaster/1,subscriber/0;display-name=Alice;mod=0 \
                    :alice!alice@alice.tmi.twitch.tv PRIVMSG #alice :!blacklist troll\r\n";
        let msg = Message::parse(line).unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.nick(), Some("alice"));
        assert_eq!(msg.params, vec!["#alice", "!blacklist troll"]);
        assert_eq!(msg.tags["badges"], "broadcaster/1,subscriber/0");
        assert_eq!(msg.tags["mod"], "0");
    }

    #[test]
    fn parse_without_prefix_or_tags() {
        let msg = Message::parse("PING :tmi.twitch.tv").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn parse_numeric_with_middle_params() {
        let msg = Message::parse(":tmi.twitch.tv 001 multibot :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["multibot", "Welcome, GLHF!"]);
        assert_eq!(msg.nick(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn parse_rejects_empty_lines() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("\r\n").is_none());
        assert!(Message::parse(":prefix.only").is_none());
    }

    #[test]
    fn tag_values_are_unescaped() {
        let msg = Message::parse("@system-msg=hello\\sthere\\:x;flag :a!a@a NOTICE #c :hi").unwrap();
        assert_eq!(msg.tags["system-msg"], "hello there;x");
        assert_eq!(msg.tags["flag"], "");
    }

    #[test]
    fn unescape_drops_lone_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
        assert_eq!(unescape_tag_value("path\\\\file"), "path\\file");
    }

    #[test]
    fn display_uses_trailing_param_when_needed() {
        let msg = Message::new("PRIVMSG", vec!["#chan".into(), "hello world".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #chan :hello world");

        let msg = Message::new("JOIN", vec!["#chan".into()]);
        assert_eq!(msg.to_string(), "JOIN #chan");

        let msg = Message::new("PRIVMSG", vec!["#chan".into(), ":)".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #chan ::)");
    }

    #[test]
    fn display_escapes_tags_in_sorted_order() {
        let mut msg = Message::new("PRIVMSG", vec!["#c".into(), "x".into()]);
        msg.tags.insert("reply-parent-msg-id".into(), "a b".into());
        msg.tags.insert("client-nonce".into(), "n;1".into());
        assert_eq!(
            msg.to_string(),
            "@client-nonce=n\\:1;reply-parent-msg-id=a\\sb PRIVMSG #c x"
        );
    }
}
