//! Chat replies.
//!
//! All user-facing text the bot posts is built here so the wording stays
//! consistent between the command paths.

use crate::membership::{MembershipRequest, Operation, Outcome};
use crate::router::BlacklistRequest;

/// Reply for a finished blacklist toggle.
pub fn blacklist_reply(request: &BlacklistRequest, succeeded: bool) -> String {
    let name = &request.username;
    match (request.status, succeeded) {
        (true, true) => format!("{name} has been blacklisted from your channel."),
        (true, false) => format!("Failed to blacklist {name}."),
        (false, true) => format!("{name} has been removed from your channels blacklist."),
        (false, false) => format!("Failed to unblacklist {name}."),
    }
}

/// Reply for a membership request's outcome.
pub fn membership_reply(request: &MembershipRequest, outcome: &Outcome) -> String {
    let name = &request.target;
    match (request.operation, outcome, request.forced) {
        (Operation::Join, Outcome::Applied, false) => format!("Joined {name}'s channel!"),
        (Operation::Join, Outcome::Applied, true) => format!("Force Joined {name}'s channel!"),
        (Operation::Join, Outcome::AlreadyInState, false) => {
            format!("Already in {name}'s channel.")
        }
        (Operation::Join, Outcome::AlreadyInState, true) => {
            format!("Already in {name}'s channel or invalid channel.")
        }
        (Operation::Join, Outcome::Failed(_), _) => format!("Failed to join {name}'s channel."),
        (Operation::Leave, Outcome::Applied, _) => format!("Left {name}'s channel!"),
        (Operation::Leave, Outcome::AlreadyInState, false) => {
            format!("Not in {name}'s channel.")
        }
        (Operation::Leave, Outcome::AlreadyInState, true) => {
            format!("Not in {name}'s channel or invalid channel.")
        }
        (Operation::Leave, Outcome::Failed(_), _) => format!("Failed to leave {name}'s channel."),
    }
}

/// Reply when a sender lacks permission for a recognised command.
pub fn denial_reply(sender: &str, command: &str) -> String {
    format!("@{sender}, you are not allowed to use {command}.")
}

/// Wrap text into lines of max_len, breaking on word boundaries.
pub fn wrap_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut result = Vec::new();
    for line in text.lines() {
        if line.len() <= max_len {
            result.push(line.to_string());
        } else {
            let mut current = String::new();
            for word in line.split_whitespace().flat_map(|w| split_word(w, max_len)) {
                if !current.is_empty() && current.len() + word.len() + 1 > max_len {
                    result.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            if !current.is_empty() {
                result.push(current);
            }
        }
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

/// Cut a word longer than `max_len` bytes into pieces on char boundaries.
fn split_word(word: &str, max_len: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = word;
    while rest.len() > max_len {
        let mut cut = max_len;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    pieces.push(rest);
    pieces
}
