//! In-memory stand-ins for the chat connection, the authority and the
//! restart hook.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::authority::{AuthorityError, RemoteAuthority};
use crate::session::{ChatSession, SendError};
use crate::supervisor::Restart;

#[derive(Default)]
pub struct FakeSession {
    joined: Vec<String>,
    connected: bool,
    failing: AtomicBool,
    said: Mutex<Vec<(String, String)>>,
    quits: Mutex<Vec<String>>,
}

impl FakeSession {
    pub fn joined(channels: &[&str]) -> Self {
        Self {
            joined: channels.iter().map(|c| c.to_string()).collect(),
            connected: true,
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn said(&self) -> Vec<(String, String)> {
        self.said.lock().clone()
    }

    pub fn quits(&self) -> Vec<String> {
        self.quits.lock().clone()
    }
}

#[async_trait]
impl ChatSession for FakeSession {
    fn joined_channels(&self) -> Vec<String> {
        self.joined.clone()
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), SendError> {
        if !self.connected {
            return Err(SendError::NotConnected);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Closed("write failed".to_string()));
        }
        self.said.lock().push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn quit(&self, reason: &str) -> Result<(), SendError> {
        if !self.connected {
            return Err(SendError::NotConnected);
        }
        self.quits.lock().push(reason.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityCall {
    Add(String),
    Remove(String),
    Blacklist {
        username: String,
        channel: String,
        status: bool,
    },
}

#[derive(Default)]
pub struct FakeAuthority {
    fail: bool,
    calls: Mutex<Vec<AuthorityCall>>,
}

impl FakeAuthority {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<AuthorityCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: AuthorityCall) -> Result<(), AuthorityError> {
        self.calls.lock().push(call);
        if self.fail {
            Err(AuthorityError::Status {
                endpoint: "/fake".to_string(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "rejected".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteAuthority for FakeAuthority {
    async fn add_channel(&self, name: &str) -> Result<(), AuthorityError> {
        self.record(AuthorityCall::Add(name.to_string()))
    }

    async fn remove_channel(&self, name: &str) -> Result<(), AuthorityError> {
        self.record(AuthorityCall::Remove(name.to_string()))
    }

    async fn set_blacklist(
        &self,
        username: &str,
        channel_name: &str,
        status: bool,
    ) -> Result<(), AuthorityError> {
        self.record(AuthorityCall::Blacklist {
            username: username.to_string(),
            channel: channel_name.to_string(),
            status,
        })
    }
}

#[derive(Default)]
pub struct FakeRestart {
    count: AtomicUsize,
}

impl FakeRestart {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Restart for FakeRestart {
    async fn restart(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
