//! Durable list of channels the bot joins on startup.
//!
//! Stored as a pretty-printed JSON array of bare channel names
//! (`["multibot", "alice"]`). The bot's own channel is always present.
//! Every mutation re-reads the file so a hand edit between commands is
//! never clobbered.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Persistence failure. Not recovered: callers treat it as fatal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("channel store I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel store {} is not a JSON list of names: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Canonical storage form: no `#`, lowercase.
pub fn normalize(name: &str) -> String {
    name.trim().trim_start_matches('#').to_lowercase()
}

/// Wire form used for JOIN/PRIVMSG targets.
pub fn display(name: &str) -> String {
    format!("#{}", normalize(name))
}

pub struct ChannelStore {
    path: PathBuf,
    home: String,
    lock: Mutex<()>,
}

impl ChannelStore {
    /// Open the store at `path`, creating it as `[home]` on first run.
    pub fn open(path: impl Into<PathBuf>, home: &str) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            home: normalize(home),
            lock: Mutex::new(()),
        };
        if !store.path.exists() {
            tracing::info!(path = %store.path.display(), "Creating channel list");
            store.write_unlocked(std::slice::from_ref(&store.home))?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bot's own channel, which can never be removed.
    pub fn home(&self) -> &str {
        &self.home
    }

    /// Current channel list in stored order.
    pub fn load(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock();
        self.read_unlocked()
    }

    /// Replace the whole list. Duplicates are dropped and the home channel
    /// is appended if missing.
    pub fn save(&self, channels: &[String]) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let cleaned = self.clean(channels.iter().map(String::as_str));
        self.write_unlocked(&cleaned)
    }

    /// Append `name` unless already present. Returns whether the list changed.
    pub fn add(&self, name: &str) -> Result<bool, StoreError> {
        let name = normalize(name);
        if name.is_empty() {
            return Ok(false);
        }
        let _guard = self.lock.lock();
        let mut channels = self.read_unlocked()?;
        if channels.contains(&name) {
            return Ok(false);
        }
        channels.push(name);
        self.write_unlocked(&channels)?;
        Ok(true)
    }

    /// Remove `name`. The home channel is never removed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let name = normalize(name);
        if name == self.home {
            return Ok(false);
        }
        let _guard = self.lock.lock();
        let mut channels = self.read_unlocked()?;
        let before = channels.len();
        channels.retain(|c| *c != name);
        if channels.len() == before {
            return Ok(false);
        }
        self.write_unlocked(&channels)?;
        Ok(true)
    }

    fn clean<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in names.map(normalize) {
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        if !out.contains(&self.home) {
            out.push(self.home.clone());
        }
        out
    }

    fn read_unlocked(&self) -> Result<Vec<String>, StoreError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let stored: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        let channels = self.clean(stored.iter().map(String::as_str));
        if channels != stored {
            tracing::debug!(path = %self.path.display(), "Rewriting normalized channel list");
            self.write_unlocked(&channels)?;
        }
        Ok(channels)
    }

    fn write_unlocked(&self, channels: &[String]) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(channels).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}
