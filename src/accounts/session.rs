use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use super::store::User;

/// Opaque bearer token handed to clients after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait SessionStore: Send + Sync {
    /// Start a session for `user` and return its token.
    fn set(&self, user: &User) -> SessionToken;

    fn get(&self, token: &str) -> Option<User>;

    fn invalidate(&self, token: &str);
}

#[derive(Debug)]
struct SessionEntry {
    user: User,
    last_seen: DateTime<Utc>,
}

/// Server-side token map with an idle timeout.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    idle_timeout: Option<Duration>,
}

impl InMemorySessionStore {
    /// `idle_timeout` of `None` keeps sessions until logout.
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<User> {
        let mut entry = self.sessions.get_mut(token)?;
        if let Some(timeout) = self.idle_timeout {
            if now - entry.last_seen > timeout {
                drop(entry);
                self.sessions.remove(token);
                return None;
            }
        }
        entry.last_seen = now;
        Some(entry.user.clone())
    }

    fn set_at(&self, user: &User, now: DateTime<Utc>) -> SessionToken {
        self.sweep(now);
        let token = SessionToken::generate();
        self.sessions.insert(
            token.as_str().to_string(),
            SessionEntry {
                user: user.clone(),
                last_seen: now,
            },
        );
        token
    }

    /// Drop every session idle for longer than the timeout.
    fn sweep(&self, now: DateTime<Utc>) {
        if let Some(timeout) = self.idle_timeout {
            self.sessions.retain(|_, entry| now - entry.last_seen <= timeout);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn set(&self, user: &User) -> SessionToken {
        self.set_at(user, Utc::now())
    }

    fn get(&self, token: &str) -> Option<User> {
        self.get_at(token, Utc::now())
    }

    fn invalidate(&self, token: &str) {
        self.sessions.remove(token);
    }
}
