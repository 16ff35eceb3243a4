//! Registration, login and bearer-token sessions.
//!
//! Stores and the notifier are traits so deployments can swap the
//! in-memory implementations for persistent ones.

pub mod notify;
pub mod session;
pub mod store;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use notify::{LogNotifier, Notifier};
pub use session::{InMemorySessionStore, SessionStore, SessionToken};
pub use store::{InMemoryUserStore, NewUser, PasswordHash, User, UserProfile, UserStore};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Account {0} signs in with a password")]
    PasswordAccount(String),

    #[error("Notification failed: {0}")]
    Notification(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Idle minutes before a session token expires, 0 disables expiry.
    pub session_ttl_minutes: u64,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 30,
        }
    }
}

#[derive(Debug)]
pub enum RegisterOutcome {
    Registered(User),
    Exists,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            users,
            sessions,
            notifier,
        }
    }

    pub fn in_memory(config: &AccountsConfig) -> Self {
        let ttl = match config.session_ttl_minutes {
            0 => None,
            minutes => i64::try_from(minutes)
                .ok()
                .and_then(chrono::Duration::try_minutes),
        };
        Self::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemorySessionStore::new(ttl)),
            Arc::new(LogNotifier),
        )
    }

    pub fn register(&self, user: NewUser) -> Result<RegisterOutcome, AccountError> {
        if !is_valid_email(&user.email) {
            return Err(AccountError::InvalidEmail(user.email));
        }
        if self.users.exists(&user.email) {
            return Ok(RegisterOutcome::Exists);
        }
        match self.users.save(user) {
            Ok(saved) => {
                info!(user_id = saved.id, "User registered");
                Ok(RegisterOutcome::Registered(saved))
            }
            // lost a race with a concurrent registration
            Err(AccountError::EmailTaken(_)) => Ok(RegisterOutcome::Exists),
            Err(e) => Err(e),
        }
    }

    /// Password login. Sends a login notification on success.
    pub fn login(&self, email: &str, password: &str) -> Option<(SessionToken, User)> {
        let user = self.users.login(email, password)?;
        let token = self.sessions.set(&user);

        let body = format!("Hi {}, you have signed in to SmartSeva.", user.name);
        if let Err(e) = self.notifier.send(&user.email, "New sign-in", &body) {
            warn!(user_id = user.id, "Login notification failed: {}", e);
        }
        info!(user_id = user.id, "User logged in");
        Some((token, user))
    }

    /// Find or create the user behind an externally verified Google identity.
    ///
    /// Accounts registered with a password are refused, they must use `login`.
    pub fn google_auth(
        &self,
        email: &str,
        name: &str,
    ) -> Result<(SessionToken, User), AccountError> {
        if !is_valid_email(email) {
            return Err(AccountError::InvalidEmail(email.to_string()));
        }
        let user = match self.users.get_by_email(email) {
            Some(existing) if existing.password.is_some() => {
                warn!(user_id = existing.id, "Google sign-in refused for password account");
                return Err(AccountError::PasswordAccount(existing.email));
            }
            Some(existing) => existing,
            None => match self.users.save(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: None,
            }) {
                Ok(saved) => saved,
                Err(AccountError::EmailTaken(_)) => self
                    .users
                    .get_by_email(email)
                    .ok_or_else(|| AccountError::EmailTaken(email.to_string()))?,
                Err(e) => return Err(e),
            },
        };
        let token = self.sessions.set(&user);
        Ok((token, user))
    }

    pub fn current(&self, token: &str) -> Option<User> {
        self.sessions.get(token)
    }

    pub fn logout(&self, token: &str) {
        self.sessions.invalidate(token);
    }
}
