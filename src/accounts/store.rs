use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::AccountError;

/// Salted SHA-256 digest of a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: [u8; 16],
    digest: [u8; 32],
}

impl PasswordHash {
    pub fn new(password: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, password);
        Self { salt, digest }
    }

    pub fn verify(&self, password: &str) -> bool {
        let candidate = Self::digest(&self.salt, password);
        // constant time over the digest length
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    /// `None` for accounts created through Google sign-in.
    pub password: Option<PasswordHash>,
    pub created_at: DateTime<Utc>,
}

/// The part of a user that is returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

pub trait UserStore: Send + Sync {
    fn exists(&self, email: &str) -> bool;

    fn save(&self, user: NewUser) -> Result<User, AccountError>;

    /// Returns the user when the credentials match.
    fn login(&self, email: &str, password: &str) -> Option<User>;

    fn get_by_email(&self, email: &str) -> Option<User>;
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug)]
pub struct InMemoryUserStore {
    users: DashMap<String, User>,
    next_id: AtomicU64,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for InMemoryUserStore {
    fn exists(&self, email: &str) -> bool {
        self.users.contains_key(&normalize_email(email))
    }

    fn save(&self, user: NewUser) -> Result<User, AccountError> {
        let email = normalize_email(&user.email);
        match self.users.entry(email.clone()) {
            Entry::Occupied(_) => Err(AccountError::EmailTaken(email)),
            Entry::Vacant(slot) => {
                let saved = User {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    name: user.name,
                    email,
                    password: user.password.as_deref().map(PasswordHash::new),
                    created_at: Utc::now(),
                };
                slot.insert(saved.clone());
                Ok(saved)
            }
        }
    }

    fn login(&self, email: &str, password: &str) -> Option<User> {
        let user = self.users.get(&normalize_email(email))?;
        match &user.password {
            Some(hash) if hash.verify(password) => Some(user.clone()),
            _ => None,
        }
    }

    fn get_by_email(&self, email: &str) -> Option<User> {
        self.users
            .get(&normalize_email(email))
            .map(|user| user.clone())
    }
}
