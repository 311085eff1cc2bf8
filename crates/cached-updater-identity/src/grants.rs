//! Short-lived record of tokens the provider accepted for user reads.
//!
//! Entries are keyed by a salted hash of the realm and token, never the token
//! itself. The salt is drawn per instance, so colliding keys cannot be
//! prepared offline. Expired entries are dropped whenever a new grant is
//! recorded.

use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};

/// How long an accepted token is trusted without asking the provider again.
pub const DEFAULT_GRANT_TTL: Duration = Duration::seconds(30);

pub struct TokenGrants {
    ttl: Duration,
    hasher: RandomState,
    deadlines: RwLock<HashMap<u64, OffsetDateTime>>,
}

impl TokenGrants {
    /// A zero or negative `ttl` records nothing, so every check goes to the
    /// provider.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            hasher: RandomState::new(),
            deadlines: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether `token` was accepted for `realm` within the last `ttl`.
    pub fn is_granted(&self, token: &str, realm: &str) -> bool {
        let key = self.key(token, realm);
        let now = OffsetDateTime::now_utc();
        self.deadlines
            .read()
            .get(&key)
            .is_some_and(|deadline| *deadline > now)
    }

    /// Records that the provider accepted `token` for `realm`.
    pub fn grant(&self, token: &str, realm: &str) {
        if !self.ttl.is_positive() {
            return;
        }
        let key = self.key(token, realm);
        let now = OffsetDateTime::now_utc();

        let mut deadlines = self.deadlines.write();
        deadlines.retain(|_, deadline| *deadline > now);
        deadlines.insert(key, now + self.ttl);
    }

    pub fn len(&self) -> usize {
        self.deadlines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, token: &str, realm: &str) -> u64 {
        self.hasher.hash_one((realm, token))
    }
}

impl std::fmt::Debug for TokenGrants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrants")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
