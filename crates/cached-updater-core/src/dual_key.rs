//! Record cache indexed by identifier and by email.
//!
//! Every [`DualKeyCache::put`] builds one entry with a fixed deadline and
//! installs it under both keys inside a single write-locked section, so a
//! reader never sees one index updated without the other. Entries expire
//! lazily: once the deadline has passed a lookup reports a miss, but the
//! entry stays in the map until a later `put` overwrites it.
//!
//! There are no reverse links between the two indexes. Writing a record
//! again under a new email leaves the old email entry in place until it
//! expires, and a record without an email is simply stored under `""`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};
use tracing::trace;

use crate::counter::SharedCounter;
use crate::events;

/// A cached record and the instant after which it is ignored.
#[derive(Debug)]
struct CacheEntry<V> {
    record: Arc<V>,
    deadline: OffsetDateTime,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.deadline > now
    }
}

struct DualIndex<V> {
    by_identifier: HashMap<String, Arc<CacheEntry<V>>>,
    by_email: HashMap<String, Arc<CacheEntry<V>>>,
}

/// Per-entry TTL cache with two independent lookup keys.
pub struct DualKeyCache<V> {
    ttl: Duration,
    counter: SharedCounter,
    index: RwLock<DualIndex<V>>,
}

impl<V> DualKeyCache<V> {
    /// Creates an empty cache whose entries live for `ttl`.
    ///
    /// `ttl` is signed: a negative value produces entries that are already
    /// expired when written.
    pub fn new(ttl: Duration, counter: SharedCounter) -> Self {
        Self {
            ttl,
            counter,
            index: RwLock::new(DualIndex {
                by_identifier: HashMap::new(),
                by_email: HashMap::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores `record` under both `identifier` and `email`.
    ///
    /// Empty keys are ordinary keys.
    pub fn put(&self, identifier: impl Into<String>, email: impl Into<String>, record: V) {
        let entry = Arc::new(CacheEntry {
            record: Arc::new(record),
            deadline: OffsetDateTime::now_utc() + self.ttl,
        });
        let identifier = identifier.into();
        let email = email.into();

        let mut index = self.index.write();
        index.by_identifier.insert(identifier, Arc::clone(&entry));
        index.by_email.insert(email, entry);
    }

    /// Looks a record up by identifier. Expired entries are misses.
    pub fn get_by_identifier(&self, identifier: &str) -> Option<Arc<V>> {
        let index = self.index.read();
        let found = lookup(&index.by_identifier, identifier);
        if found.is_some() {
            self.counter.increment(events::CACHE_GET_USER_BY_ID);
        } else {
            trace!(identifier, "User cache miss by identifier");
            self.counter.increment(events::CACHE_ERROR_GET_USER_BY_ID);
        }
        found
    }

    /// Looks a record up by email. Expired entries are misses.
    pub fn get_by_email(&self, email: &str) -> Option<Arc<V>> {
        let index = self.index.read();
        let found = lookup(&index.by_email, email);
        if found.is_some() {
            self.counter.increment(events::CACHE_GET_USER_BY_EMAIL);
        } else {
            trace!(email, "User cache miss by email");
            self.counter.increment(events::CACHE_ERROR_GET_USER_BY_EMAIL);
        }
        found
    }

    /// Number of identifier keys held, expired entries included.
    pub fn len_by_identifier(&self) -> usize {
        self.index.read().by_identifier.len()
    }

    /// Number of email keys held, expired entries included.
    pub fn len_by_email(&self) -> usize {
        self.index.read().by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        let index = self.index.read();
        index.by_identifier.is_empty() && index.by_email.is_empty()
    }
}

fn lookup<V>(map: &HashMap<String, Arc<CacheEntry<V>>>, key: &str) -> Option<Arc<V>> {
    map.get(key)
        .filter(|entry| entry.is_live(OffsetDateTime::now_utc()))
        .map(|entry| Arc::clone(&entry.record))
}

impl<V> std::fmt::Debug for DualKeyCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualKeyCache")
            .field("ttl", &self.ttl)
            .field("identifiers", &self.len_by_identifier())
            .field("emails", &self.len_by_email())
            .finish_non_exhaustive()
    }
}
