//! Per-client activity bookkeeping.
//!
//! [`ActivityStore`] maps a client identifier to its [`ClientActivity`] behind a
//! single reader/writer lock. Every mutation takes the write lock for one
//! uninterrupted step; [`ActivityStore::len`] takes the read lock.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Request counter and last-activity timestamp for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientActivity {
    request_count: u64,
    last_seen: Instant,
}

impl ClientActivity {
    /// Requests seen in the current interval, denied ones included.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Time of the most recent request.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// In-memory client activity store.
#[derive(Debug, Default)]
pub struct ActivityStore {
    clients: RwLock<HashMap<String, ClientActivity>>,
}

impl ActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `client` at `now` and return the updated count.
    ///
    /// The record is created on first use.
    pub fn record(&self, client: &str, now: Instant) -> u64 {
        let mut clients = self.write();
        if let Some(activity) = clients.get_mut(client) {
            activity.request_count = activity.request_count.saturating_add(1);
            activity.last_seen = now;
            return activity.request_count;
        }
        clients.insert(client.to_owned(), ClientActivity { request_count: 1, last_seen: now });
        1
    }

    /// Zero every client's request count, leaving `last_seen` untouched.
    ///
    /// Returns the number of records visited.
    pub fn reset_counts(&self) -> usize {
        let mut clients = self.write();
        for activity in clients.values_mut() {
            activity.request_count = 0;
        }
        clients.len()
    }

    /// Remove every client idle for at least `timeout` as of `now`.
    ///
    /// Returns the number of records removed.
    pub fn evict_idle(&self, now: Instant, timeout: Duration) -> usize {
        let mut clients = self.write();
        let before = clients.len();
        clients.retain(|_, activity| now.saturating_duration_since(activity.last_seen) < timeout);
        before - clients.len()
    }

    /// Snapshot of one client's record.
    pub fn get(&self, client: &str) -> Option<ClientActivity> {
        self.read().get(client).copied()
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every write leaves the map consistent, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ClientActivity>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ClientActivity>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }
}
