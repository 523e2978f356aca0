//! Per-client login throttling with a bounded table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::foundation::config::ThrottleConfig;
use crate::foundation::error::CacheResult;

#[derive(Clone, Copy, Debug)]
struct Entry {
    failures: u32,
    locked_until: Option<Instant>,
    last_seen: Instant,
}

/// Counts failed logins per client and locks a client out once it reaches the limit.
///
/// Expired lockouts and idle entries are dropped on every check. When the table is full, the
/// least recently seen client is forgotten to make room.
#[derive(Debug)]
pub struct LoginThrottle {
    cfg: ThrottleConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LoginThrottle {
    pub fn new(cfg: ThrottleConfig) -> CacheResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.cfg
    }

    /// Whether `client` may attempt a login now.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut entries = self.lock();
        self.evict_stale(&mut entries, now);
        match entries.get(client) {
            None => true,
            Some(e) if e.locked_until.is_some_and(|until| now < until) => false,
            Some(e) => e.failures < self.cfg.max_attempts,
        }
    }

    /// Record the result of a login attempt. Success forgets the client.
    pub fn record(&self, client: &str, success: bool) {
        self.record_at(client, success, Instant::now());
    }

    pub fn record_at(&self, client: &str, success: bool, now: Instant) {
        let mut entries = self.lock();
        if success {
            entries.remove(client);
            return;
        }

        if !entries.contains_key(client) && entries.len() >= self.cfg.max_entries {
            evict_least_recent(&mut entries);
        }
        let entry = entries.entry(client.to_string()).or_insert(Entry {
            failures: 0,
            locked_until: None,
            last_seen: now,
        });
        entry.failures = entry.failures.saturating_add(1);
        entry.last_seen = now;
        if entry.failures >= self.cfg.max_attempts && entry.locked_until.is_none() {
            entry.locked_until = Some(now + self.cfg.lockout);
            tracing::warn!(client, failures = entry.failures, "client locked out");
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn evict_stale(&self, entries: &mut HashMap<String, Entry>, now: Instant) {
        let idle = self.cfg.lockout;
        entries.retain(|_, e| match e.locked_until {
            Some(until) => now < until,
            None => now.saturating_duration_since(e.last_seen) < idle,
        });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn evict_least_recent(entries: &mut HashMap<String, Entry>) {
    let oldest = entries
        .iter()
        .min_by_key(|(_, e)| e.last_seen)
        .map(|(k, _)| k.clone());
    if let Some(k) = oldest {
        tracing::debug!(client = %k, "throttle table full, evicting");
        entries.remove(&k);
    }
}

#[cfg(test)]
#[path = "../tests/unit/throttle.rs"]
mod tests;
