// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL-indexed response cache, keyed by parsed endpoint.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::endpoint::{Endpoint, Triple};

/// Default TTL applied to presentation status pushes.
const STATUS_TTL: Duration = Duration::from_secs(5);
/// Default TTL applied to the presentation list.
const LIST_TTL: Duration = Duration::from_secs(5 * 60);
/// Default TTL applied to everything else.
const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// A cached reply body: either the raw XML text or a raw binary (image) frame.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
}

impl Payload {
    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }
}

struct CacheEntry {
    endpoint: Endpoint,
    expires_at: u64,
    payload: Payload,
}

/// TTL-indexed response cache. At most one entry per endpoint value; a later
/// `add` for the same endpoint replaces the earlier one and refreshes expiry.
pub struct ResponseCache {
    entries: HashMap<Endpoint, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Return the live payload stored under the endpoint whose `url` equals
    /// `url`, if any and unexpired. Does not evict on miss.
    pub fn get_by_url(&self, url: &str) -> Option<&Payload> {
        self.entries
            .values()
            .find(|entry| entry.endpoint.url() == url)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| &entry.payload)
    }

    /// Return the live payload stored under an endpoint matching the
    /// `(resource, action, identifier)` pattern, if any and unexpired.
    pub fn get_by_triple(&self, probe: &Triple<'_>) -> Option<&Payload> {
        self.entries
            .values()
            .find(|entry| entry.endpoint.matches(probe))
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| &entry.payload)
    }

    /// Insert or replace the entry for `endpoint`. `ttl` of `None` applies the
    /// per-endpoint-class default.
    pub fn add(&mut self, endpoint: Endpoint, payload: Payload, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| default_ttl(&endpoint));
        let expires_at = now_epoch_secs() + ttl.as_secs();
        self.entries.insert(endpoint.clone(), CacheEntry { endpoint, expires_at, payload });
    }

    /// Remove every entry whose expiry is not strictly in the future — an
    /// entry due exactly now is as purgeable as one overdue, matching
    /// `is_expired`'s "due now counts as expired" rule.
    pub fn purge(&mut self) {
        let now = now_epoch_secs();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.expires_at <= now_epoch_secs()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

fn default_ttl(endpoint: &Endpoint) -> Duration {
    if endpoint.resource() == Some("presentation") {
        match endpoint.action() {
            Some("status") => return STATUS_TTL,
            Some("list") if matches!(endpoint.identifier(), None | Some("list")) => {
                return LIST_TTL;
            }
            _ => {}
        }
    }
    DEFAULT_TTL
}

fn now_epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_by_url() {
        let mut cache = ResponseCache::new();
        let endpoint = Endpoint::parse("/presentation/status");
        cache.add(endpoint, Payload::Text("<x/>".into()), None);

        match cache.get_by_url("/presentation/status") {
            Some(Payload::Text(t)) => assert_eq!(t, "<x/>"),
            _ => panic!("expected text payload"),
        }
    }

    #[test]
    fn expired_entry_not_eagerly_deleted() {
        let mut cache = ResponseCache::new();
        let endpoint = Endpoint::parse("/presentation/status");
        cache.add(endpoint, Payload::Text("<x/>".into()), Some(Duration::from_secs(0)));

        // expires_at == now, which counts as due; get_by_url returns None...
        assert!(cache.get_by_url("/presentation/status").is_none());
        // ...but purge is the only thing that actually removes it.
        assert_eq!(cache.len(), 1);
        cache.purge();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn default_ttl_by_class() {
        assert_eq!(default_ttl(&Endpoint::parse("/presentation/status")), STATUS_TTL);
        assert_eq!(default_ttl(&Endpoint::parse("/presentation/list")), LIST_TTL);
        assert_eq!(default_ttl(&Endpoint::parse("/presentation/list/list")), LIST_TTL);
        assert_eq!(default_ttl(&Endpoint::parse("/presentation/list/123")), DEFAULT_TTL);
        assert_eq!(default_ttl(&Endpoint::parse("/song/list")), DEFAULT_TTL);
    }

    #[test]
    fn replace_refreshes_expiry() {
        let mut cache = ResponseCache::new();
        let endpoint = Endpoint::parse("/song/folders");
        cache.add(endpoint.clone(), Payload::Text("one".into()), Some(Duration::from_secs(100)));
        cache.add(endpoint, Payload::Text("two".into()), Some(Duration::from_secs(200)));

        assert_eq!(cache.len(), 1);
        match cache.get_by_url("/song/folders") {
            Some(Payload::Text(t)) => assert_eq!(t, "two"),
            _ => panic!("expected replacement payload"),
        }
    }

    #[test]
    fn get_by_triple_matches_pattern() {
        let mut cache = ResponseCache::new();
        cache.add(
            Endpoint::parse("/presentation/slide/123"),
            Payload::Text("<slide/>".into()),
            None,
        );

        let probe = Triple { resource: "presentation", action: Some("slide"), identifier: Some("123") };
        assert!(cache.get_by_triple(&probe).is_some());

        let miss = Triple { resource: "presentation", action: Some("slide"), identifier: Some("999") };
        assert!(cache.get_by_triple(&miss).is_none());
    }
}
