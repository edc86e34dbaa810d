// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Insertion-ordered pending-request tracking used to correlate upstream
//! replies back to the downstream requests that triggered them.

use indexmap::IndexMap;

use crate::endpoint::{Endpoint, Triple};

/// Entries older than this are considered stale and evicted before every
/// lookup (spec.md §3: "no two entries share an endpoint value; every lookup
/// runs cache-eviction of entries older than 5s first").
const STALE_AFTER_SECS: u64 = 5;

/// Sent-but-unanswered upstream requests, insertion-ordered so replies can be
/// correlated newest-first.
#[derive(Default)]
pub struct PendingQueue {
    entries: IndexMap<Endpoint, u64>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Drop entries enqueued more than [`STALE_AFTER_SECS`] ago.
    pub fn evict_stale(&mut self, now: u64) {
        self.entries.retain(|_, enqueued_at| now.saturating_sub(*enqueued_at) < STALE_AFTER_SECS);
    }

    /// Evict stale entries, drop any existing entry for the same endpoint,
    /// then insert `endpoint` at the tail.
    pub fn insert(&mut self, endpoint: Endpoint, now: u64) {
        self.evict_stale(now);
        self.entries.shift_remove(&endpoint);
        self.entries.insert(endpoint, now);
    }

    /// Evict stale entries, then scan newest-to-oldest for the first entry
    /// whose endpoint is not binary-expecting and matches `triple` as a
    /// pattern. Removes and returns it.
    pub fn take_text_match(&mut self, triple: &Triple<'_>, now: u64) -> Option<Endpoint> {
        self.evict_stale(now);
        let index = self
            .entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (endpoint, _))| !endpoint.expect_binary() && endpoint.matches(triple))
            .map(|(index, _)| index)?;
        self.entries.shift_remove_index(index).map(|(endpoint, _)| endpoint)
    }

    /// Evict stale entries, then scan newest-to-oldest for the first
    /// binary-expecting entry. Removes and returns it.
    pub fn take_binary_match(&mut self, now: u64) -> Option<Endpoint> {
        self.evict_stale(now);
        let index = self
            .entries
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (endpoint, _))| endpoint.expect_binary())
            .map(|(index, _)| index)?;
        self.entries.shift_remove_index(index).map(|(endpoint, _)| endpoint)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_entry_for_same_endpoint() {
        let mut q = PendingQueue::new();
        q.insert(Endpoint::parse("/presentation/slide/list"), 100);
        q.insert(Endpoint::parse("/presentation/slide/list"), 101);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn stale_entries_are_evicted_on_lookup() {
        let mut q = PendingQueue::new();
        q.insert(Endpoint::parse("/presentation/slide/list"), 0);
        assert_eq!(q.len(), 1);
        q.evict_stale(10);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn text_match_scans_newest_first() {
        let mut q = PendingQueue::new();
        q.insert(Endpoint::parse("/presentation/slide/list"), 0);
        q.insert(Endpoint::parse("/presentation/slide"), 0);
        q.insert(Endpoint::parse("/presentation/slide/list"), 1);

        let triple =
            Triple { resource: "presentation", action: Some("slide"), identifier: Some("list") };
        let matched = q.take_text_match(&triple, 1).expect("should match");
        assert_eq!(matched.url(), "/presentation/slide/list");
        // The newest of the two identical candidates was removed, one remains.
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn binary_insulation_skips_text_pending() {
        let mut q = PendingQueue::new();
        q.insert(Endpoint::parse("/presentation/slide/list"), 0);
        let triple =
            Triple { resource: "presentation", action: Some("slide"), identifier: Some("list") };
        assert!(q.take_text_match(&triple, 0).is_some());

        let mut q2 = PendingQueue::new();
        q2.insert(Endpoint::parse("/presentation/slide/1/image"), 0);
        assert!(q2.take_binary_match(0).is_some());
        assert_eq!(q2.len(), 0);
    }

    #[test]
    fn text_lookup_never_matches_binary_expecting_entry() {
        let mut q = PendingQueue::new();
        q.insert(Endpoint::parse("/presentation/slide/1/image"), 0);
        let triple = Triple { resource: "presentation", action: Some("slide"), identifier: Some("1") };
        assert!(q.take_text_match(&triple, 0).is_none());
    }
}
