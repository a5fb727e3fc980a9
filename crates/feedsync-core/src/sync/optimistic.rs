//! Speculative local inserts and their reconciliation against server data.
//!
//! An insert shows up in the visible list immediately; a later forced
//! refresh either confirms it (the authoritative copy replaces the local
//! one) or leaves it pending until it is marked failed or force-expired.
//! A failed entry stays visible with its reason until the user dismisses
//! it - nothing in this module silently drops a user's post.

use crate::config::SyncConfig;
use crate::models::{FeedItem, OptimisticEntry};
use uuid::Uuid;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Entries discarded in favor of a matching authoritative item.
    pub confirmed: Vec<Uuid>,
    /// Entries still pending after the pass.
    pub pending: usize,
}

pub struct OptimisticManager {
    entries: Vec<OptimisticEntry>,
    timeout_ms: i64,
    window_ms: i64,
}

impl OptimisticManager {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            entries: Vec::new(),
            timeout_ms: config.optimistic_timeout.as_millis() as i64,
            window_ms: config.reconcile_window.as_millis() as i64,
        }
    }

    /// Record a speculative insert. The item is flagged optimistic so it
    /// bypasses session dedup downstream.
    pub fn insert(&mut self, mut item: FeedItem, now_ms: i64) -> Uuid {
        item.optimistic = true;
        let entry = OptimisticEntry::new(item, now_ms);
        let id = entry.client_request_id;
        self.entries.push(entry);
        id
    }

    /// Attach the server id once the write call comes back. The entry is
    /// then dropped as soon as that id is observed in an authoritative page.
    pub fn acknowledge(&mut self, client_request_id: Uuid, server_id: impl Into<String>) -> bool {
        match self.find_mut(client_request_id) {
            Some(entry) => {
                entry.acknowledged = true;
                entry.server_id = Some(server_id.into());
                true
            }
            None => false,
        }
    }

    /// Match pending entries against a freshly fetched authoritative page.
    ///
    /// Acknowledged entries are confirmed by server id. Unacknowledged
    /// entries fall back to the two-factor heuristic: trimmed-body equality
    /// plus timestamp proximity within the configured window. The heuristic
    /// can mismatch two distinct posts with identical text created within
    /// the same window; a server-echoed client request id is the only
    /// airtight contract, hence `acknowledge`.
    pub fn reconcile(&mut self, authoritative: &[FeedItem]) -> ReconcileReport {
        let window_ms = self.window_ms;
        let mut report = ReconcileReport::default();
        self.entries.retain(|entry| {
            if entry.is_failed() {
                return true;
            }
            let confirmed = if let Some(server_id) = &entry.server_id {
                authoritative.iter().any(|item| &item.key.id == server_id)
            } else {
                authoritative
                    .iter()
                    .any(|item| heuristic_match(&entry.item, item, window_ms))
            };
            if confirmed {
                report.confirmed.push(entry.client_request_id);
                false
            } else {
                true
            }
        });
        report.pending = self.entries.iter().filter(|e| !e.is_failed()).count();
        report
    }

    /// Annotate an entry as visibly failed. It stays in the list until the
    /// user dismisses it.
    pub fn mark_failed(&mut self, client_request_id: Uuid, reason: impl Into<String>) -> bool {
        match self.find_mut(client_request_id) {
            Some(entry) => {
                entry.item.failed = Some(reason.into());
                true
            }
            None => false,
        }
    }

    /// Permanently delete a failed entry. The only deletion path for
    /// failed rows.
    pub fn dismiss(&mut self, client_request_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.client_request_id == client_request_id && e.is_failed()));
        before != self.entries.len()
    }

    /// Drop entries unacknowledged past the timeout so a crashed
    /// confirmation path cannot leave a row pending forever.
    pub fn expire_stale(&mut self, now_ms: i64) -> Vec<Uuid> {
        let timeout_ms = self.timeout_ms;
        let mut expired = Vec::new();
        self.entries.retain(|entry| {
            let stale = !entry.acknowledged
                && !entry.is_failed()
                && now_ms - entry.inserted_at_ms >= timeout_ms;
            if stale {
                tracing::warn!(id = %entry.client_request_id, "optimistic entry force-expired");
                expired.push(entry.client_request_id);
            }
            !stale
        });
        expired
    }

    /// Items to layer on top of the base list, newest insert first.
    pub fn visible_items(&self) -> Vec<FeedItem> {
        self.entries.iter().rev().map(|e| e.item.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_mut(&mut self, client_request_id: Uuid) -> Option<&mut OptimisticEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.client_request_id == client_request_id)
    }
}

fn heuristic_match(local: &FeedItem, candidate: &FeedItem, window_ms: i64) -> bool {
    let bodies_equal = match (&local.body, &candidate.body) {
        (Some(a), Some(b)) => a.trim() == b.trim(),
        _ => false,
    };
    if !bodies_equal {
        return false;
    }
    match (local.created_at_ms, candidate.created_at_ms) {
        (Some(a), Some(b)) => (a - b).abs() <= window_ms,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> OptimisticManager {
        OptimisticManager::new(&SyncConfig::default())
    }

    fn local_post(text: &str, at_ms: i64) -> FeedItem {
        FeedItem::new("post", "local")
            .with_body(text)
            .with_created_at_ms(at_ms)
    }

    fn server_post(id: &str, text: &str, at_ms: i64) -> FeedItem {
        FeedItem::new("post", id)
            .with_body(text)
            .with_created_at_ms(at_ms)
    }

    #[test]
    fn test_heuristic_confirms_within_window() {
        let mut mgr = manager();
        let id = mgr.insert(local_post("hello", 10_000), 10_000);

        let page = vec![server_post("srv-99", "  hello  ", 12_000)];
        let report = mgr.reconcile(&page);
        assert_eq!(report.confirmed, vec![id]);
        assert_eq!(report.pending, 0);
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_heuristic_rejects_outside_window() {
        let mut mgr = manager();
        mgr.insert(local_post("hello", 10_000), 10_000);

        // Same text, 6 seconds apart: not a match.
        let page = vec![server_post("srv-99", "hello", 16_000)];
        let report = mgr.reconcile(&page);
        assert!(report.confirmed.is_empty());
        assert_eq!(report.pending, 1);
    }

    #[test]
    fn test_heuristic_rejects_different_text() {
        let mut mgr = manager();
        mgr.insert(local_post("hello", 10_000), 10_000);

        let page = vec![server_post("srv-99", "goodbye", 10_000)];
        assert!(mgr.reconcile(&page).confirmed.is_empty());
    }

    #[test]
    fn test_acknowledged_entry_confirmed_by_server_id() {
        let mut mgr = manager();
        let id = mgr.insert(local_post("hello", 0), 0);
        assert!(mgr.acknowledge(id, "srv-7"));

        // Body differs (server may normalize); the id match wins.
        let page = vec![server_post("srv-7", "hello, normalized", 99_000)];
        let report = mgr.reconcile(&page);
        assert_eq!(report.confirmed, vec![id]);
    }

    #[test]
    fn test_failed_entry_survives_reconcile_until_dismissed() {
        let mut mgr = manager();
        let id = mgr.insert(local_post("hello", 0), 0);
        assert!(mgr.mark_failed(id, "rejected by server"));

        let page = vec![server_post("srv-1", "hello", 0)];
        let report = mgr.reconcile(&page);
        assert!(report.confirmed.is_empty());
        assert_eq!(mgr.len(), 1);
        assert_eq!(
            mgr.visible_items()[0].failed.as_deref(),
            Some("rejected by server")
        );

        // Dismiss is the only deletion path for failed rows.
        assert!(mgr.dismiss(id));
        assert!(mgr.is_empty());
    }

    #[test]
    fn test_dismiss_refuses_non_failed_entry() {
        let mut mgr = manager();
        let id = mgr.insert(local_post("hello", 0), 0);
        assert!(!mgr.dismiss(id));
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn test_expiry_drops_only_stale_unacknowledged() {
        let mut mgr = manager();
        let stale = mgr.insert(local_post("old", 0), 0);
        let fresh = mgr.insert(local_post("new", 50_000), 50_000);
        let acked = mgr.insert(local_post("acked", 0), 0);
        mgr.acknowledge(acked, "srv-1");

        // Default timeout is 60s.
        let expired = mgr.expire_stale(60_000);
        assert_eq!(expired, vec![stale]);
        assert_eq!(mgr.len(), 2);
        let _ = fresh;
    }

    #[test]
    fn test_visible_items_newest_first() {
        let mut mgr = manager();
        mgr.insert(local_post("first", 0), 0);
        mgr.insert(local_post("second", 1), 1);
        let bodies: Vec<_> = mgr
            .visible_items()
            .into_iter()
            .map(|i| i.body.unwrap())
            .collect();
        assert_eq!(bodies, vec!["second", "first"]);
    }
}
