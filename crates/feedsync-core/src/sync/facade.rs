//! Top-level feed synchronization facade.
//!
//! Owns one instance of every collaborator (fetch loop, dedup, optimistic
//! manager, seen cache, batcher, action log) and exposes the operations the
//! presentation layer drives: load-more, refresh, optimistic insert, seen
//! tracking, negative actions, and the visibility/teardown signals.
//!
//! All collaborators are explicitly constructed and injected here - no
//! module-level singletons - so tests run isolated instances and an app can
//! host several feeds side by side. Outbound notifications go through a
//! typed mpsc channel rather than any ambient broadcast.

use crate::cancel::{cancel_pair, CancelHandle};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::models::{Cursor, FeedItem, ItemKey, NegativeAction, NegativeActionKind, PendingSeenEvent};
use crate::store::{NegativeActionLog, SeenCache};
use crate::storage::KeyValueStore;
use crate::sync::fetch::FetchLoop;
use crate::sync::batcher::SeenBatcher;
use crate::sync::optimistic::OptimisticManager;
use crate::transport::{EventTransport, PageTransport};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Facade lifecycle state. `Errored` is recoverable: a manual retry or a
/// visibility trigger re-enters `Loading`. Stream exhaustion is tracked by
/// the cursor, not a state variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Loading,
    Loaded,
    Errored,
}

pub struct FeedSync {
    config: SyncConfig,
    fetch: FetchLoop,
    optimistic: OptimisticManager,
    seen: SeenCache,
    batcher: SeenBatcher,
    actions: NegativeActionLog,
    base_items: Vec<FeedItem>,
    state: SyncState,
    last_error: Option<String>,
    cancel: CancelHandle,
    events_tx: mpsc::UnboundedSender<SyncEvent>,
}

impl FeedSync {
    /// Build a feed instance over injected transports and storage. Returns
    /// the facade plus the receiving end of its notification channel.
    pub fn new(
        config: SyncConfig,
        pages: Arc<dyn PageTransport>,
        delivery: Arc<dyn EventTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (cancel, _token) = cancel_pair();
        let facade = Self {
            fetch: FetchLoop::new(pages, &config),
            optimistic: OptimisticManager::new(&config),
            seen: SeenCache::new(store.clone(), &config),
            batcher: SeenBatcher::new(delivery.clone(), store.clone(), &config),
            actions: NegativeActionLog::new(store, delivery, &config),
            base_items: Vec::new(),
            state: SyncState::Idle,
            last_error: None,
            cancel,
            events_tx,
            config,
        };
        (facade, events_rx)
    }

    // ===== Read-only state =====

    /// Visible list: pending/failed optimistic rows layered on top of the
    /// authoritative base, newest speculative insert first.
    pub fn items(&self) -> Vec<FeedItem> {
        let mut out = self.optimistic.visible_items();
        out.extend(self.base_items.iter().cloned());
        out
    }

    pub fn cursor(&self) -> Cursor {
        self.fetch.cursor()
    }

    pub fn has_more(&self) -> bool {
        !self.fetch.is_exhausted()
    }

    pub fn is_loading(&self) -> bool {
        self.state == SyncState::Loading
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ===== Pagination =====

    /// Fetch and append the next page. No-op once the stream is exhausted
    /// or while another fetch is in flight.
    pub async fn load_more(&mut self) {
        self.sweep_expired();
        if self.fetch.is_exhausted() {
            return;
        }
        self.state = SyncState::Loading;
        let token = self.cancel.token();
        match self.fetch.load_more(&token).await {
            Ok(items) => {
                let count = items.len();
                self.base_items.extend(items);
                self.state = SyncState::Loaded;
                self.last_error = None;
                self.emit(SyncEvent::ItemsAppended { count });
                if self.fetch.is_exhausted() {
                    self.emit(SyncEvent::EndOfStream);
                }
            }
            Err(err) => self.absorb_load_error(err),
        }
    }

    /// Re-query from the start, replace the base list, then reconcile
    /// optimistic entries against the fresh authoritative page. On failure
    /// the speculative rows stay visible and the failure is surfaced as a
    /// distinguishable event, never a silent disappearance.
    pub async fn refresh(&mut self) {
        self.sweep_expired();
        self.state = SyncState::Loading;
        let token = self.cancel.token();
        match self.fetch.refresh(&token).await {
            Ok(items) => {
                self.base_items = items;
                self.state = SyncState::Loaded;
                self.last_error = None;
                self.optimistic.reconcile(&self.base_items);
                self.emit(SyncEvent::ItemsReplaced {
                    count: self.base_items.len(),
                });
                if self.fetch.is_exhausted() {
                    self.emit(SyncEvent::EndOfStream);
                }
            }
            Err(err) => {
                let restored = self.optimistic.len();
                if restored > 0 && !matches!(err, SyncError::Cancelled | SyncError::Busy) {
                    self.emit(SyncEvent::ReconciliationFailed { restored });
                }
                self.absorb_load_error(err);
            }
        }
    }

    /// Pre-fill ahead of the viewport: up to `pump_max_pages` consecutive
    /// loads, stopping early on error, cancellation, or end of stream.
    pub async fn on_visible(&mut self) {
        for _ in 0..self.config.pump_max_pages {
            if self.fetch.is_exhausted() {
                break;
            }
            self.load_more().await;
            if self.state != SyncState::Loaded {
                break;
            }
        }
    }

    // ===== Optimistic inserts =====

    /// Prepend a speculative item immediately; confirmation arrives via a
    /// later `refresh` (heuristic) or `acknowledge_optimistic` (server id).
    pub fn insert_optimistic(&mut self, item: FeedItem) -> Uuid {
        self.optimistic.insert(item, now_ms())
    }

    pub fn acknowledge_optimistic(&mut self, client_request_id: Uuid, server_id: &str) -> bool {
        self.optimistic.acknowledge(client_request_id, server_id)
    }

    /// Mark a speculative item visibly failed (retry/dismiss affordance).
    pub fn mark_optimistic_failed(&mut self, client_request_id: Uuid, reason: &str) {
        if self.optimistic.mark_failed(client_request_id, reason) {
            self.emit(SyncEvent::OptimisticFailed {
                client_request_id,
                reason: reason.to_string(),
            });
        }
    }

    /// Permanently remove a failed speculative item.
    pub fn dismiss_failed(&mut self, client_request_id: Uuid) -> bool {
        self.optimistic.dismiss(client_request_id)
    }

    // ===== Viewer behavior =====

    /// Record that an item crossed the visibility threshold. Deduplicated
    /// against the durable seen cache: within the TTL each key enqueues at
    /// most one behavioral event.
    pub fn mark_seen(&mut self, key: &ItemKey, position: u32) {
        let now = now_ms();
        if self.seen.has(key, now) {
            return;
        }
        self.seen.mark(key, now);
        self.batcher.add(PendingSeenEvent {
            item_type: key.kind.clone(),
            item_id: key.id.clone(),
            position,
            timestamp_ms: now,
        });
    }

    /// Apply a hide/block/report: the item leaves the visible list and the
    /// action is persisted immediately; delivery is best-effort and never
    /// blocks or reverses the local change.
    pub fn record_negative_action(
        &mut self,
        key: &ItemKey,
        kind: NegativeActionKind,
        reason: Option<String>,
    ) {
        self.actions.record(NegativeAction {
            item_type: key.kind.clone(),
            item_id: key.id.clone(),
            action: kind,
            timestamp_ms: now_ms(),
            actor_id: None,
            reason,
        });
        self.base_items.retain(|item| &item.key != key);
        self.emit(SyncEvent::ActionRecorded {
            key: key.clone(),
            kind,
        });
    }

    // ===== Visibility / teardown signals =====

    /// Tab hidden: get queued seen events out while the page can still run
    /// ordinary requests.
    pub async fn on_hidden(&mut self) {
        self.batcher.force_flush().await;
    }

    /// Page teardown: cancel in-flight fetches, forget pagination state,
    /// and hand the event queue to the fire-and-forget path (or spill it
    /// for the next session).
    pub fn on_teardown(&mut self) {
        self.cancel.cancel();
        self.fetch.reset();
        self.batcher.flush_on_teardown();
    }

    /// Drop unconfirmed speculative entries past the confirmation timeout.
    /// Runs at the head of every pagination operation, so stale entries
    /// clear even on a feed that only ever scrolls.
    fn sweep_expired(&mut self) {
        for client_request_id in self.optimistic.expire_stale(now_ms()) {
            self.emit(SyncEvent::OptimisticFailed {
                client_request_id,
                reason: "confirmation timed out".into(),
            });
        }
    }

    fn absorb_load_error(&mut self, err: SyncError) {
        match err {
            // Silent by contract: no error state, no event.
            SyncError::Cancelled | SyncError::Busy => {
                self.state = if self.base_items.is_empty() {
                    SyncState::Idle
                } else {
                    SyncState::Loaded
                };
            }
            err => {
                let retryable = err.is_retryable();
                let message = err.to_string();
                self.last_error = Some(message.clone());
                self.state = SyncState::Errored;
                self.emit(SyncEvent::LoadFailed { message, retryable });
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // Receiver gone just means nobody is listening anymore.
        let _ = self.events_tx.send(event);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
