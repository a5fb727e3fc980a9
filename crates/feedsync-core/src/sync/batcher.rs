//! Batched delivery of seen events.
//!
//! Events accumulate in memory and flush as one network call after a
//! debounce window; every `add` pushes the pending flush further out. A
//! failed flush re-queues the whole batch at the front, never dropping or
//! splitting it. Teardown switches to the fire-and-forget transport path
//! and, if that is not accepted, spills the whole queue to durable storage
//! so the next session can rehydrate it.

use crate::config::SyncConfig;
use crate::models::PendingSeenEvent;
use crate::storage::KeyValueStore;
use crate::transport::EventTransport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const SPILL_KEY: &str = "feedsync.pending_seen";

struct BatcherInner {
    queue: VecDeque<PendingSeenEvent>,
    /// Debounce generation: each (re)schedule bumps it, orphaning any timer
    /// task spawned for an earlier generation.
    timer_generation: u64,
    flushing: bool,
    /// Set once teardown has run; from then on nothing may land back in
    /// memory, failed batches go to the durable spill instead.
    torn_down: bool,
}

#[derive(Clone)]
pub struct SeenBatcher {
    inner: Arc<Mutex<BatcherInner>>,
    transport: Arc<dyn EventTransport>,
    store: Arc<dyn KeyValueStore>,
    debounce: Duration,
}

impl SeenBatcher {
    /// Builds the batcher and rehydrates any queue spilled by a previous
    /// session's teardown. Requires a running Tokio runtime (flush timers
    /// are spawned tasks).
    pub fn new(
        transport: Arc<dyn EventTransport>,
        store: Arc<dyn KeyValueStore>,
        config: &SyncConfig,
    ) -> Self {
        let mut queue = VecDeque::new();
        if let Some(raw) = store.get(SPILL_KEY) {
            match serde_json::from_str::<Vec<PendingSeenEvent>>(&raw) {
                Ok(spilled) => {
                    tracing::info!(count = spilled.len(), "rehydrated spilled seen events");
                    queue.extend(spilled);
                }
                Err(err) => tracing::warn!("discarding corrupt seen-event spill ({err})"),
            }
            store.remove(SPILL_KEY);
        }
        let batcher = Self {
            inner: Arc::new(Mutex::new(BatcherInner {
                queue,
                timer_generation: 0,
                flushing: false,
                torn_down: false,
            })),
            transport,
            store,
            debounce: config.flush_debounce,
        };
        let rehydrated = !batcher.inner.lock().queue.is_empty();
        if rehydrated {
            batcher.schedule_flush();
        }
        batcher
    }

    /// Queue an event and (re)start the debounced flush timer.
    pub fn add(&self, event: PendingSeenEvent) {
        self.inner.lock().queue.push_back(event);
        self.schedule_flush();
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Dispatch the whole current queue as one batch. On failure the batch
    /// goes back to the front of the queue and a new flush is scheduled.
    /// Events that arrive while a batch is on the wire get their own flush
    /// scheduled rather than waiting for another `add`.
    pub async fn flush(&self) {
        let batch: Vec<PendingSeenEvent> = {
            let mut inner = self.inner.lock();
            if inner.queue.is_empty() {
                return;
            }
            if inner.flushing {
                drop(inner);
                self.schedule_flush();
                return;
            }
            inner.flushing = true;
            inner.queue.drain(..).collect()
        };

        let result = self.transport.send_batch(&batch).await;

        let mut inner = self.inner.lock();
        inner.flushing = false;
        match result {
            Ok(()) => {
                tracing::debug!(count = batch.len(), "seen batch delivered");
                if !inner.queue.is_empty() {
                    drop(inner);
                    self.schedule_flush();
                }
            }
            Err(err) => {
                tracing::warn!(count = batch.len(), "seen batch delivery failed ({err})");
                if inner.torn_down {
                    drop(inner);
                    self.spill(batch, true);
                } else {
                    for event in batch.into_iter().rev() {
                        inner.queue.push_front(event);
                    }
                    drop(inner);
                    self.schedule_flush();
                }
            }
        }
    }

    /// Cancel the pending timer and flush immediately (tab hidden).
    pub async fn force_flush(&self) {
        self.inner.lock().timer_generation += 1;
        self.flush().await;
    }

    /// Teardown path: deliver via fire-and-forget, which is the only
    /// primitive guaranteed to outlive the page. If the payload is not
    /// accepted, spill the whole queue for the next session - all or
    /// nothing, never a partial loss.
    pub fn flush_on_teardown(&self) {
        let batch: Vec<PendingSeenEvent> = {
            let mut inner = self.inner.lock();
            inner.timer_generation += 1;
            inner.torn_down = true;
            inner.queue.drain(..).collect()
        };
        if batch.is_empty() {
            return;
        }

        let payload = match serde_json::to_value(&batch) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("seen batch serialize failed at teardown ({err})");
                return;
            }
        };

        if self.transport.send_fire_and_forget(payload) {
            tracing::debug!(count = batch.len(), "seen batch handed off at teardown");
            return;
        }

        self.spill(batch, false);
    }

    /// Merge `events` into the durable spill under `SPILL_KEY`. `at_front`
    /// puts them ahead of anything already spilled (they were queued
    /// earlier). If the store write fails the events go back to memory,
    /// which is the best remaining option.
    fn spill(&self, events: Vec<PendingSeenEvent>, at_front: bool) {
        let spilled: Vec<PendingSeenEvent> = self
            .store
            .get(SPILL_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let combined = if at_front {
            let mut merged = events;
            merged.extend(spilled);
            merged
        } else {
            let mut merged = spilled;
            merged.extend(events);
            merged
        };
        match serde_json::to_string(&combined) {
            Ok(raw) => match self.store.set(SPILL_KEY, &raw) {
                Ok(()) => {
                    tracing::info!(count = combined.len(), "seen batch spilled for next session")
                }
                Err(err) => {
                    tracing::warn!("seen batch spill failed ({err}), re-queueing in memory");
                    let mut inner = self.inner.lock();
                    for event in combined.into_iter().rev() {
                        inner.queue.push_front(event);
                    }
                }
            },
            Err(err) => tracing::warn!("seen batch spill serialize failed ({err})"),
        }
    }

    fn schedule_flush(&self) {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return;
            }
            inner.timer_generation += 1;
            inner.timer_generation
        };
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.debounce).await;
            let current = this.inner.lock().timer_generation == generation;
            if current {
                this.flush().await;
            }
        });
    }
}
