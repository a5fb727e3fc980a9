//! Capped persisted log of hide/block/report actions.
//!
//! The local append happens synchronously before any network attempt, so an
//! action is never lost to a delivery failure. Delivery itself is a single
//! best-effort shot: failures are logged and never retried, and the local
//! state change never waits on the network.

use crate::config::SyncConfig;
use crate::models::NegativeAction;
use crate::storage::KeyValueStore;
use crate::transport::EventTransport;
use std::sync::Arc;

const STORAGE_KEY: &str = "feedsync.negative_actions";

pub struct NegativeActionLog {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn EventTransport>,
    capacity: usize,
}

impl NegativeActionLog {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn EventTransport>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store,
            transport,
            capacity: config.action_log_capacity.max(1),
        }
    }

    /// Append to the persisted ring (oldest dropped past the cap), then fire
    /// one asynchronous best-effort delivery attempt.
    pub fn record(&self, action: NegativeAction) {
        let mut log = self.load();
        log.push(action.clone());
        if log.len() > self.capacity {
            let excess = log.len() - self.capacity;
            log.drain(..excess);
        }
        match serde_json::to_string(&log) {
            Ok(raw) => {
                if let Err(err) = self.store.set(STORAGE_KEY, &raw) {
                    tracing::warn!("action_log: persist failed ({err}), action kept in memory only");
                }
            }
            Err(err) => tracing::warn!("action_log: serialize failed ({err})"),
        }

        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(err) = transport.send_action(&action).await {
                tracing::warn!(
                    item = %action.item_id,
                    "action_log: delivery failed, not retrying ({err})"
                );
            }
        });
    }

    /// Persisted actions, oldest first.
    pub fn entries(&self) -> Vec<NegativeAction> {
        self.load()
    }

    fn load(&self) -> Vec<NegativeAction> {
        let Some(raw) = self.store.get(STORAGE_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!("action_log: corrupt log, starting fresh ({err})");
            Vec::new()
        })
    }
}
