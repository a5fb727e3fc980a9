use crate::models::FeedItem;
use uuid::Uuid;

/// Book-keeping for one speculative local insert.
///
/// While unacknowledged the entry is keyed only by `client_request_id`.
/// Once acknowledged it also carries the server id and is dropped as soon
/// as that id shows up in an authoritative page.
#[derive(Debug, Clone)]
pub struct OptimisticEntry {
    pub client_request_id: Uuid,
    pub item: FeedItem,
    pub acknowledged: bool,
    pub server_id: Option<String>,
    pub inserted_at_ms: i64,
}

impl OptimisticEntry {
    pub fn new(item: FeedItem, now_ms: i64) -> Self {
        Self {
            client_request_id: Uuid::new_v4(),
            item,
            acknowledged: false,
            server_id: None,
            inserted_at_ms: now_ms,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.item.failed.is_some()
    }
}
