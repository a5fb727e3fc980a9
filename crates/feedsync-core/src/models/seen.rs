use serde::{Deserialize, Serialize};

/// One queued "viewer saw this item" event. Serialized shape matches the
/// batch wire format: `{itemType, itemId, position, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSeenEvent {
    pub item_type: String,
    pub item_id: String,
    pub position: u32,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}
