use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeActionKind {
    Hide,
    Block,
    Report,
}

/// A hide/block/report signal. Persisted locally before any network attempt
/// so the action survives delivery failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeAction {
    pub item_type: String,
    pub item_id: String,
    pub action: NegativeActionKind,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
