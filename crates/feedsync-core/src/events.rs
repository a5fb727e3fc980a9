use crate::models::{ItemKey, NegativeActionKind};
use uuid::Uuid;

/// Notifications pushed to the presentation layer over the facade's event
/// channel. Replaces ambient broadcast with explicit typed message passing.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A pagination load appended items to the list.
    ItemsAppended { count: usize },
    /// A refresh replaced the base list.
    ItemsReplaced { count: usize },
    /// The cursor reached end of stream; further scroll signals are no-ops.
    EndOfStream,
    /// A load or refresh failed after retries were exhausted.
    LoadFailed { message: String, retryable: bool },
    /// An optimistic item was marked failed - UI should show retry/dismiss.
    OptimisticFailed { client_request_id: Uuid, reason: String },
    /// A refresh meant to confirm optimistic items failed; the speculative
    /// rows were kept visible rather than silently dropped.
    ReconciliationFailed { restored: usize },
    /// A hide/block/report was applied locally (delivery is best-effort).
    ActionRecorded {
        key: ItemKey,
        kind: NegativeActionKind,
    },
}
