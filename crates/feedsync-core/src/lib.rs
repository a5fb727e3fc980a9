//! Client-side feed synchronization engine.
//!
//! Keeps a paginated content list consistent with a server that owns the
//! ground truth: cursor-driven fetching with retry/backoff, session-level
//! deduplication, optimistic inserts reconciled against authoritative
//! pages, a durable bounded seen-cache, and batched teardown-safe delivery
//! of viewer telemetry. Rendering, routing, and the HTTP client itself are
//! external collaborators injected behind the traits in [`transport`] and
//! [`storage`].

pub mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transport;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use config::SyncConfig;
pub use error::{StorageError, SyncError};
pub use events::SyncEvent;
pub use models::{
    Cursor, FeedItem, ItemKey, NegativeAction, NegativeActionKind, OptimisticEntry, Page,
    PendingSeenEvent,
};
pub use storage::{KeyValueStore, MemoryStore};
pub use sync::{FeedSync, SyncState};
pub use transport::{EventTransport, PageTransport};
