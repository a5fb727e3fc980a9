pub mod batcher;
pub mod facade;
pub mod fetch;
pub mod optimistic;

pub use batcher::SeenBatcher;
pub use facade::{FeedSync, SyncState};
pub use fetch::FetchLoop;
pub use optimistic::{OptimisticManager, ReconcileReport};
