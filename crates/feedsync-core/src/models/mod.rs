pub mod action;
pub mod item;
pub mod optimistic;
pub mod seen;

pub use action::{NegativeAction, NegativeActionKind};
pub use item::{Cursor, FeedItem, ItemKey, Page};
pub use optimistic::OptimisticEntry;
pub use seen::PendingSeenEvent;
