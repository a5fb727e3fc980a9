pub mod action_log;
pub mod dedup;
pub mod seen_cache;

pub use action_log::NegativeActionLog;
pub use dedup::SessionDedup;
pub use seen_cache::SeenCache;
