use std::time::Duration;

/// All tunables for the sync engine in one place.
///
/// Defaults match production behavior; tests shrink the timers and
/// capacities to keep scenarios small.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Seen-cache entries older than this are treated as absent (lazy expiry).
    pub seen_ttl: Duration,
    /// Maximum seen-cache entries; enforced on every mark, oldest-first eviction.
    pub seen_capacity: usize,
    /// Session dedup set capacity; strict FIFO eviction at the bound.
    pub dedup_capacity: usize,
    /// Persisted negative-action ring size; oldest dropped past the cap.
    pub action_log_capacity: usize,
    /// Debounce window for the seen-event batch flush. Each `add` pushes the
    /// pending flush out by this much.
    pub flush_debounce: Duration,
    /// First retry delay; doubles per attempt up to `retry_max_delay`.
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Total fetch attempts per load, including the first (so 3 means up to
    /// two backoff retries).
    pub retry_max_attempts: u32,
    /// Consecutive pages fetched per visibility trigger to pre-fill content.
    pub pump_max_pages: usize,
    /// Optimistic entries unacknowledged past this are force-expired.
    pub optimistic_timeout: Duration,
    /// Timestamp proximity window for reconciliation matching.
    pub reconcile_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seen_ttl: Duration::from_secs(48 * 60 * 60),
            seen_capacity: 1000,
            dedup_capacity: 512,
            action_log_capacity: 100,
            flush_debounce: Duration::from_secs(2),
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
            retry_max_attempts: 3,
            pump_max_pages: 3,
            optimistic_timeout: Duration::from_secs(60),
            reconcile_window: Duration::from_secs(5),
        }
    }
}
