//! Cursor-paginated fetch loop.
//!
//! One loop per consumer. Fetches are strictly sequential: the in-flight
//! guard rejects overlapping calls with `SyncError::Busy` (the facade
//! treats that as a silent no-op). Transient failures on a non-refresh
//! load are retried in-line with exponential backoff before surfacing;
//! cancellation aborts the backoff wait immediately and is never counted
//! as an error.

use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::{Cursor, FeedItem, Page};
use crate::store::SessionDedup;
use crate::transport::PageTransport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct FetchState {
    cursor: Cursor,
    in_flight: bool,
    /// Bumped on reset; a fetch that finishes against a stale generation
    /// discards its result instead of advancing the cursor.
    generation: u64,
    dedup: SessionDedup,
}

#[derive(Clone)]
pub struct FetchLoop {
    transport: Arc<dyn PageTransport>,
    state: Arc<Mutex<FetchState>>,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
    retry_max_attempts: u32,
}

impl FetchLoop {
    pub fn new(transport: Arc<dyn PageTransport>, config: &SyncConfig) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(FetchState {
                cursor: Cursor::Unfetched,
                in_flight: false,
                generation: 0,
                dedup: SessionDedup::new(config.dedup_capacity),
            })),
            retry_base_delay: config.retry_base_delay,
            retry_max_delay: config.retry_max_delay,
            retry_max_attempts: config.retry_max_attempts.max(1),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.state.lock().cursor.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.lock().cursor.is_end()
    }

    /// Forget cursor and dedup state (teardown / hard reset). Any fetch
    /// still in flight will discard its result.
    pub fn reset(&self) {
        let mut st = self.state.lock();
        st.cursor = Cursor::Unfetched;
        st.generation += 1;
        st.dedup.clear();
    }

    /// Fetch the next page and return the deduplicated items to append.
    /// No-op (`Ok(vec![])`) once the cursor is terminal.
    pub async fn load_more(&self, cancel: &CancelToken) -> Result<Vec<FeedItem>, SyncError> {
        self.run(cancel, false).await
    }

    /// Re-query from the start of the stream, producing a replacement page.
    /// Ignores cursor state and never auto-retries; the caller decides how
    /// to recover a failed refresh (optimistic restore).
    pub async fn refresh(&self, cancel: &CancelToken) -> Result<Vec<FeedItem>, SyncError> {
        self.run(cancel, true).await
    }

    async fn run(&self, cancel: &CancelToken, is_refresh: bool) -> Result<Vec<FeedItem>, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let (generation, token) = {
            let mut st = self.state.lock();
            if st.in_flight {
                return Err(SyncError::Busy);
            }
            if !is_refresh && st.cursor.is_end() {
                return Ok(Vec::new());
            }
            st.in_flight = true;
            let token = if is_refresh {
                None
            } else {
                st.cursor.request_token().map(str::to_owned)
            };
            (st.generation, token)
        };

        let result = self.fetch_with_retry(token.as_deref(), cancel, is_refresh).await;

        let mut st = self.state.lock();
        st.in_flight = false;
        match result {
            Ok(page) => {
                if st.generation != generation {
                    // A reset happened underneath us; drop the stale page.
                    return Err(SyncError::Cancelled);
                }
                st.cursor = match page.next_cursor {
                    Some(token) => Cursor::Next(token),
                    None => Cursor::End,
                };
                if is_refresh {
                    st.dedup.clear();
                }
                Ok(st.dedup.filter(page.items))
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_with_retry(
        &self,
        token: Option<&str>,
        cancel: &CancelToken,
        is_refresh: bool,
    ) -> Result<Page, SyncError> {
        let mut attempt: u32 = 1;
        loop {
            let fetched = tokio::select! {
                res = self.transport.fetch_page(token, cancel) => res,
                _ = cancel.cancelled() => Err(SyncError::Cancelled),
            };
            match fetched {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && !is_refresh && attempt < self.retry_max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying load");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Base delay doubling per attempt, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        (self.retry_base_delay * factor).min(self.retry_max_delay)
    }
}
