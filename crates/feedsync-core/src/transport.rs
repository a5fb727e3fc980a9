//! External network collaborators.
//!
//! The engine does not own an HTTP client; page fetches and event delivery
//! are injected behind these object-safe traits. Implementations must map
//! their failure modes onto the `SyncError` taxonomy: 5xx/network as
//! `Retryable`, 4xx as `Terminal`, aborted requests as `Cancelled`.

use crate::cancel::CancelToken;
use crate::error::SyncError;
use crate::models::{NegativeAction, Page, PendingSeenEvent};
use futures::future::BoxFuture;

pub trait PageTransport: Send + Sync {
    /// Fetch one page. `cursor: None` requests the start of the stream.
    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a str>,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, Result<Page, SyncError>>;
}

pub trait EventTransport: Send + Sync {
    /// Deliver a whole batch of seen events in one call.
    fn send_batch<'a>(
        &'a self,
        events: &'a [PendingSeenEvent],
    ) -> BoxFuture<'a, Result<(), SyncError>>;

    /// Best-effort, non-blocking delivery that must survive page teardown
    /// (no response body awaited). Returns whether the payload was accepted
    /// for transmission.
    fn send_fire_and_forget(&self, payload: serde_json::Value) -> bool;

    /// Deliver a single negative action.
    fn send_action<'a>(&'a self, action: &'a NegativeAction)
        -> BoxFuture<'a, Result<(), SyncError>>;
}
