//! Cooperative cancellation for in-flight network operations.
//!
//! A `CancelHandle`/`CancelToken` pair wraps a `tokio::sync::watch` channel.
//! The facade keeps the handle for the lifetime of the feed instance and
//! hands cloned tokens to every fetch; teardown cancels them all at once.
//! Dropping the handle counts as cancellation, so an unmounted facade can
//! never leave a fetch running.

use tokio::sync::watch;

pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        // A dropped handle closes the channel; treat that as cancelled.
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the token is cancelled (or the handle is dropped).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_propagates_to_clones() {
        let (handle, token) = cancel_pair();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_dropped_handle_is_cancelled() {
        let (handle, token) = cancel_pair();
        drop(handle);
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
