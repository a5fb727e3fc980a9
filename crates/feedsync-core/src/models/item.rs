use serde::{Deserialize, Serialize};
use std::fmt;

/// Compound identity of a feed item: content kind plus server id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: String,
    pub id: String,
}

impl ItemKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One content card. The payload is opaque to the sync layer; `body` and
/// `created_at_ms` exist only for optimistic reconciliation matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub key: ItemKey,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at_ms: Option<i64>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Set on speculative local inserts; such items bypass session dedup.
    #[serde(default)]
    pub optimistic: bool,
    /// Visible failure reason for an optimistic item that could not be
    /// confirmed. Annotated, not deleted, so the user can retry or dismiss.
    #[serde(default)]
    pub failed: Option<String>,
}

impl FeedItem {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: ItemKey::new(kind, id),
            body: None,
            created_at_ms: None,
            payload: serde_json::Value::Null,
            optimistic: false,
            failed: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_created_at_ms(mut self, ms: i64) -> Self {
        self.created_at_ms = Some(ms);
        self
    }
}

/// Pagination position. `End` is terminal: no further fetch is attempted
/// until a refresh resets the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Unfetched,
    Next(String),
    End,
}

impl Cursor {
    pub fn is_end(&self) -> bool {
        matches!(self, Cursor::End)
    }

    /// Token to send on the next page request. `None` both before the first
    /// fetch and on refresh (the server interprets it as "from the start").
    pub fn request_token(&self) -> Option<&str> {
        match self {
            Cursor::Next(token) => Some(token),
            _ => None,
        }
    }
}

/// One page as returned by the transport. `next_cursor: None` means end of
/// stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_display() {
        assert_eq!(ItemKey::new("post", "42").to_string(), "post:42");
    }

    #[test]
    fn test_cursor_request_token() {
        assert_eq!(Cursor::Unfetched.request_token(), None);
        assert_eq!(Cursor::Next("abc".into()).request_token(), Some("abc"));
        assert_eq!(Cursor::End.request_token(), None);
        assert!(Cursor::End.is_end());
    }
}
