use crate::models::{FeedItem, ItemKey};
use std::collections::{HashSet, VecDeque};

/// Bounded FIFO set of item keys already rendered this session.
///
/// Exists purely to stop the upstream pagination source from re-showing an
/// item it already returned within one continuous session; it is not the
/// durable seen-cache (that one gates server notification, this one gates
/// rendering). Eviction is strict FIFO by insertion order, not LRU.
pub struct SessionDedup {
    capacity: usize,
    order: VecDeque<ItemKey>,
    seen: HashSet<ItemKey>,
}

impl SessionDedup {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Admit only first-seen items, inserting accepted keys into the set.
    /// Optimistic items bypass entirely: never checked, never inserted.
    pub fn filter(&mut self, batch: Vec<FeedItem>) -> Vec<FeedItem> {
        let mut accepted = Vec::with_capacity(batch.len());
        for item in batch {
            if item.optimistic {
                accepted.push(item);
                continue;
            }
            if self.seen.contains(&item.key) {
                continue;
            }
            self.insert(item.key.clone());
            accepted.push(item);
        }
        accepted
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// A refresh starts a new render pass over the same session; the old
    /// set would otherwise filter the replacement page down to nothing.
    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    fn insert(&mut self, key: ItemKey) {
        if self.seen.contains(&key) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> FeedItem {
        FeedItem::new("post", id)
    }

    #[test]
    fn test_second_occurrence_filtered() {
        let mut dedup = SessionDedup::new(16);
        let first = dedup.filter(vec![item("1"), item("2")]);
        assert_eq!(first.len(), 2);

        let second = dedup.filter(vec![item("2"), item("3")]);
        let ids: Vec<_> = second.iter().map(|i| i.key.id.as_str()).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[test]
    fn test_optimistic_bypasses() {
        let mut dedup = SessionDedup::new(16);
        let mut speculative = item("1");
        speculative.optimistic = true;

        let out = dedup.filter(vec![speculative.clone()]);
        assert_eq!(out.len(), 1);
        // Not inserted: the authoritative copy still passes later.
        assert!(!dedup.contains(&ItemKey::new("post", "1")));
        let out = dedup.filter(vec![item("1"), speculative]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut dedup = SessionDedup::new(2);
        dedup.filter(vec![item("1"), item("2")]);
        assert_eq!(dedup.len(), 2);

        // "1" is the oldest inserted key and gets evicted first.
        dedup.filter(vec![item("3")]);
        assert_eq!(dedup.len(), 2);
        assert!(!dedup.contains(&ItemKey::new("post", "1")));
        assert!(dedup.contains(&ItemKey::new("post", "2")));
        assert!(dedup.contains(&ItemKey::new("post", "3")));

        // Evicted key is admitted again.
        let out = dedup.filter(vec![item("1")]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_clear_resets_session() {
        let mut dedup = SessionDedup::new(4);
        dedup.filter(vec![item("1")]);
        dedup.clear();
        let out = dedup.filter(vec![item("1")]);
        assert_eq!(out.len(), 1);
    }
}
