//! Reconciling cache of snippet stream URLs. Two sources race for each
//! `(message, index)` slot: an optimistic URL derived from the streaming
//! endpoint pattern, and confirmed URLs pushed by the backend once synthesis
//! finishes. Confirmed entries always win, newest first.

use crate::conversation::MessageId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct SlotEntry {
    url: String,
    seen: u64,
}

#[derive(Debug)]
pub struct SnippetCache {
    base: String,
    confirmed: HashMap<(MessageId, u32), SlotEntry>,
    next_seen: u64,
}

impl SnippetCache {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            confirmed: HashMap::new(),
            next_seen: 0,
        }
    }

    /// Record a URL the backend confirmed for this slot. A later confirmation
    /// replaces an earlier one regardless of content.
    pub fn confirm(&mut self, id: &MessageId, index: u32, url: &str) {
        self.next_seen += 1;
        self.confirmed.insert(
            (id.clone(), index),
            SlotEntry {
                url: url.to_string(),
                seen: self.next_seen,
            },
        );
    }

    pub fn has_confirmed(&self, id: &MessageId, index: u32) -> bool {
        self.confirmed.contains_key(&(id.clone(), index))
    }

    /// Monotonic marker of the latest confirmation for a slot, if any.
    pub fn seen_marker(&self, id: &MessageId, index: u32) -> Option<u64> {
        self.confirmed.get(&(id.clone(), index)).map(|e| e.seen)
    }

    /// Best-known URL for a slot: the most recently confirmed one, or the
    /// derived streaming URL as the optimistic fallback.
    pub fn resolve(&self, id: &MessageId, index: u32) -> String {
        match self.confirmed.get(&(id.clone(), index)) {
            Some(entry) => entry.url.clone(),
            None => self.derive_url(id, index),
        }
    }

    /// Streaming endpoint pattern parameterized by message id and snippet index.
    pub fn derive_url(&self, id: &MessageId, index: u32) -> String {
        format!("{}/tts-stream/{}?snippet={}", self.base, id, index)
    }

    /// Drop every slot belonging to a message (edit invalidation).
    pub fn forget(&mut self, id: &MessageId) {
        self.confirmed.retain(|(slot_id, _), _| slot_id != id);
    }

    /// Keep only slots whose message still exists.
    pub fn retain(&mut self, keep: impl Fn(&MessageId) -> bool) {
        self.confirmed.retain(|(slot_id, _), _| keep(slot_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SnippetCache {
        SnippetCache::new("http://localhost:8000")
    }

    #[test]
    fn resolve_falls_back_to_derived_url() {
        let cache = cache();
        let id = MessageId::new("m1");
        assert_eq!(
            cache.resolve(&id, 0),
            "http://localhost:8000/tts-stream/m1?snippet=0"
        );
    }

    #[test]
    fn confirmed_url_wins_over_derived() {
        let mut cache = cache();
        let id = MessageId::new("m1");
        cache.confirm(&id, 1, "https://cdn/clip-1.mp3");
        assert_eq!(cache.resolve(&id, 1), "https://cdn/clip-1.mp3");
        // Other slots of the same message keep the optimistic fallback.
        assert_eq!(
            cache.resolve(&id, 0),
            "http://localhost:8000/tts-stream/m1?snippet=0"
        );
    }

    #[test]
    fn later_confirmation_replaces_earlier() {
        let mut cache = cache();
        let id = MessageId::new("m1");
        cache.confirm(&id, 0, "https://cdn/v1.mp3");
        let first = cache.seen_marker(&id, 0).unwrap();
        cache.confirm(&id, 0, "https://cdn/v2.mp3");
        let second = cache.seen_marker(&id, 0).unwrap();
        assert!(second > first);
        assert_eq!(cache.resolve(&id, 0), "https://cdn/v2.mp3");
    }

    #[test]
    fn forget_drops_all_slots_for_a_message() {
        let mut cache = cache();
        let id = MessageId::new("m1");
        let other = MessageId::new("m2");
        cache.confirm(&id, 0, "https://cdn/a.mp3");
        cache.confirm(&id, 1, "https://cdn/b.mp3");
        cache.confirm(&other, 0, "https://cdn/c.mp3");
        cache.forget(&id);
        assert!(!cache.has_confirmed(&id, 0));
        assert!(!cache.has_confirmed(&id, 1));
        assert!(cache.has_confirmed(&other, 0));
    }
}
