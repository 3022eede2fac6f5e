//! Bounded, recency-ordered record of content available on a host.

use log::trace;
use lru::LruCache;
use std::num::NonZeroUsize;

use rust_ccdn_common::{ContentId, Version};

/// A cached `(content, version)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedContent {
    pub content: ContentId,
    pub version: Version,
}

#[derive(Debug, Clone)]
pub struct ContentCache {
    entries: LruCache<ContentId, CachedContent>,
}

impl ContentCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Cached pairs from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &CachedContent> {
        self.entries.iter().map(|(_, cached)| cached)
    }

    /// Insert at the head. False when an equal-or-newer copy is already held
    /// (that copy is promoted instead).
    pub fn add_entry(&mut self, content: ContentId, version: Version) -> bool {
        if self.has_entry(content, version) {
            return false;
        }
        if let Some((_, evicted)) = self.entries.push(content, CachedContent { content, version }) {
            trace!("cache evict {} v{}", evicted.content, evicted.version);
        }
        true
    }

    /// True if a copy with version `>= version` is held; promotes it. An
    /// older copy is purged.
    pub fn has_entry(&mut self, content: ContentId, version: Version) -> bool {
        let stored = match self.entries.peek(&content) {
            Some(cached) => cached.version,
            None => return false,
        };

        if stored >= version {
            self.entries.get(&content).is_some()
        } else {
            trace!("cache purge stale {} v{} (wanted v{})", content, stored, version);
            self.entries.pop(&content);
            false
        }
    }

    pub fn remove_entry(&mut self, content: ContentId) -> bool {
        self.entries.pop(&content).is_some()
    }
}
