//! Content FIB: content id + version to a set of candidate outbound interfaces.
//!
//! A stored entry is *live* for a requested version `v` when its own version
//! is `>= v`. Touching an entry with a newer requested version evicts it as
//! stale.

use log::trace;
use lru::LruCache;
use rand::Rng;
use std::num::NonZeroUsize;

use rust_ccdn_common::{ContentId, InterfaceId, Version};

const WORD_BITS: usize = u64::BITS as usize;

/* ---------------------------------------------------------------- *
 * Entry
 * ---------------------------------------------------------------- */

/// One FIB entry. The interface set has a fixed width set at construction;
/// interfaces are numbered `1..=width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFibEntry {
    content: ContentId,
    version: Version,
    width: usize,
    bits: Vec<u64>,
}

impl ContentFibEntry {
    pub fn new(content: ContentId, version: Version, width: usize) -> Self {
        Self {
            content,
            version,
            width,
            bits: vec![0; (width + WORD_BITS - 1) / WORD_BITS],
        }
    }

    pub fn content(&self) -> ContentId {
        self.content
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn bit(&self, iface: InterfaceId) -> Option<(usize, u64)> {
        if iface == 0 || iface > self.width {
            return None;
        }
        let i = iface - 1;
        Some((i / WORD_BITS, 1u64 << (i % WORD_BITS)))
    }

    /// Add `iface` to the set. False if out of range.
    pub fn set(&mut self, iface: InterfaceId) -> bool {
        match self.bit(iface) {
            Some((word, mask)) => {
                self.bits[word] |= mask;
                true
            }
            None => false,
        }
    }

    /// Remove `iface` from the set. False if out of range.
    pub fn clear(&mut self, iface: InterfaceId) -> bool {
        match self.bit(iface) {
            Some((word, mask)) => {
                self.bits[word] &= !mask;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, iface: InterfaceId) -> bool {
        self.bit(iface)
            .map_or(false, |(word, mask)| self.bits[word] & mask != 0)
    }

    /// Number of interfaces in the set.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Members of the set in ascending order.
    pub fn interfaces(&self) -> impl Iterator<Item = InterfaceId> + '_ {
        (1..=self.width).filter(move |i| self.contains(*i))
    }

    /// Uniformly random member of the set.
    pub fn random_interface<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<InterfaceId> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let pick = rng.gen_range(0..count);
        self.interfaces().nth(pick)
    }
}

/* ---------------------------------------------------------------- *
 * Table
 * ---------------------------------------------------------------- */

/// Bounded, recency-ordered content FIB. Holds at most one entry per
/// content id.
#[derive(Debug, Clone)]
pub struct ContentFib {
    entries: LruCache<ContentId, ContentFibEntry>,
    interface_count: usize,
}

impl ContentFib {
    pub fn new(interface_count: usize, capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            interface_count,
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

    pub fn interface_count(&self) -> usize {
        self.interface_count
    }

    /// True if an entry for `content` is stored, whatever its version.
    /// Does not touch recency.
    pub fn contains(&self, content: ContentId) -> bool {
        self.entries.contains(&content)
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &ContentFibEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// True if a live entry for `(content, version)` is stored; purges a
    /// stale one. Does not touch recency.
    fn live(&mut self, content: ContentId, version: Version) -> bool {
        let stored = match self.entries.peek(&content) {
            Some(entry) => entry.version,
            None => return false,
        };
        if stored >= version {
            true
        } else {
            trace!("FIB purge stale {} v{} (wanted v{})", content, stored, version);
            self.entries.pop(&content);
            false
        }
    }

    /// Return the live entry for `(content, version)` and promote it.
    pub fn lookup(&mut self, content: ContentId, version: Version) -> Option<&ContentFibEntry> {
        if !self.live(content, version) {
            return None;
        }
        self.entries.get(&content)
    }

    /// Record `iface` as a candidate for `(content, version)`.
    ///
    /// Creates the entry when there is no live one. Fails without touching
    /// the table for an out-of-range interface or when a newer version is
    /// stored.
    pub fn insert_interface(&mut self, content: ContentId, version: Version, iface: InterfaceId) -> bool {
        if iface == 0 || iface > self.interface_count {
            return false;
        }

        if self.live(content, version) {
            if self.entries.peek(&content).map_or(true, |e| e.version > version) {
                return false;
            }
        } else {
            self.push_entry(content, version);
        }

        self.entries
            .get_mut(&content)
            .map_or(false, |entry| entry.set(iface))
    }

    /// Replace any entry for `content` with an empty one at the head.
    pub fn create_entry(&mut self, content: ContentId, version: Version) {
        self.push_entry(content, version);
    }

    fn push_entry(&mut self, content: ContentId, version: Version) {
        let entry = ContentFibEntry::new(content, version, self.interface_count);
        if let Some((evicted, old)) = self.entries.push(content, entry) {
            if evicted != content {
                trace!("FIB evict {} v{}", evicted, old.version);
            }
        }
    }

    /// Promote the live entry. False (and purged) when stale, false when absent.
    pub fn refresh(&mut self, content: ContentId, version: Version) -> bool {
        self.live(content, version) && self.entries.get(&content).is_some()
    }

    /// Drop `iface` from the live entry without promoting it. Returns true
    /// iff the set is now empty.
    pub fn remove_interface(&mut self, content: ContentId, version: Version, iface: InterfaceId) -> bool {
        if !self.live(content, version) {
            return false;
        }
        match self.entries.peek_mut(&content) {
            Some(entry) => {
                entry.clear(iface);
                entry.is_empty()
            }
            None => false,
        }
    }

    pub fn remove_entry(&mut self, content: ContentId) -> bool {
        self.entries.pop(&content).is_some()
    }

    /// A random interface of the live entry; none when absent or empty.
    pub fn forwarding_interface<R: Rng + ?Sized>(
        &mut self,
        content: ContentId,
        version: Version,
        rng: &mut R,
    ) -> Option<InterfaceId> {
        self.lookup(content, version)?.random_interface(rng)
    }
}
