//! Ground-truth placement of original content copies.

use log::debug;
use std::collections::HashMap;

use rust_ccdn_common::{ContentId, HostId, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub content: ContentId,
    pub version: Version,
    pub hosts: Vec<HostId>,
}

#[derive(Debug, Default)]
pub struct ContentDirectory {
    entries: HashMap<ContentId, DirectoryEntry>,
}

impl ContentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Place `content` at version 0 on `hosts`, replacing any previous entry.
    pub fn create(&mut self, content: ContentId, hosts: Vec<HostId>) {
        debug!("create content {} on {} hosts", content, hosts.len());
        self.entries.insert(
            content,
            DirectoryEntry {
                content,
                version: 0,
                hosts,
            },
        );
    }

    /// Bump the version of `content` in place.
    pub fn update(&mut self, content: ContentId) -> Option<Version> {
        let entry = self.entries.get_mut(&content)?;
        entry.version = entry.version.wrapping_add(1);
        debug!("update content {} to v{}", content, entry.version);
        Some(entry.version)
    }

    pub fn remove(&mut self, content: ContentId) -> bool {
        self.entries.remove(&content).is_some()
    }

    pub fn get(&self, content: ContentId) -> Option<&DirectoryEntry> {
        self.entries.get(&content)
    }

    /// True if `host` holds an original copy of `content`.
    pub fn holds(&self, host: HostId, content: ContentId) -> bool {
        self.entries
            .get(&content)
            .map_or(false, |entry| entry.hosts.contains(&host))
    }
}
