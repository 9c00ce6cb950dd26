use std::collections::HashMap;

use tracing::debug;

use crate::FeedbackState;

/// Resolved value plus the identity generation it was queried under
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: FeedbackState,
    pub generation: u64,
    /// Changes on every write of the fingerprint
    pub revision: u64,
    /// Post-processed copy of `value`, if one was produced yet
    pub rendered: Option<Rendered>,
}

/// Value as handed to the host, valid for one image set version
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub image_version: u64,
    pub value: FeedbackState,
}

/// Fingerprint -> resolved feedback value
#[derive(Debug, Default)]
pub struct FeedbackCache {
    entries: HashMap<String, CacheEntry>,
    next_revision: u64,
}

impl FeedbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        fingerprint: &str,
    ) -> Option<&CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// Sole mutator of entries; only the rebuilder calls it
    pub fn write(
        &mut self,
        fingerprint: impl Into<String>,
        value: FeedbackState,
        generation: u64,
    ) {
        self.next_revision += 1;
        self.entries.insert(
            fingerprint.into(),
            CacheEntry {
                value,
                generation,
                revision: self.next_revision,
                rendered: None,
            },
        );
    }

    /// Attaches a post-processed copy to the entry it was produced from.
    ///
    /// Ignored when the entry was rewritten or evicted in the meantime.
    pub fn store_rendered(
        &mut self,
        fingerprint: &str,
        revision: u64,
        rendered: Rendered,
    ) -> bool {
        match self.entries.get_mut(fingerprint) {
            Some(entry) if entry.revision == revision => {
                entry.rendered = Some(rendered);
                true
            }
            _ => false,
        }
    }

    /// Removes every entry whose fingerprint starts with `prefix`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_by_prefix(
        &mut self,
        prefix: &str,
    ) -> usize {
        let before = self.entries.len();
        self.entries.retain(|fingerprint, _| !fingerprint.starts_with(prefix));
        let evicted = before - self.entries.len();
        debug!(prefix, evicted, "evicted cache entries by prefix");
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
