use std::collections::HashSet;
use std::collections::VecDeque;

use crate::FeedbackIdentity;
use crate::FeedbackOptions;

/// A feedback instance waiting for its detail query
#[derive(Debug, Clone, PartialEq)]
pub struct Miss {
    pub identity: FeedbackIdentity,
    pub options: FeedbackOptions,
    pub fingerprint: String,
}

/// Ordered misses, unique by fingerprint while queued
#[derive(Debug, Default)]
pub struct MissQueue {
    queue: VecDeque<Miss>,
    queued: HashSet<String>,
}

impl MissQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the miss unless its fingerprint is already queued.
    ///
    /// Returns true when the miss was added.
    pub fn push(
        &mut self,
        miss: Miss,
    ) -> bool {
        if !self.queued.insert(miss.fingerprint.clone()) {
            return false;
        }
        self.queue.push_back(miss);
        true
    }

    pub fn contains(
        &self,
        fingerprint: &str,
    ) -> bool {
        self.queued.contains(fingerprint)
    }

    /// Pops every queued miss in arrival order
    pub fn drain(&mut self) -> Vec<Miss> {
        self.queued.clear();
        self.queue.drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<Miss> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}
