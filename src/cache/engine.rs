use std::collections::HashMap;
use std::collections::HashSet;

use tracing::debug;
use tracing::trace;

use super::fingerprint;
use super::FeedbackCache;
use super::Miss;
use super::MissQueue;
use super::Rendered;
use super::StalenessTracker;
use crate::metrics::CACHE_LOOKUPS;
use crate::metrics::LOOKUP_HIT;
use crate::metrics::LOOKUP_MISS;
use crate::metrics::LOOKUP_STALE;
use crate::metrics::REBUILD_FAILED;
use crate::metrics::REBUILD_REJECTED;
use crate::metrics::REBUILD_RESULTS;
use crate::metrics::REBUILD_WRITTEN;
use crate::metrics::STALE_MARKERS;
use crate::FeedbackIdentity;
use crate::FeedbackOptions;
use crate::FeedbackState;

/// Result of a synchronous cache lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub fingerprint: String,
    /// Cached value, not yet post-processed
    pub value: Option<FeedbackState>,
    /// Revision of the cached entry, 0 when absent
    pub revision: u64,
    /// Post-processed copy stored with the entry
    pub rendered: Option<Rendered>,
    /// Miss queue went from empty to non-empty; the rebuilder must be armed
    pub schedule: bool,
}

/// Miss handed to the rebuilder together with the generation it was issued at
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedMiss {
    pub miss: Miss,
    pub generation: u64,
}

/// Settled detail query coming back from the rebuilder
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub dispatched: DispatchedMiss,
    /// None when the query failed
    pub value: Option<FeedbackState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Query predates a stale marker for the identity
    Rejected,
    Failed,
}

/// Cache, stale markers and miss queue of one connection.
///
/// Holds no I/O. The bridge event loop drives the rebuilder side
/// (`take_batch` / `apply`), the host side calls `lookup`.
#[derive(Debug, Default)]
pub struct FeedbackEngine {
    cache: FeedbackCache,
    staleness: StalenessTracker,
    misses: MissQueue,
    /// fingerprint -> identity key of dispatched misses
    in_flight: HashMap<String, String>,
}

impl FeedbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the cached value for the feedback instance.
    ///
    /// Absent or stale values enqueue a miss. A fingerprint that is already
    /// queued or in flight is not enqueued twice.
    pub fn lookup(
        &mut self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> Lookup {
        let identity_key = identity.key();
        let fingerprint = fingerprint(&identity_key, options);

        let (value, revision, rendered, needs_refresh) = match self.cache.get(&fingerprint) {
            Some(entry) => {
                let stale = self.staleness.is_stale(&identity_key, entry.generation);
                let outcome = if stale { LOOKUP_STALE } else { LOOKUP_HIT };
                CACHE_LOOKUPS.with_label_values(&[outcome]).inc();
                (Some(entry.value.clone()), entry.revision, entry.rendered.clone(), stale)
            }
            None => {
                CACHE_LOOKUPS.with_label_values(&[LOOKUP_MISS]).inc();
                (None, 0, None, true)
            }
        };

        let mut schedule = false;
        if needs_refresh && !self.in_flight.contains_key(&fingerprint) {
            let was_empty = self.misses.is_empty();
            let added = self.misses.push(Miss {
                identity: identity.clone(),
                options: options.clone(),
                fingerprint: fingerprint.clone(),
            });
            if added {
                trace!(%fingerprint, "miss enqueued");
            }
            schedule = added && was_empty;
        }

        Lookup {
            fingerprint,
            value,
            revision,
            rendered,
            schedule,
        }
    }

    /// Pops every queued miss and marks it in flight
    pub fn take_batch(&mut self) -> Vec<DispatchedMiss> {
        self.misses
            .drain()
            .into_iter()
            .map(|miss| {
                let identity_key = miss.identity.key();
                let generation = self.staleness.generation(&identity_key);
                self.in_flight.insert(miss.fingerprint.clone(), identity_key);
                DispatchedMiss { miss, generation }
            })
            .collect()
    }

    /// Writes a settled query back into the cache
    pub fn apply(
        &mut self,
        resolution: Resolution,
    ) -> WriteOutcome {
        let DispatchedMiss { miss, generation } = resolution.dispatched;
        self.in_flight.remove(&miss.fingerprint);

        let outcome = match resolution.value {
            None => WriteOutcome::Failed,
            Some(_) if self.staleness.is_stale(&miss.identity.key(), generation) => {
                debug!(fingerprint = %miss.fingerprint, generation, "discarding result issued before invalidation");
                WriteOutcome::Rejected
            }
            Some(value) => {
                self.cache.write(miss.fingerprint, value, generation);
                WriteOutcome::Written
            }
        };

        let label = match outcome {
            WriteOutcome::Written => REBUILD_WRITTEN,
            WriteOutcome::Rejected => REBUILD_REJECTED,
            WriteOutcome::Failed => REBUILD_FAILED,
        };
        REBUILD_RESULTS.with_label_values(&[label]).inc();
        outcome
    }

    /// Drops queued misses that can not be dispatched, e.g. while offline
    pub fn discard_queued(&mut self) -> usize {
        let dropped = self.misses.len();
        self.misses.clear();
        dropped
    }

    /// Feedback-changed push: every cached fingerprint of the identity goes stale
    pub fn mark_stale(
        &mut self,
        identity: &FeedbackIdentity,
    ) -> u64 {
        STALE_MARKERS.inc();
        self.staleness.mark_stale(&identity.key())
    }

    pub fn is_stale(
        &self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> bool {
        let key = identity.key();
        match self.cache.get(&fingerprint(&key, options)) {
            Some(entry) => self.staleness.is_stale(&key, entry.generation),
            None => self.staleness.generation(&key) > 0,
        }
    }

    /// Drops cached entries under `prefix`.
    ///
    /// Identities with a query in flight get a new generation, so results
    /// issued before the eviction are rejected instead of written back.
    pub fn evict_by_prefix(
        &mut self,
        prefix: &str,
    ) -> usize {
        let in_flight: HashSet<&String> = self
            .in_flight
            .values()
            .filter(|identity_key| identity_key.starts_with(prefix))
            .collect();
        for identity_key in in_flight {
            self.staleness.mark_stale(identity_key);
        }
        self.cache.evict_by_prefix(prefix)
    }

    /// See [`FeedbackCache::store_rendered`]
    pub fn store_rendered(
        &mut self,
        fingerprint: &str,
        revision: u64,
        rendered: Rendered,
    ) -> bool {
        self.cache.store_rendered(fingerprint, revision, rendered)
    }

    /// Drops everything tied to the current connection
    pub fn reset(&mut self) {
        self.cache.clear();
        self.staleness.clear();
        self.misses.clear();
        self.in_flight.clear();
    }

    pub fn pending_misses(&self) -> usize {
        self.misses.len()
    }

    pub fn queued(&self) -> Vec<Miss> {
        self.misses.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn cache(&self) -> &FeedbackCache {
        &self.cache
    }
}
