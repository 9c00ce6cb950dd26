use std::collections::HashMap;

/// Per-identity invalidation counters.
///
/// A feedback-changed push bumps the generation of its identity. Cache
/// entries remember the generation they were queried under, so an entry is
/// stale while its generation lags behind the identity's, and a rebuild
/// result is only accepted when its query was issued at the current
/// generation.
#[derive(Debug, Default)]
pub struct StalenessTracker {
    generations: HashMap<String, u64>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stale marker for the identity key, returns the new generation
    pub fn mark_stale(
        &mut self,
        identity_key: &str,
    ) -> u64 {
        let generation = self.generations.entry(identity_key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub fn generation(
        &self,
        identity_key: &str,
    ) -> u64 {
        self.generations.get(identity_key).copied().unwrap_or(0)
    }

    /// Whether a value captured at `generation` predates the last stale marker
    pub fn is_stale(
        &self,
        identity_key: &str,
        generation: u64,
    ) -> bool {
        generation < self.generation(identity_key)
    }

    pub fn clear(&mut self) {
        self.generations.clear();
    }
}
