//! Cache rebuilder.
//!
//! Resolves one batch of dispatched misses against the remote engine. The
//! bridge takes the batch out of the [`FeedbackEngine`](crate::FeedbackEngine)
//! on every tick, runs it here off the event loop, and applies the
//! resolutions back once all of them have settled.


use futures::future::join_all;
use tracing::debug;
use tracing::warn;

use crate::apply_layer_play_states;
use crate::utils::ScopedTimer;
use crate::DispatchedMiss;
use crate::FeedbackSource;
use crate::LayerPlayStates;
use crate::Resolution;

/// Queries every miss of the batch concurrently.
///
/// Play states are fetched once per batch; if that lookup fails every state
/// resolves as if no play-state record existed. A failed detail query yields
/// a resolution without value.
pub async fn run_batch<S>(
    source: &S,
    batch: Vec<DispatchedMiss>,
) -> Vec<Resolution>
where
    S: FeedbackSource + ?Sized,
{
    if batch.is_empty() {
        return Vec::new();
    }
    let _timer = ScopedTimer::new("rebuild_batch");
    debug!(size = batch.len(), "rebuilding cache batch");

    let layers = match source.query_layer_play_states().await {
        Ok(layers) => layers,
        Err(e) => {
            warn!("layer play states unavailable: {}", e);
            LayerPlayStates::new()
        }
    };

    let queries = batch.into_iter().map(|dispatched| {
        let layers = &layers;
        async move {
            let miss = &dispatched.miss;
            let value = match source.query_feedback_state(&miss.identity, &miss.options).await {
                Ok(mut state) => {
                    apply_layer_play_states(&mut state, layers);
                    Some(state)
                }
                Err(e) => {
                    warn!(fingerprint = %miss.fingerprint, "feedback state query failed: {}", e);
                    None
                }
            };
            Resolution { dispatched, value }
        }
    });

    join_all(queries).await
}
