use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;

use super::Command;
use crate::post_process;
use crate::CompositorOptions;
use crate::ConnectionState;
use crate::FeedbackEngine;
use crate::FeedbackIdentity;
use crate::FeedbackOptions;
use crate::FeedbackState;
use crate::ImageSet;
use crate::Rendered;

/// Image set published by the event loop; the version changes on every swap
#[derive(Debug, Default)]
pub(crate) struct PublishedImages {
    pub version: u64,
    pub images: ImageSet,
}

/// Host side of the bridge. Cheap to clone.
#[derive(Clone)]
pub struct BridgeHandle {
    pub(super) engine: Arc<Mutex<FeedbackEngine>>,
    pub(super) images: Arc<ArcSwap<PublishedImages>>,
    pub(super) commands: mpsc::UnboundedSender<Command>,
    pub(super) state: watch::Receiver<ConnectionState>,
    pub(super) compositor: CompositorOptions,
}

impl BridgeHandle {
    /// Current value of a feedback instance; never waits on the network.
    ///
    /// A hit is post-processed against the image set once per cache write and
    /// image set version; later polls reuse the stored copy. A miss, or a hit
    /// whose identity was marked stale, queues a refresh.
    pub fn evaluate(
        &self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> Option<FeedbackState> {
        let lookup = self.engine.lock().lookup(identity, options);

        if lookup.schedule && self.commands.send(Command::Wake).is_err() {
            debug!(%identity, "bridge stopped, miss will not be rebuilt");
        }

        let cached = lookup.value?;
        let published = self.images.load();
        if let Some(rendered) = lookup.rendered.filter(|r| r.image_version == published.version) {
            return Some(rendered.value);
        }

        let value = post_process(&cached, &published.images, self.compositor);
        let rendered = Rendered {
            image_version: published.version,
            value: value.clone(),
        };
        self.engine.lock().store_rendered(&lookup.fingerprint, lookup.revision, rendered);
        Some(value)
    }

    /// Re-fetch raw definitions and hand them to the host
    pub fn refresh_integrations(&self) {
        if self.commands.send(Command::RefreshIntegrations).is_err() {
            debug!("bridge stopped, refresh ignored");
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_stale(
        &self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> bool {
        self.engine.lock().is_stale(identity, options)
    }

    pub fn pending_misses(&self) -> usize {
        self.engine.lock().pending_misses()
    }

    pub fn cached_entries(&self) -> usize {
        self.engine.lock().cached_entries()
    }

    pub fn image_count(&self) -> usize {
        self.images.load().images.len()
    }
}
