use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::BridgeHandle;
use super::Command;
use super::PublishedImages;
use super::TaskOutcome;
use crate::constants::STATUS_CONNECTED;
use crate::constants::STATUS_CONNECTING;
use crate::constants::STATUS_DISCONNECTED;
use crate::rebuilder::run_batch;
use crate::utils::DeadlineTimer;
use crate::BridgeConfig;
use crate::ClientIdentity;
use crate::CompositorOptions;
use crate::ConnectionContext;
use crate::ConnectionManager;
use crate::ConnectionSignal;
use crate::Connector;
use crate::FeedbackEngine;
use crate::FeedbackIdentity;
use crate::Host;
use crate::ImageSet;
use crate::PushChannel;
use crate::PushEvent;
use crate::Result;
use crate::RpcEvent;
use crate::StatusLevel;
use crate::Transition;
use crate::WriteOutcome;

/// Event loop of the bridge. Created together with its [`BridgeHandle`].
pub struct Bridge {
    host: Arc<dyn Host>,
    engine: Arc<Mutex<FeedbackEngine>>,
    images: Arc<ArcSwap<PublishedImages>>,
    image_version: u64,
    connection: ConnectionManager,
    identity: ClientIdentity,
    image_set_tag: String,

    commands: mpsc::UnboundedReceiver<Command>,
    tasks: JoinSet<TaskOutcome>,

    rebuild_timer: DeadlineTimer,
    refresh_debounce: DeadlineTimer,

    shutdown_signal: watch::Receiver<()>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn Connector>,
        host: Arc<dyn Host>,
        shutdown_signal: watch::Receiver<()>,
    ) -> (Self, BridgeHandle) {
        let engine = Arc::new(Mutex::new(FeedbackEngine::new()));
        let images = Arc::new(ArcSwap::from_pointee(PublishedImages::default()));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let connection = ConnectionManager::new(
            connector,
            config.connection.reconnect_interval(),
            config.connection.request_timeout(),
        );

        let handle = BridgeHandle {
            engine: engine.clone(),
            images: images.clone(),
            commands: commands_tx,
            state: connection.subscribe(),
            compositor: CompositorOptions {
                include_media_prefix: config.cache.include_media_prefix,
            },
        };

        let bridge = Self {
            host,
            engine,
            images,
            image_version: 0,
            connection,
            identity: ClientIdentity {
                name: config.client.name.clone(),
                version: config.client.version.clone(),
                instance_id: nanoid::nanoid!(),
            },
            image_set_tag: config.cache.image_set_tag.clone(),
            commands: commands_rx,
            tasks: JoinSet::new(),
            rebuild_timer: DeadlineTimer::new(config.cache.rebuild_tick()),
            refresh_debounce: DeadlineTimer::new(config.cache.registry_debounce()),
            shutdown_signal,
        };
        (bridge, handle)
    }

    pub fn instance_id(&self) -> &str {
        &self.identity.instance_id
    }

    /// Runs until the shutdown signal fires or its sender is dropped
    pub async fn run(mut self) -> Result<()> {
        info!(instance_id = %self.identity.instance_id, "bridge started");
        self.host.status(StatusLevel::Warning, STATUS_CONNECTING);
        self.start_connect();

        loop {
            tokio::select! {
                biased;
                // P0: shutdown
                _ = self.shutdown_signal.changed() => {
                    warn!("shutdown signal received");
                    self.tasks.abort_all();
                    self.connection.shutdown();
                    return Ok(());
                }
                // P1: host commands
                Some(command) = self.commands.recv() => {
                    trace!(?command, "receive command");
                    self.handle_command(command);
                }
                // P2: completed background work
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok(outcome) => self.handle_outcome(outcome),
                        Err(e) => log_join_error(e),
                    }
                }
                // P3: pushes, close, reconnect deadline
                signal = self.connection.next_signal() => {
                    match signal {
                        ConnectionSignal::Rpc(RpcEvent::Push(event)) => self.handle_push(event),
                        ConnectionSignal::Rpc(RpcEvent::Closed(reason)) => {
                            let transition = self.connection.on_closed(&reason);
                            self.apply_transition(transition);
                        }
                        ConnectionSignal::ReconnectDue => self.start_connect(),
                    }
                }
                // P4: rebuild tick
                _ = self.rebuild_timer.expired() => {
                    self.rebuild_timer.clear();
                    self.rebuild_tick();
                }
                // P5: debounced catalog refresh
                _ = self.refresh_debounce.expired() => {
                    self.refresh_debounce.clear();
                    self.spawn_catalog_refresh();
                }
            }
        }
    }

    fn handle_command(
        &mut self,
        command: Command,
    ) {
        match command {
            Command::Wake => {
                if self.engine.lock().pending_misses() > 0 && self.rebuild_timer.arm_if_idle() {
                    trace!("rebuild tick armed");
                }
            }
            Command::RefreshIntegrations => self.spawn_catalog_refresh(),
        }
    }

    fn handle_push(
        &mut self,
        event: PushEvent,
    ) {
        match event {
            PushEvent::FeedbackChanged(change) => {
                let identity = change.identity();
                let generation = self.engine.lock().mark_stale(&identity);
                debug!(%identity, generation, "feedback marked stale");
                self.host.check_feedbacks(Some(&identity));
            }
            PushEvent::RegistryChanged { actor_id } => {
                let prefix = FeedbackIdentity::actor_prefix(&actor_id);
                let evicted = self.engine.lock().evict_by_prefix(&prefix);
                info!(%actor_id, evicted, "registry changed");
                self.host.check_feedbacks(None);
                self.refresh_debounce.rearm();
            }
        }
    }

    fn handle_outcome(
        &mut self,
        outcome: TaskOutcome,
    ) {
        match outcome {
            TaskOutcome::Connect { epoch, result } => {
                let transition = self.connection.on_connect_result(epoch, result);
                self.apply_transition(transition);
            }
            TaskOutcome::Setup {
                epoch,
                images,
                handshake,
            } => {
                // Image set goes live before the state flips to Connected
                if self.connection.is_current(epoch) && handshake.is_ok() {
                    match images {
                        Ok(images) => {
                            debug!(epoch, count = images.len(), "image set loaded");
                            self.publish_images(images);
                        }
                        Err(e) => warn!(epoch, "image set unavailable: {}", e),
                    }
                }
                let transition = self.connection.on_handshake(epoch, handshake);
                self.apply_transition(transition);
            }
            TaskOutcome::Catalog { epoch, result } => {
                if !self.connection.is_current(epoch) {
                    return;
                }
                match result {
                    Ok(catalog) => self.host.refresh_integrations(&catalog),
                    Err(e) => warn!(epoch, "definition refresh failed: {}", e),
                }
            }
            TaskOutcome::Rebuilt { epoch, resolutions } => {
                if !self.connection.is_current(epoch) {
                    debug!(epoch, "discarding rebuild of a previous connection");
                    return;
                }
                let outcomes: Vec<WriteOutcome> = {
                    let mut engine = self.engine.lock();
                    resolutions.into_iter().map(|r| engine.apply(r)).collect()
                };
                let changed = outcomes
                    .iter()
                    .filter(|o| matches!(o, WriteOutcome::Written | WriteOutcome::Rejected))
                    .count();
                debug!(epoch, settled = outcomes.len(), changed, "rebuild batch applied");
                if changed > 0 {
                    self.host.check_feedbacks(None);
                }
            }
        }
    }

    fn apply_transition(
        &mut self,
        transition: Transition,
    ) {
        match transition {
            Transition::Opened(context) => self.start_handshake(context),
            Transition::Connected(_) => self.enter_connected(),
            Transition::Disconnected { .. } => self.enter_disconnected(),
            Transition::Unchanged => {}
        }
    }

    /// Image set, push subscriptions and client announcement; the connection
    /// only counts once all of them went through
    fn start_handshake(
        &mut self,
        context: ConnectionContext,
    ) {
        let ConnectionContext { epoch, client } = context;
        let tag = self.image_set_tag.clone();
        let identity = self.identity.clone();

        self.tasks.spawn(async move {
            let images = client.fetch_image_set(&tag).await;
            let handshake = async {
                for channel in PushChannel::ALL {
                    client.subscribe(channel).await?;
                }
                client.announce_client(&identity).await
            }
            .await;
            TaskOutcome::Setup {
                epoch,
                images,
                handshake,
            }
        });
    }

    fn enter_connected(&mut self) {
        self.host.status(StatusLevel::Ok, STATUS_CONNECTED);
        self.host.check_feedbacks(None);
        self.spawn_catalog_refresh();
    }

    fn enter_disconnected(&mut self) {
        self.tasks.abort_all();
        self.engine.lock().reset();
        self.publish_images(ImageSet::new());
        self.rebuild_timer.clear();
        self.refresh_debounce.clear();
        self.host.status(StatusLevel::Warning, STATUS_DISCONNECTED);
    }

    fn start_connect(&mut self) {
        if let Some(attempt) = self.connection.begin_connect() {
            self.tasks.spawn(async move {
                let (epoch, result) = attempt.await;
                TaskOutcome::Connect { epoch, result }
            });
        }
    }

    fn publish_images(
        &mut self,
        images: ImageSet,
    ) {
        self.image_version += 1;
        self.images.store(Arc::new(PublishedImages {
            version: self.image_version,
            images,
        }));
    }

    fn spawn_catalog_refresh(&mut self) {
        let Some(ConnectionContext { epoch, client }) = self.connection.connected_context().cloned() else {
            debug!("not connected, definition refresh skipped");
            return;
        };
        self.tasks.spawn(async move {
            TaskOutcome::Catalog {
                epoch,
                result: client.fetch_catalog().await,
            }
        });
    }

    fn rebuild_tick(&mut self) {
        let context = self.connection.connected_context().cloned();
        let mut engine = self.engine.lock();

        let Some(ConnectionContext { epoch, client }) = context else {
            let dropped = engine.discard_queued();
            debug!(dropped, "not connected, queued misses dropped");
            return;
        };

        let batch = engine.take_batch();
        drop(engine);
        if batch.is_empty() {
            return;
        }

        trace!(epoch, size = batch.len(), "rebuild tick");
        self.tasks.spawn(async move {
            let resolutions = run_batch(&client, batch).await;
            TaskOutcome::Rebuilt { epoch, resolutions }
        });
    }
}

fn log_join_error(e: JoinError) {
    if e.is_cancelled() {
        trace!("background task aborted");
    } else {
        error!("background task failed: {:?}", e);
    }
}
