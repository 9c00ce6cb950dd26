use std::future;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Connector;
use super::Transport;
use crate::metrics::RECONNECT_ATTEMPTS;
use crate::utils::DeadlineTimer;
use crate::RpcClient;
use crate::RpcError;
use crate::RpcEvent;
use crate::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Live connection handed to everything that calls remotely.
///
/// Dropped on disconnect; work tagged with an older epoch is discarded.
#[derive(Clone)]
pub struct ConnectionContext {
    pub epoch: u64,
    pub client: RpcClient,
}

/// What the owner has to react to after feeding the manager an event
pub enum Transition {
    /// Socket is up; the handshake has to run before the connection counts
    Opened(ConnectionContext),
    Connected(ConnectionContext),
    Disconnected {
        /// A new reconnect deadline was set by this transition
        reconnect_armed: bool,
    },
    Unchanged,
}

pub enum ConnectionSignal {
    Rpc(RpcEvent),
    ReconnectDue,
}

pub type ConnectResult = Result<Box<dyn Transport>, TransportError>;

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    request_timeout: Duration,
    epoch: u64,
    state: watch::Sender<ConnectionState>,
    context: Option<ConnectionContext>,
    events: Option<mpsc::UnboundedReceiver<RpcEvent>>,
    reconnect: DeadlineTimer,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        reconnect_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            request_timeout,
            epoch: 0,
            state,
            context: None,
            events: None,
            reconnect: DeadlineTimer::new(reconnect_interval),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn context(&self) -> Option<&ConnectionContext> {
        self.context.as_ref()
    }

    /// Context of a connection that completed its handshake
    pub fn connected_context(&self) -> Option<&ConnectionContext> {
        match self.state() {
            ConnectionState::Connected => self.context.as_ref(),
            _ => None,
        }
    }

    /// True while `epoch` names the live connection
    pub fn is_current(
        &self,
        epoch: u64,
    ) -> bool {
        self.epoch == epoch && self.context.is_some()
    }

    pub fn reconnect_timer(&self) -> &DeadlineTimer {
        &self.reconnect
    }

    /// Starts an attempt when disconnected.
    ///
    /// Clears the reconnect deadline. The returned future resolves with the
    /// attempt's epoch and must be fed back through [`Self::on_connect_result`].
    pub fn begin_connect(&mut self) -> Option<impl Future<Output = (u64, ConnectResult)> + Send + 'static> {
        if self.state() != ConnectionState::Disconnected {
            return None;
        }
        self.reconnect.clear();
        self.epoch += 1;
        self.state.send_replace(ConnectionState::Connecting);
        RECONNECT_ATTEMPTS.inc();

        let epoch = self.epoch;
        let connector = self.connector.clone();
        debug!(epoch, "connection attempt started");
        Some(async move { (epoch, connector.connect().await) })
    }

    pub fn on_connect_result(
        &mut self,
        epoch: u64,
        result: ConnectResult,
    ) -> Transition {
        if epoch != self.epoch || self.state() != ConnectionState::Connecting {
            debug!(epoch, current = self.epoch, "discarding outdated connection attempt");
            return Transition::Unchanged;
        }

        match result {
            Ok(transport) => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let client = RpcClient::spawn(transport, self.request_timeout, events_tx);
                let context = ConnectionContext { epoch, client };
                self.context = Some(context.clone());
                self.events = Some(events_rx);
                debug!(epoch, "socket open, handshake pending");
                Transition::Opened(context)
            }
            Err(e) => {
                warn!(epoch, "connection attempt failed: {}", e);
                self.enter_disconnected()
            }
        }
    }

    /// Completes the attempt started by [`Self::begin_connect`].
    ///
    /// A failed handshake is handled like a transport failure.
    pub fn on_handshake(
        &mut self,
        epoch: u64,
        result: Result<(), RpcError>,
    ) -> Transition {
        if !self.is_current(epoch) || self.state() != ConnectionState::Connecting {
            debug!(epoch, current = self.epoch, "discarding outdated handshake");
            return Transition::Unchanged;
        }
        let Some(context) = self.context.clone() else {
            return Transition::Unchanged;
        };

        match result {
            Ok(()) => {
                self.state.send_replace(ConnectionState::Connected);
                info!(epoch, "connected to remote engine");
                Transition::Connected(context)
            }
            Err(e) => {
                warn!(epoch, "handshake failed: {}", e);
                self.enter_disconnected()
            }
        }
    }

    /// Socket closed or errored
    pub fn on_closed(
        &mut self,
        reason: &str,
    ) -> Transition {
        if self.state() == ConnectionState::Disconnected {
            return Transition::Unchanged;
        }
        warn!(epoch = self.epoch, %reason, "connection lost");
        self.enter_disconnected()
    }

    /// Next push or close of the live connection, or the reconnect deadline
    pub async fn next_signal(&mut self) -> ConnectionSignal {
        let reconnect = &self.reconnect;
        let events = &mut self.events;
        tokio::select! {
            _ = reconnect.expired() => ConnectionSignal::ReconnectDue,
            event = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => future::pending().await,
                }
            } => ConnectionSignal::Rpc(event.unwrap_or_else(|| RpcEvent::Closed("event channel closed".to_string()))),
        }
    }

    /// Drops the connection without arming a reconnect
    pub fn shutdown(&mut self) {
        self.reconnect.clear();
        self.drop_context();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn enter_disconnected(&mut self) -> Transition {
        self.drop_context();
        self.state.send_replace(ConnectionState::Disconnected);
        let reconnect_armed = self.reconnect.arm_if_idle();
        if reconnect_armed {
            debug!(interval = ?self.reconnect.interval(), "reconnect scheduled");
        }
        Transition::Disconnected { reconnect_armed }
    }

    fn drop_context(&mut self) {
        if let Some(context) = self.context.take() {
            context.client.close();
        }
        self.events = None;
    }
}
