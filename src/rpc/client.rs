use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Inbound;
use super::PushEvent;
use super::Request;
use super::Response;
use super::RpcEvent;
use crate::RpcError;
use crate::TransportError;

type PendingCall = oneshot::Sender<Result<Value, RpcError>>;

/// Handle for issuing remote calls over one connection.
///
/// Cheap to clone. Every `call` gets its own future; responses are matched by
/// request id. The socket is owned by a driver task that stops when the peer
/// closes, when `close` is called, or when the last handle is dropped.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, PendingCall>>,
    outbound: mpsc::UnboundedSender<String>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl RpcClient {
    /// Takes ownership of `stream` and spawns its driver.
    ///
    /// Push notifications and the final close are reported on `events`.
    pub fn spawn<S>(
        stream: S,
        request_timeout: Duration,
        events: mpsc::UnboundedSender<RpcEvent>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(DashMap::new());
        let shutdown = CancellationToken::new();

        tokio::spawn(drive(
            Framed::new(stream, LinesCodec::new()),
            outbound_rx,
            pending.clone(),
            events,
            shutdown.clone(),
        ));

        Self {
            inner: Arc::new(ClientInner {
                next_id: AtomicU64::new(1),
                pending,
                outbound: outbound_tx,
                request_timeout,
                shutdown,
            }),
        }
    }

    /// Sends `method(params...)` and waits for its answer
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&Request {
            id,
            method: method.to_string(),
            params,
        })?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        if self.inner.outbound.send(line).is_err() {
            self.inner.pending.remove(&id);
            return Err(RpcError::Disconnected);
        }
        trace!(id, method, "request sent");

        match timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Driver dropped the sender: connection is gone
            Ok(Err(_)) => Err(RpcError::Disconnected),
            Err(_) => {
                self.inner.pending.remove(&id);
                Err(RpcError::Timeout {
                    method: method.to_string(),
                    duration: self.inner.request_timeout,
                })
            }
        }
    }

    /// Stops the driver; outstanding calls fail with `Disconnected`
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled() || self.inner.outbound.is_closed()
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }
}

async fn drive<S>(
    mut framed: Framed<S, LinesCodec>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    pending: Arc<DashMap<u64, PendingCall>>,
    events: mpsc::UnboundedSender<RpcEvent>,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reason = loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break "closed locally".to_string(),
            line = outbound.recv() => match line {
                Some(line) => {
                    if let Err(e) = framed.send(line).await {
                        break format!("write failed: {}", TransportError::from(e));
                    }
                }
                None => break "all handles dropped".to_string(),
            },
            frame = framed.next() => match frame {
                Some(Ok(line)) => dispatch(&line, &pending, &events),
                Some(Err(e)) => break format!("read failed: {}", TransportError::from(e)),
                None => break "closed by peer".to_string(),
            },
        }
    };

    debug!(%reason, "rpc driver stopped");
    // Dropping the senders fails every outstanding call with Disconnected
    pending.clear();
    let _ = events.send(RpcEvent::Closed(reason));
}

fn dispatch(
    line: &str,
    pending: &DashMap<u64, PendingCall>,
    events: &mpsc::UnboundedSender<RpcEvent>,
) {
    if line.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<Inbound>(line) {
        Ok(Inbound::Response(Response { id, result, error })) => {
            let Some((_, tx)) = pending.remove(&id) else {
                debug!(id, "response for unknown or abandoned request");
                return;
            };
            let outcome = match error {
                Some(message) => Err(RpcError::Remote(message)),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(outcome);
        }
        Ok(Inbound::Notification(notification)) => {
            if let Some(event) = PushEvent::from_notification(notification) {
                let _ = events.send(RpcEvent::Push(event));
            }
        }
        Err(e) => warn!("skipping unparsable frame: {}", e),
    }
}
