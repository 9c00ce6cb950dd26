use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tokio_util::sync::CancellationToken;

use crate::Connector;
use crate::Request;
use crate::Transport;
use crate::TransportError;

/// Scriptable remote engine served over in-memory duplex streams.
///
/// Acts as its own [`Connector`]: every `connect` opens a fresh connection
/// unless refusals are queued with [`FakeEngine::refuse_next`].
#[derive(Default)]
pub struct FakeEngine {
    data: Arc<Mutex<EngineData>>,
    live: Mutex<Option<LiveConnection>>,
    attempts: AtomicUsize,
    refusals: AtomicUsize,
}

#[derive(Default)]
struct EngineData {
    feedback: HashMap<String, Value>,
    images: HashMap<String, String>,
    play_states: HashMap<String, String>,
    definitions: HashMap<String, Value>,
    last_update: u64,
    calls: Vec<(String, Vec<Value>)>,
    /// method -> number of upcoming calls answered with an error
    failures: HashMap<String, usize>,
}

struct LiveConnection {
    pushes: mpsc::UnboundedSender<String>,
    kill: CancellationToken,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_feedback(
        &self,
        key: &str,
        state: Value,
    ) {
        self.data.lock().feedback.insert(key.to_string(), state);
    }

    pub fn set_image(
        &self,
        name: &str,
        payload: String,
    ) {
        self.data.lock().images.insert(name.to_string(), payload);
    }

    pub fn set_play_state(
        &self,
        layer: &str,
        play_state: &str,
    ) {
        self.data.lock().play_states.insert(layer.to_string(), play_state.to_string());
    }

    pub fn set_definitions(
        &self,
        kind: &str,
        definitions: Value,
    ) {
        self.data.lock().definitions.insert(kind.to_string(), definitions);
    }

    pub fn set_last_update(
        &self,
        ts: u64,
    ) {
        self.data.lock().last_update = ts;
    }

    /// Answers the next `n` calls of `method` with a remote error
    pub fn fail_next(
        &self,
        method: &str,
        n: usize,
    ) {
        self.data.lock().failures.insert(method.to_string(), n);
    }

    pub fn refuse_next(
        &self,
        n: usize,
    ) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Params of every received call of `method`, in arrival order
    pub fn calls_of(
        &self,
        method: &str,
    ) -> Vec<Vec<Value>> {
        self.data
            .lock()
            .calls
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn push_feedback_changed(
        &self,
        actor_id: &str,
        feedback_id: &str,
    ) {
        self.push(json!({
            "event": "feedbackChanged",
            "data": {"actorId": actor_id, "feedbackId": feedback_id, "options": {}, "state": null}
        }));
    }

    pub fn push_registry_changed(
        &self,
        actor_id: &str,
    ) {
        self.push(json!({"event": "registryChanged", "data": {"id": actor_id}}));
    }

    /// Closes the live connection from the engine side
    pub fn drop_connection(&self) {
        if let Some(live) = self.live.lock().take() {
            live.kill.cancel();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.live.lock().is_some()
    }

    fn push(
        &self,
        frame: Value,
    ) {
        let live = self.live.lock();
        let live = live.as_ref().expect("no live connection");
        live.pushes.send(frame.to_string()).expect("connection gone");
    }
}

#[async_trait]
impl Connector for FakeEngine {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Closed("connection refused".to_string()));
        }

        let (local, remote) = tokio::io::duplex(1 << 20);
        let (pushes_tx, pushes_rx) = mpsc::unbounded_channel();
        let kill = CancellationToken::new();
        *self.live.lock() = Some(LiveConnection {
            pushes: pushes_tx,
            kill: kill.clone(),
        });
        tokio::spawn(serve(remote, self.data.clone(), pushes_rx, kill));
        Ok(Box::new(local))
    }
}

async fn serve(
    stream: DuplexStream,
    data: Arc<Mutex<EngineData>>,
    mut pushes: mpsc::UnboundedReceiver<String>,
    kill: CancellationToken,
) {
    let mut framed = Framed::new(stream, LinesCodec::new());
    loop {
        tokio::select! {
            _ = kill.cancelled() => break,
            Some(frame) = pushes.recv() => {
                if framed.send(frame).await.is_err() {
                    break;
                }
            }
            line = framed.next() => {
                let Some(Ok(line)) = line else { break };
                let request: Request = serde_json::from_str(&line).expect("client sent a bad frame");
                let reply = respond(&data, &request);
                if framed.send(reply.to_string()).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn respond(
    data: &Mutex<EngineData>,
    request: &Request,
) -> Value {
    let mut data = data.lock();
    data.calls.push((request.method.clone(), request.params.clone()));
    let id = request.id;
    if let Some(remaining) = data.failures.get_mut(&request.method).filter(|n| **n > 0) {
        *remaining -= 1;
        return json!({"id": id, "error": "not ready"});
    }
    let param = |i: usize| request.params.get(i).and_then(Value::as_str).unwrap_or_default().to_string();

    match request.method.as_str() {
        "getImageSet" => json!({"id": id, "result": data.images}),
        "query" => match param(0).as_str() {
            "lastUpdateTimestamp" => json!({"id": id, "result": data.last_update}),
            kind => json!({"id": id, "result": data.definitions.get(kind).cloned().unwrap_or(json!({}))}),
        },
        "getFeedbackState" => {
            let key = format!("{}~{}", param(0), param(1));
            match data.feedback.get(&key) {
                Some(state) => json!({"id": id, "result": state}),
                None => json!({"id": id, "error": format!("unknown feedback {key}")}),
            }
        }
        "kvGet" => {
            let layers: serde_json::Map<String, Value> = data
                .play_states
                .iter()
                .map(|(layer, state)| (layer.clone(), json!({"playState": state})))
                .collect();
            json!({"id": id, "result": layers})
        }
        "announceClient" | "subscribe" => json!({"id": id, "result": null}),
        other => json!({"id": id, "error": format!("unknown method {other}")}),
    }
}
