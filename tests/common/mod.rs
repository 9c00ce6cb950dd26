//! Shared helpers for the integration tests: a TCP remote engine speaking
//! the newline-delimited JSON protocol and a host that records callbacks.

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use feedback_bridge::BridgeConfig;
use feedback_bridge::Catalog;
use feedback_bridge::FeedbackIdentity;
use feedback_bridge::Host;
use feedback_bridge::StatusLevel;
use futures::SinkExt;
use futures::StreamExt;
use image::Rgba;
use image::RgbaImage;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;
use tokio_util::sync::CancellationToken;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn bridge_config(addr: SocketAddr) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.connection.host = addr.ip().to_string();
    config.connection.port = addr.port();
    config.connection.connect_timeout_ms = 500;
    config.connection.reconnect_interval_ms = 100;
    config.connection.request_timeout_ms = 2_000;
    config.cache.rebuild_tick_ms = 20;
    config.cache.registry_debounce_ms = 50;
    config
}

pub fn png64(
    width: u32,
    height: u32,
    color: [u8; 4],
) -> String {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
    STANDARD.encode(buffer.into_inner())
}

pub async fn wait_until<F>(
    what: &str,
    mut condition: F,
) where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//-----------------------------------------------------------
// Remote engine

#[derive(Default)]
pub struct EngineState {
    pub feedback: HashMap<String, Value>,
    pub images: HashMap<String, String>,
    pub play_states: HashMap<String, String>,
    pub methods: Vec<String>,
}

/// Remote engine listening on a local TCP port
pub struct TcpEngine {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<EngineState>>,
    pub accepted: Arc<AtomicUsize>,
    pushes: broadcast::Sender<String>,
    stop: CancellationToken,
}

impl TcpEngine {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::serve(listener, Arc::new(Mutex::new(EngineState::default())))
    }

    /// Binds `addr` again, keeping the engine state
    pub async fn restart_on(
        addr: SocketAddr,
        state: Arc<Mutex<EngineState>>,
    ) -> Self {
        // The previous listener task may still be shutting down
        for _ in 0..40 {
            if let Ok(listener) = TcpListener::bind(addr).await {
                return Self::serve(listener, state);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("could not rebind {addr}");
    }

    fn serve(
        listener: TcpListener,
        state: Arc<Mutex<EngineState>>,
    ) -> Self {
        let addr = listener.local_addr().unwrap();
        let (pushes, _) = broadcast::channel(64);
        let stop = CancellationToken::new();
        let accepted = Arc::new(AtomicUsize::new(0));

        tokio::spawn({
            let state = state.clone();
            let pushes = pushes.clone();
            let stop = stop.clone();
            let accepted = accepted.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        Ok((stream, _)) = listener.accept() => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(handle_connection(stream, state.clone(), pushes.subscribe(), stop.clone()));
                        }
                    }
                }
            }
        });

        Self {
            addr,
            state,
            accepted,
            pushes,
            stop,
        }
    }

    pub fn set_feedback(
        &self,
        key: &str,
        value: Value,
    ) {
        self.state.lock().feedback.insert(key.to_string(), value);
    }

    pub fn set_image(
        &self,
        name: &str,
        payload: String,
    ) {
        self.state.lock().images.insert(name.to_string(), payload);
    }

    pub fn count(
        &self,
        method: &str,
    ) -> usize {
        self.state.lock().methods.iter().filter(|m| *m == method).count()
    }

    pub fn push(
        &self,
        frame: Value,
    ) {
        let _ = self.pushes.send(frame.to_string());
    }

    /// Closes the listener and every open connection
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<Mutex<EngineState>>,
    mut pushes: broadcast::Receiver<String>,
    stop: CancellationToken,
) {
    let mut framed = Framed::new(stream, LinesCodec::new());
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            Ok(frame) = pushes.recv() => {
                if framed.send(frame).await.is_err() {
                    break;
                }
            }
            line = framed.next() => {
                let Some(Ok(line)) = line else { break };
                let request: Value = serde_json::from_str(&line).unwrap();
                let reply = respond(&state, &request);
                if framed.send(reply.to_string()).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn respond(
    state: &Mutex<EngineState>,
    request: &Value,
) -> Value {
    let mut state = state.lock();
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = &request["params"];
    state.methods.push(method.clone());

    match method.as_str() {
        "getImageSet" => json!({"id": id, "result": state.images}),
        "query" => match params[0].as_str() {
            Some("lastUpdateTimestamp") => json!({"id": id, "result": 1}),
            _ => json!({"id": id, "result": {}}),
        },
        "getFeedbackState" => {
            let key = format!("{}~{}", params[0].as_str().unwrap_or_default(), params[1].as_str().unwrap_or_default());
            match state.feedback.get(&key) {
                // Encoded as a string, as some engine versions do
                Some(value) => json!({"id": id, "result": value.to_string()}),
                None => json!({"id": id, "error": "unknown feedback"}),
            }
        }
        "kvGet" => {
            let layers: serde_json::Map<String, Value> = state
                .play_states
                .iter()
                .map(|(k, v)| (k.clone(), json!({"playState": v})))
                .collect();
            json!({"id": id, "result": layers})
        }
        _ => json!({"id": id, "result": null}),
    }
}

//-----------------------------------------------------------
// Host

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Status(StatusLevel, String),
    CheckFeedbacks(Option<FeedbackIdentity>),
    RefreshIntegrations(u64),
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn count_status(
        &self,
        level: StatusLevel,
        message: &str,
    ) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, HostCall::Status(l, m) if *l == level && m == message))
            .count()
    }

    pub fn count_refreshes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, HostCall::RefreshIntegrations(_)))
            .count()
    }

    pub fn checked(
        &self,
        identity: &FeedbackIdentity,
    ) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| matches!(c, HostCall::CheckFeedbacks(Some(i)) if i == identity))
    }
}

impl Host for RecordingHost {
    fn status(
        &self,
        level: StatusLevel,
        message: &str,
    ) {
        self.calls.lock().push(HostCall::Status(level, message.to_string()));
    }

    fn check_feedbacks(
        &self,
        identity: Option<&FeedbackIdentity>,
    ) {
        self.calls.lock().push(HostCall::CheckFeedbacks(identity.cloned()));
    }

    fn refresh_integrations(
        &self,
        catalog: &Catalog,
    ) {
        self.calls.lock().push(HostCall::RefreshIntegrations(catalog.last_update));
    }
}
