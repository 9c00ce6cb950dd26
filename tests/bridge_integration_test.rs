mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use feedback_bridge::Bridge;
use feedback_bridge::BridgeHandle;
use feedback_bridge::ConnectionState;
use feedback_bridge::FeedbackIdentity;
use feedback_bridge::FeedbackOptions;
use feedback_bridge::StatusLevel;
use feedback_bridge::TcpConnector;
use serde_json::json;
use tokio::sync::watch;

struct Running {
    handle: BridgeHandle,
    host: Arc<RecordingHost>,
    _shutdown: watch::Sender<()>,
}

fn run_bridge(addr: std::net::SocketAddr) -> Running {
    let config = bridge_config(addr);
    let connector = Arc::new(TcpConnector::from_config(&config.connection));
    let host = Arc::new(RecordingHost::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let (bridge, handle) = Bridge::new(config, connector, host.clone(), shutdown_rx);
    tokio::spawn(bridge.run());
    Running {
        handle,
        host,
        _shutdown: shutdown_tx,
    }
}

async fn wait_connected(handle: &BridgeHandle) {
    let mut states = handle.subscribe_state();
    tokio::time::timeout(WAIT_TIMEOUT, states.wait_for(|s| *s == ConnectionState::Connected))
        .await
        .expect("bridge did not connect")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feedback_is_served_from_cache_after_rebuild() {
    let engine = TcpEngine::start().await;
    engine.set_feedback("actor1~fb1", json!({"text": "on air"}));
    let bridge = run_bridge(engine.addr);
    wait_connected(&bridge.handle).await;

    let id = FeedbackIdentity::new("actor1", "fb1");
    assert!(bridge.handle.evaluate(&id, &FeedbackOptions::new()).is_none());

    wait_until("feedback cached", || bridge.handle.evaluate(&id, &FeedbackOptions::new()).is_some()).await;
    let value = bridge.handle.evaluate(&id, &FeedbackOptions::new()).unwrap();
    assert_eq!(value.get_str("text"), Some("on air"));
    assert_eq!(engine.count("getFeedbackState"), 1);
    wait_until("client announced", || engine.count("announceClient") == 1).await;
    wait_until("catalog delivered", || bridge.host.count_refreshes() == 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_running_overlay_is_composited() {
    let base = png64(4, 4, [200, 0, 0, 255]);
    let engine = TcpEngine::start().await;
    engine.set_image("glow1", png64(2, 2, [0, 0, 200, 255]));
    engine.state.lock().play_states.insert("glow1".to_string(), "running".to_string());
    engine.set_feedback(
        "actor1~fb1",
        json!({"png64": base, "overlayImageName": "glow1", "label_running": "LIVE", "label_paused": "HOLD"}),
    );
    let bridge = run_bridge(engine.addr);
    wait_connected(&bridge.handle).await;
    wait_until("image set loaded", || bridge.handle.image_count() == 1).await;

    let id = FeedbackIdentity::new("actor1", "fb1");
    bridge.handle.evaluate(&id, &FeedbackOptions::new());
    wait_until("feedback cached", || bridge.handle.cached_entries() == 1).await;

    let value = bridge.handle.evaluate(&id, &FeedbackOptions::new()).unwrap();
    assert_eq!(value.get_str("label"), Some("LIVE"));
    assert_eq!(value.get_str("playState"), Some("running"));
    assert!(value.png64().is_some_and(|png| png != base));
    assert!(value.overlay_image_name().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_feedback_changed_push_refreshes_cached_value() {
    let engine = TcpEngine::start().await;
    engine.set_feedback("actor1~fb1", json!({"text": "v1"}));
    let bridge = run_bridge(engine.addr);
    wait_connected(&bridge.handle).await;
    wait_until("handshake", || engine.count("announceClient") == 1).await;

    let id = FeedbackIdentity::new("actor1", "fb1");
    bridge.handle.evaluate(&id, &FeedbackOptions::new());
    wait_until("v1 cached", || bridge.handle.cached_entries() == 1).await;

    engine.set_feedback("actor1~fb1", json!({"text": "v2"}));
    engine.push(json!({
        "event": "feedbackChanged",
        "data": {"actorId": "actor1", "feedbackId": "fb1", "options": {}, "state": null}
    }));
    wait_until("host asked to re-poll", || bridge.host.checked(&id)).await;

    wait_until("v2 served", || {
        bridge
            .handle
            .evaluate(&id, &FeedbackOptions::new())
            .is_some_and(|v| v.get_str("text") == Some("v2"))
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bridge_reconnects_after_engine_restart() {
    let engine = TcpEngine::start().await;
    engine.set_feedback("actor1~fb1", json!({"text": "hello"}));
    let addr = engine.addr;
    let bridge = run_bridge(addr);
    wait_connected(&bridge.handle).await;

    let id = FeedbackIdentity::new("actor1", "fb1");
    bridge.handle.evaluate(&id, &FeedbackOptions::new());
    wait_until("feedback cached", || bridge.handle.cached_entries() == 1).await;

    engine.stop();
    wait_until("disconnect noticed", || {
        bridge.handle.connection_state() != ConnectionState::Connected
    })
    .await;
    wait_until("cache reset", || {
        bridge.handle.cached_entries() == 0 && bridge.host.count_status(StatusLevel::Warning, "Disconnected") >= 1
    })
    .await;

    let restarted = TcpEngine::restart_on(addr, engine.state.clone()).await;
    wait_connected(&bridge.handle).await;
    wait_until("second connection", || {
        restarted.accepted.load(Ordering::SeqCst) == 1 && bridge.host.count_status(StatusLevel::Ok, "Connected") == 2
    })
    .await;

    bridge.handle.evaluate(&id, &FeedbackOptions::new());
    wait_until("feedback rebuilt", || bridge.handle.cached_entries() == 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_registry_change_triggers_debounced_catalog_refresh() {
    let engine = TcpEngine::start().await;
    let bridge = run_bridge(engine.addr);
    wait_connected(&bridge.handle).await;
    wait_until("handshake", || engine.count("announceClient") == 1).await;
    wait_until("initial catalog", || bridge.host.count_refreshes() == 1).await;

    for _ in 0..3 {
        engine.push(json!({"event": "registryChanged", "data": {"id": "actor1"}}));
    }

    wait_until("debounced refresh", || bridge.host.count_refreshes() == 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bridge.host.count_refreshes(), 2);
}
