use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::Rgba;
use image::RgbaImage;

use crate::BridgeConfig;

/// Configuration with intervals short enough for real-time tests
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.connection.reconnect_interval_ms = 50;
    config.connection.request_timeout_ms = 2_000;
    config.cache.rebuild_tick_ms = 20;
    config.cache.registry_debounce_ms = 30;
    config.client.name = "bridge-test".to_string();
    config
}

/// Solid-colour PNG, base64 encoded
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

/// Polls `condition` every few milliseconds; panics after five seconds
pub async fn wait_until<F>(
    what: &str,
    mut condition: F,
) where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
