use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Feedback cache, rebuilder and image handling parameters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Interval between rebuilder ticks while misses are queued
    ///
    /// Default: 500ms
    #[serde(default = "default_rebuild_tick_ms")]
    pub rebuild_tick_ms: u64,

    /// Quiet period before a registry change triggers a catalog refresh
    #[serde(default = "default_registry_debounce_ms")]
    pub registry_debounce_ms: u64,

    /// Tag of the image set fetched on every connection
    #[serde(default = "default_image_set_tag")]
    pub image_set_tag: String,

    /// Prefix composited payloads with `data:image/png;base64,`
    ///
    /// Default: false
    #[serde(default)]
    pub include_media_prefix: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rebuild_tick_ms: default_rebuild_tick_ms(),
            registry_debounce_ms: default_registry_debounce_ms(),
            image_set_tag: default_image_set_tag(),
            include_media_prefix: false,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rebuild_tick_ms == 0 {
            return Err(invalid("cache.rebuild_tick_ms must be greater than 0"));
        }
        if self.image_set_tag.trim().is_empty() {
            return Err(invalid("cache.image_set_tag cannot be empty"));
        }
        Ok(())
    }

    pub fn rebuild_tick(&self) -> Duration {
        Duration::from_millis(self.rebuild_tick_ms)
    }

    pub fn registry_debounce(&self) -> Duration {
        Duration::from_millis(self.registry_debounce_ms)
    }
}

fn default_rebuild_tick_ms() -> u64 {
    500
}
fn default_registry_debounce_ms() -> u64 {
    1000
}
fn default_image_set_tag() -> String {
    "overlays".to_string()
}
