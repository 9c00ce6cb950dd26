use serde::Deserialize;
use tracing::warn;

use super::Notification;
use crate::constants::EVENT_FEEDBACK_CHANGED;
use crate::constants::EVENT_REGISTRY_CHANGED;
use crate::FeedbackChange;

/// The two push channels the bridge subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushChannel {
    RegistryChanged,
    FeedbackChanged,
}

impl PushChannel {
    pub const ALL: [PushChannel; 2] = [PushChannel::RegistryChanged, PushChannel::FeedbackChanged];

    pub fn as_str(&self) -> &'static str {
        match self {
            PushChannel::RegistryChanged => EVENT_REGISTRY_CHANGED,
            PushChannel::FeedbackChanged => EVENT_FEEDBACK_CHANGED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// An actor's definitions changed on the engine
    RegistryChanged { actor_id: String },
    FeedbackChanged(FeedbackChange),
}

#[derive(Deserialize)]
struct RegistryChangedData {
    id: String,
}

impl PushEvent {
    /// Decodes a notification frame; unknown or malformed ones yield None
    pub fn from_notification(notification: Notification) -> Option<Self> {
        match notification.event.as_str() {
            EVENT_REGISTRY_CHANGED => match serde_json::from_value::<RegistryChangedData>(notification.data) {
                Ok(data) => Some(PushEvent::RegistryChanged { actor_id: data.id }),
                Err(e) => {
                    warn!("malformed registryChanged notification: {}", e);
                    None
                }
            },
            EVENT_FEEDBACK_CHANGED => match serde_json::from_value::<FeedbackChange>(notification.data) {
                Ok(change) => Some(PushEvent::FeedbackChanged(change)),
                Err(e) => {
                    warn!("malformed feedbackChanged notification: {}", e);
                    None
                }
            },
            other => {
                warn!(event = other, "ignoring unknown notification");
                None
            }
        }
    }
}

/// What a connection's driver reports back to its owner
#[derive(Debug)]
pub enum RpcEvent {
    Push(PushEvent),
    /// Driver stopped; the connection is gone
    Closed(String),
}
