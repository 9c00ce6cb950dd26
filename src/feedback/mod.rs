//! Feedback identity and resolved state records.
//!
//! A resolved state is kept as a flat JSON object exactly as the remote
//! engine produced it (after play-state resolution), so that fields the
//! bridge does not know about still reach the host untouched.

mod play_state;
pub use play_state::*;


use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::constants::FIELD_IMAGE_NAME;
use crate::constants::FIELD_OVERLAY_IMAGE_NAME;
use crate::constants::FIELD_PLAY_STATE;
use crate::constants::FIELD_PNG64;
use crate::constants::IDENTITY_SEPARATOR;

/// Host supplied parameters of a feedback instance
pub type FeedbackOptions = Map<String, Value>;

/// What is being asked about, independent of options
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackIdentity {
    pub actor_id: String,
    pub feedback_id: String,
}

impl FeedbackIdentity {
    pub fn new(
        actor_id: impl Into<String>,
        feedback_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            feedback_id: feedback_id.into(),
        }
    }

    /// Bare key `actorId~feedbackId` used by stale markers and fingerprints
    pub fn key(&self) -> String {
        format!("{}{}{}", self.actor_id, IDENTITY_SEPARATOR, self.feedback_id)
    }

    /// Prefix shared by every fingerprint of the given actor
    pub fn actor_prefix(actor_id: &str) -> String {
        format!("{actor_id}{IDENTITY_SEPARATOR}")
    }
}

impl fmt::Display for FeedbackIdentity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}{}{}", self.actor_id, IDENTITY_SEPARATOR, self.feedback_id)
    }
}

/// Resolved feedback value as returned to the host
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackState(Map<String, Value>);

impl FeedbackState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(
        &self,
        field: &str,
    ) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(
        &self,
        field: &str,
    ) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(
        &mut self,
        field: &str,
    ) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(
        &self,
        field: &str,
    ) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn png64(&self) -> Option<&str> {
        self.get_str(FIELD_PNG64)
    }

    pub fn image_name(&self) -> Option<&str> {
        self.get_str(FIELD_IMAGE_NAME)
    }

    pub fn overlay_image_name(&self) -> Option<&str> {
        self.get_str(FIELD_OVERLAY_IMAGE_NAME)
    }

    pub fn play_state(&self) -> Option<PlayState> {
        self.get_str(FIELD_PLAY_STATE).map(PlayState::from_wire)
    }
}

impl From<Map<String, Value>> for FeedbackState {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Push notification payload of the feedback-changed channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackChange {
    pub actor_id: String,
    pub feedback_id: String,
    #[serde(default)]
    pub options: FeedbackOptions,
    #[serde(default)]
    pub state: Value,
}

impl FeedbackChange {
    pub fn identity(&self) -> FeedbackIdentity {
        FeedbackIdentity::new(self.actor_id.clone(), self.feedback_id.clone())
    }
}
