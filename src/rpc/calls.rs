use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::PushChannel;
use super::RpcClient;
use crate::constants::KEY_LAYER_PLAY_STATES;
use crate::constants::METHOD_ANNOUNCE_CLIENT;
use crate::constants::METHOD_GET_FEEDBACK_STATE;
use crate::constants::METHOD_GET_IMAGE_SET;
use crate::constants::METHOD_KV_GET;
use crate::constants::METHOD_QUERY;
use crate::constants::METHOD_SUBSCRIBE;
use crate::FeedbackIdentity;
use crate::FeedbackOptions;
use crate::FeedbackState;
use crate::ImageSet;
use crate::LayerPlayStates;
use crate::RpcError;

/// Kinds accepted by the engine's `query` method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Actions,
    Presets,
    Feedbacks,
    LastUpdateTimestamp,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Actions => "actions",
            DefinitionKind::Presets => "presets",
            DefinitionKind::Feedbacks => "feedbacks",
            DefinitionKind::LastUpdateTimestamp => "lastUpdateTimestamp",
        }
    }
}

impl FromStr for DefinitionKind {
    type Err = RpcError;

    fn from_str(kind: &str) -> Result<Self, Self::Err> {
        match kind {
            "actions" => Ok(DefinitionKind::Actions),
            "presets" => Ok(DefinitionKind::Presets),
            "feedbacks" => Ok(DefinitionKind::Feedbacks),
            "lastUpdateTimestamp" => Ok(DefinitionKind::LastUpdateTimestamp),
            other => Err(RpcError::UnsupportedKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionPayload {
    Definitions(Value),
    Timestamp(u64),
}

/// Raw definitions handed to the host's catalog builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub actions: Value,
    pub presets: Value,
    pub feedbacks: Value,
    pub last_update: u64,
}

/// Identity sent once per successful connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Remote queries the rebuilder depends on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeedbackSource: Send + Sync + 'static {
    async fn query_feedback_state(
        &self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> Result<FeedbackState, RpcError>;

    async fn query_layer_play_states(&self) -> Result<LayerPlayStates, RpcError>;
}

impl RpcClient {
    pub async fn query_definitions(
        &self,
        kind: DefinitionKind,
    ) -> Result<DefinitionPayload, RpcError> {
        let value = self.call(METHOD_QUERY, vec![Value::from(kind.as_str())]).await?;
        match kind {
            DefinitionKind::LastUpdateTimestamp => parse_timestamp(&value).map(DefinitionPayload::Timestamp),
            _ => Ok(DefinitionPayload::Definitions(value)),
        }
    }

    /// Same as [`query_definitions`](Self::query_definitions) for a kind given by name
    pub async fn query_definitions_named(
        &self,
        kind: &str,
    ) -> Result<DefinitionPayload, RpcError> {
        let kind = kind.parse::<DefinitionKind>()?;
        self.query_definitions(kind).await
    }

    /// Fetches all definition kinds concurrently
    pub async fn fetch_catalog(&self) -> Result<Catalog, RpcError> {
        let (actions, presets, feedbacks, last_update) = futures::try_join!(
            self.query_definitions(DefinitionKind::Actions),
            self.query_definitions(DefinitionKind::Presets),
            self.query_definitions(DefinitionKind::Feedbacks),
            self.query_definitions(DefinitionKind::LastUpdateTimestamp),
        )?;
        Ok(Catalog {
            actions: into_definitions(actions),
            presets: into_definitions(presets),
            feedbacks: into_definitions(feedbacks),
            last_update: match last_update {
                DefinitionPayload::Timestamp(ts) => ts,
                DefinitionPayload::Definitions(_) => 0,
            },
        })
    }

    pub async fn fetch_image_set(
        &self,
        tag: &str,
    ) -> Result<ImageSet, RpcError> {
        let value = self.call(METHOD_GET_IMAGE_SET, vec![Value::from(tag)]).await?;
        if value.is_null() {
            return Ok(ImageSet::new());
        }
        serde_json::from_value(value).map_err(|e| RpcError::malformed(METHOD_GET_IMAGE_SET, e.to_string()))
    }

    pub async fn announce_client(
        &self,
        identity: &ClientIdentity,
    ) -> Result<(), RpcError> {
        let params = vec![serde_json::to_value(identity)?];
        self.call(METHOD_ANNOUNCE_CLIENT, params).await?;
        Ok(())
    }

    pub async fn subscribe(
        &self,
        channel: PushChannel,
    ) -> Result<(), RpcError> {
        self.call(METHOD_SUBSCRIBE, vec![Value::from(channel.as_str())]).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedbackSource for RpcClient {
    async fn query_feedback_state(
        &self,
        identity: &FeedbackIdentity,
        options: &FeedbackOptions,
    ) -> Result<FeedbackState, RpcError> {
        let raw = self
            .call(
                METHOD_GET_FEEDBACK_STATE,
                vec![
                    Value::from(identity.actor_id.as_str()),
                    Value::from(identity.feedback_id.as_str()),
                    Value::Object(options.clone()),
                ],
            )
            .await?;
        parse_feedback_state(raw)
    }

    async fn query_layer_play_states(&self) -> Result<LayerPlayStates, RpcError> {
        let value = self.call(METHOD_KV_GET, vec![Value::from(KEY_LAYER_PLAY_STATES)]).await?;
        if value.is_null() {
            return Ok(LayerPlayStates::new());
        }
        serde_json::from_value(value).map_err(|e| RpcError::malformed(METHOD_KV_GET, e.to_string()))
    }
}

/// Accepts a JSON object, or a string holding one
pub fn parse_feedback_state(raw: Value) -> Result<FeedbackState, RpcError> {
    let value = match raw {
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| RpcError::malformed(METHOD_GET_FEEDBACK_STATE, e.to_string()))?,
        other => other,
    };
    match value {
        Value::Object(fields) => Ok(FeedbackState::from_map(fields)),
        Value::Null => Ok(FeedbackState::new()),
        other => {
            debug!(?other, "feedback state is not an object");
            Err(RpcError::malformed(METHOD_GET_FEEDBACK_STATE, "expected an object"))
        }
    }
}

fn parse_timestamp(value: &Value) -> Result<u64, RpcError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| RpcError::malformed(METHOD_QUERY, format!("invalid timestamp {n}"))),
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|e| RpcError::malformed(METHOD_QUERY, e.to_string())),
        Value::Null => Ok(0),
        other => Err(RpcError::malformed(METHOD_QUERY, format!("invalid timestamp {other}"))),
    }
}

fn into_definitions(payload: DefinitionPayload) -> Value {
    match payload {
        DefinitionPayload::Definitions(value) => value,
        DefinitionPayload::Timestamp(ts) => Value::from(ts),
    }
}
