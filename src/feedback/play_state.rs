use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::FeedbackState;
use crate::constants::FIELD_PLAY_STATE;
use crate::constants::PAUSED_SUFFIX;
use crate::constants::RUNNING_SUFFIX;

/// Play/pause status of an overlay layer on the remote engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Running,
    Paused,
    #[serde(other)]
    Unknown,
}

impl PlayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayState::Running => "running",
            PlayState::Paused => "paused",
            PlayState::Unknown => "unknown",
        }
    }

    pub(crate) fn from_wire(value: &str) -> Self {
        match value {
            "running" => PlayState::Running,
            "paused" => PlayState::Paused,
            _ => PlayState::Unknown,
        }
    }
}

/// One record of the `layerPlayStates` lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPlayState {
    pub play_state: PlayState,
}

/// Overlay key -> play state record
pub type LayerPlayStates = HashMap<String, LayerPlayState>;

/// Collapses `<field>_running` / `<field>_paused` pairs into `<field>`.
///
/// The variant matching `play_state` wins; the other is dropped. Without a
/// known play state both variants are removed and nothing is selected. States
/// that reference an overlay or carry conditional fields get a `playState`
/// field describing what was applied.
pub fn resolve_conditional_fields(
    state: &mut FeedbackState,
    play_state: Option<PlayState>,
) {
    let bases: BTreeSet<String> = state
        .fields()
        .filter_map(|field| {
            field
                .strip_suffix(RUNNING_SUFFIX)
                .or_else(|| field.strip_suffix(PAUSED_SUFFIX))
                .filter(|base| !base.is_empty())
                .map(str::to_string)
        })
        .collect();

    let effective = play_state.unwrap_or(PlayState::Unknown);

    for base in &bases {
        let running = state.remove(&format!("{base}{RUNNING_SUFFIX}"));
        let paused = state.remove(&format!("{base}{PAUSED_SUFFIX}"));
        let selected = match effective {
            PlayState::Running => running,
            PlayState::Paused => paused,
            PlayState::Unknown => None,
        };
        if let Some(value) = selected {
            state.insert(base.clone(), value);
        }
    }

    if !bases.is_empty() || state.overlay_image_name().is_some() {
        state.insert(FIELD_PLAY_STATE, effective.as_str());
    }
}

/// Looks up the play state for a resolved state's overlay and applies it
pub fn apply_layer_play_states(
    state: &mut FeedbackState,
    layers: &LayerPlayStates,
) {
    let play_state = state
        .overlay_image_name()
        .and_then(|overlay| layers.get(overlay))
        .map(|layer| layer.play_state);
    resolve_conditional_fields(state, play_state);
}
