// -
// Keys and separators

/// Joins actor id and feedback id into the bare identity key
pub(crate) const IDENTITY_SEPARATOR: char = '~';

/// Joins the identity key and the option hash inside a fingerprint
pub(crate) const FINGERPRINT_SEPARATOR: char = ':';

/// Hex characters of the option digest kept in a fingerprint
pub(crate) const FINGERPRINT_HASH_LEN: usize = 16;

// -
// Feedback state record fields

pub const FIELD_PNG64: &str = "png64";
pub const FIELD_IMAGE_NAME: &str = "imageName";
pub const FIELD_OVERLAY_IMAGE_NAME: &str = "overlayImageName";
pub const FIELD_PLAY_STATE: &str = "playState";

pub(crate) const RUNNING_SUFFIX: &str = "_running";
pub(crate) const PAUSED_SUFFIX: &str = "_paused";

// -
// Remote methods and channels

pub(crate) const METHOD_GET_IMAGE_SET: &str = "getImageSet";
pub(crate) const METHOD_QUERY: &str = "query";
pub(crate) const METHOD_GET_FEEDBACK_STATE: &str = "getFeedbackState";
pub(crate) const METHOD_KV_GET: &str = "kvGet";
pub(crate) const METHOD_ANNOUNCE_CLIENT: &str = "announceClient";
pub(crate) const METHOD_SUBSCRIBE: &str = "subscribe";

pub(crate) const KEY_LAYER_PLAY_STATES: &str = "layerPlayStates";

pub(crate) const EVENT_REGISTRY_CHANGED: &str = "registryChanged";
pub(crate) const EVENT_FEEDBACK_CHANGED: &str = "feedbackChanged";

// -
// Image payloads

pub(crate) const PNG_MEDIA_PREFIX: &str = "data:image/png;base64,";

// -
// Host status messages

pub(crate) const STATUS_CONNECTED: &str = "Connected";
pub(crate) const STATUS_CONNECTING: &str = "Connecting";
pub(crate) const STATUS_DISCONNECTED: &str = "Disconnected";
