//! Defines the JSON message protocol between the kiosk client and the assistant backend.
//!
//! Every frame is a JSON object whose `type` field selects the message kind.
//! The backend is loose about optional fields, so nearly everything here is
//! either an `Option` or has a serde default.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

/// Messages sent from the backend to the client.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// A control command such as `start-mic` or `conversation-chain-start`.
    Control { text: Option<String> },
    /// Announces the character configuration and the avatar model to load.
    SetModelAndConf {
        conf_name: Option<String>,
        conf_uid: Option<String>,
        client_uid: Option<String>,
        model_info: Option<ModelInfo>,
    },
    /// Replaces the subtitle with a complete piece of text.
    FullText { text: Option<String> },
    /// The character configurations the user can switch between.
    ConfigFiles { configs: Option<Vec<ConfigFile>> },
    /// The backend finished switching to another character.
    ConfigSwitched,
    /// Available background images.
    BackgroundFiles { files: Option<Vec<String>> },
    /// Asks the kiosk to play a laundry machine tutorial video.
    LaundryVideoResponse(LaundryVideoResponse),
    /// The laundry machines known to the backend.
    LaundryMachinesList { machines: Option<Vec<MachineInfo>> },
    /// Wake-word detector status, optionally carrying advertisement control.
    WakeWordState(WakeWordState),
    /// One synthesized audio clip plus what to show while it plays.
    Audio(AudioMessage),
    /// Messages of the selected chat history.
    HistoryData { messages: Option<Vec<HistoryMessage>> },
    /// A fresh chat history was created.
    NewHistoryCreated { history_uid: Option<String> },
    /// Outcome of a history deletion request.
    HistoryDeleted {
        #[serde(default, deserialize_with = "null_as_default")]
        success: bool,
    },
    /// All chat histories for the current character.
    HistoryList { histories: Option<Vec<HistoryInfo>> },
    /// What the speech recognizer heard the user say.
    UserInputTranscription { text: Option<String> },
    /// A backend-side failure to surface to the user.
    Error {
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
    },
    /// The full member set of the current group.
    GroupUpdate {
        members: Option<Vec<GroupMember>>,
        is_owner: Option<bool>,
    },
    /// Outcome of a group operation requested by this client.
    GroupOperationResult {
        #[serde(default, deserialize_with = "null_as_default")]
        success: bool,
        #[serde(default, deserialize_with = "null_as_default")]
        message: String,
    },
    /// The backend has synthesized every clip for the current turn.
    BackendSynthComplete,
    /// The next assistant output must start a new chat bubble.
    ForceNewMessage,
    /// An interrupt relayed from another session in the group.
    InterruptSignal,
    /// A tool response consumed by other components; logged only.
    McpToolResponse { tool_name: Option<String> },
    /// Result of an adaptive VAD control request.
    AdaptiveVadResponse {
        #[serde(default, deserialize_with = "null_as_default")]
        success: bool,
        action: Option<String>,
        error: Option<String>,
    },
    /// Legacy top-level form of `control: conversation-chain-end`.
    ConversationChainEnd,
    /// A frame that could not be decoded at all.
    #[serde(skip)]
    Invalid,
    /// Any kind this client does not know about.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// The wire name of this message's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Control { .. } => "control",
            InboundMessage::SetModelAndConf { .. } => "set-model-and-conf",
            InboundMessage::FullText { .. } => "full-text",
            InboundMessage::ConfigFiles { .. } => "config-files",
            InboundMessage::ConfigSwitched => "config-switched",
            InboundMessage::BackgroundFiles { .. } => "background-files",
            InboundMessage::LaundryVideoResponse(_) => "laundry-video-response",
            InboundMessage::LaundryMachinesList { .. } => "laundry-machines-list",
            InboundMessage::WakeWordState(_) => "wake-word-state",
            InboundMessage::Audio(_) => "audio",
            InboundMessage::HistoryData { .. } => "history-data",
            InboundMessage::NewHistoryCreated { .. } => "new-history-created",
            InboundMessage::HistoryDeleted { .. } => "history-deleted",
            InboundMessage::HistoryList { .. } => "history-list",
            InboundMessage::UserInputTranscription { .. } => "user-input-transcription",
            InboundMessage::Error { .. } => "error",
            InboundMessage::GroupUpdate { .. } => "group-update",
            InboundMessage::GroupOperationResult { .. } => "group-operation-result",
            InboundMessage::BackendSynthComplete => "backend-synth-complete",
            InboundMessage::ForceNewMessage => "force-new-message",
            InboundMessage::InterruptSignal => "interrupt-signal",
            InboundMessage::McpToolResponse { .. } => "mcp-tool-response",
            InboundMessage::AdaptiveVadResponse { .. } => "adaptive-vad-response",
            InboundMessage::ConversationChainEnd => "conversation-chain-end",
            InboundMessage::Unknown => "unknown",
            InboundMessage::Invalid => "invalid",
        }
    }
}

/// Messages sent from the client to the backend.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    FetchHistoryList,
    CreateNewHistory,
    /// Tells the backend the user cut the assistant off, with what was heard so far.
    InterruptSignal { text: String },
}

/// Descriptor of the avatar model to load.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Everything else the renderer needs; passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LaundryVideoResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_path: String,
    pub machine_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub silent_mode: bool,
    pub response_text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MachineInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, alias = "videoPath", deserialize_with = "null_as_default")]
    pub video_path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub available: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WakeWordState {
    pub action: Option<String>,
    pub matched_word: Option<String>,
    pub language: Option<String>,
    pub current_state: Option<String>,
    pub stats: Option<Value>,
    pub advertisement_control: Option<AdvertisementControl>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AdvertisementControl {
    #[serde(default, deserialize_with = "null_as_default")]
    pub should_show_ads: bool,
    /// `start_ads` or `stop_ads`; anything else is ignored.
    #[serde(default, deserialize_with = "null_as_default")]
    pub control_action: String,
    pub trigger_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AudioMessage {
    /// Base64 encoded audio. Absent for expression-only or text-only slices.
    pub audio: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volumes: Vec<f32>,
    /// Duration in milliseconds covered by each entry of `volumes`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub slice_length: f64,
    pub display_text: Option<DisplayText>,
    pub actions: Option<Actions>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub forwarded: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DisplayText {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Actions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub expressions: Vec<Expression>,
}

/// An avatar expression cue, either by name or by model index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Expression {
    Index(#[serde(deserialize_with = "whole_number")] i64),
    Name(String),
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts integers and floats without a fractional part, such as `3.0`.
fn whole_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| de::Error::custom(format!("{} is not a whole number", number)))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HistoryMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    pub timestamp: Option<String>,
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HistoryInfo {
    pub uid: String,
    pub latest_message: Option<HistoryMessage>,
    pub timestamp: Option<String>,
}

/// A group member. The backend sends either a bare identifier or an object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "RawGroupMember")]
pub struct GroupMember {
    pub uid: String,
    pub metadata: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupMember {
    Id(String),
    Entry {
        #[serde(alias = "client_uid", alias = "id")]
        uid: String,
        #[serde(flatten)]
        metadata: Map<String, Value>,
    },
}

impl From<RawGroupMember> for GroupMember {
    fn from(raw: RawGroupMember) -> Self {
        match raw {
            RawGroupMember::Id(uid) => GroupMember {
                uid,
                metadata: Map::new(),
            },
            RawGroupMember::Entry { uid, metadata } => GroupMember { uid, metadata },
        }
    }
}
