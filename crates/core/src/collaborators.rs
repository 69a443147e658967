//! Capabilities the session calls into but does not implement.
//!
//! The host application provides these: the renderer, the audio player, the
//! microphone/VAD pipeline and the notification surface. The session only
//! depends on the traits, so tests can swap in recorders or mocks.

use crate::{
    coordinators::laundry::LaundryDispatch,
    protocol::{ConfigFile, DisplayText, Expression, HistoryInfo, HistoryMessage, ModelInfo},
};
use async_trait::async_trait;
use kiosk_realtime::ConnectionManager;
use serde::Serialize;

/// Severity of a transient user notification.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// A clip handed to the audio player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    pub audio_base64: String,
    pub volumes: Vec<f32>,
    /// Milliseconds covered by each entry of `volumes`.
    pub slice_length: f64,
    pub display_text: Option<DisplayText>,
    pub expressions: Vec<Expression>,
    pub forwarded: bool,
}

#[cfg_attr(test, mockall::automock)]
pub trait Microphone: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

#[cfg_attr(test, mockall::automock)]
pub trait Subtitle: Send + Sync {
    fn set_text(&self, text: &str);
}

/// The character configuration store the renderer reads from.
#[cfg_attr(test, mockall::automock)]
pub trait CharacterConfig: Send + Sync {
    fn set_name(&self, name: &str);
    fn set_uid(&self, uid: &str);
    fn set_config_files(&self, configs: Vec<ConfigFile>);
    fn set_background_files(&self, files: Vec<String>);
    /// Loads a new avatar model. Only called from model staging.
    fn apply_model_info(&self, info: ModelInfo);
}

/// Plays one clip, resolving when playback is finished.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn play(&self, clip: AudioClip) -> anyhow::Result<()>;
}

/// Stops local playback when the assistant is cut off.
#[cfg_attr(test, mockall::automock)]
pub trait Interrupter: Send + Sync {
    fn trigger(&self, notify_remote: bool);
}

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, kind: NotificationKind);
}

#[cfg_attr(test, mockall::automock)]
pub trait ChatHistory: Send + Sync {
    fn set_messages(&self, messages: Vec<HistoryMessage>);
    fn set_history_list(&self, histories: Vec<HistoryInfo>);
    fn prepend_history(&self, history: HistoryInfo);
    fn set_current_history_uid(&self, uid: &str);
    fn append_human_message(&self, text: &str);
    /// Discards the partially accumulated assistant response.
    fn clear_response(&self);
    fn set_force_new_message(&self, force: bool);
}

/// The advertisement carousel.
#[cfg_attr(test, mockall::automock)]
pub trait AdvertisementDisplay: Send + Sync {
    fn set_visible(&self, visible: bool);
    /// Reloads advertisement content from scratch.
    fn reload(&self);
}

/// Plays laundry tutorial videos.
#[cfg_attr(test, mockall::automock)]
pub trait VideoPlayer: Send + Sync {
    fn play_video(&self, dispatch: &LaundryDispatch);
    fn close_video(&self);
    /// Speaks or shows the spoken companion line for a video.
    fn voice_cue(&self, text: &str);
}

/// Fire-and-forget delivery of JSON frames to the backend.
#[cfg_attr(test, mockall::automock)]
pub trait OutboundSink: Send + Sync {
    /// Returns whether the frame was handed to an open connection.
    fn send(&self, frame: serde_json::Value) -> bool;
}

impl OutboundSink for ConnectionManager {
    fn send(&self, frame: serde_json::Value) -> bool {
        ConnectionManager::send(self, &frame)
    }
}
