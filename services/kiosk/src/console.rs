//! Headless collaborators for running the kiosk without a renderer.
//!
//! Every UI-facing call becomes a structured log line, and audio "playback"
//! takes as long as the clip would, so queue ordering and turn timing behave
//! as they would on a real kiosk.

use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use kiosk_core::{
    collaborators::{
        AdvertisementDisplay, AudioClip, CharacterConfig, ChatHistory, Interrupter, Microphone,
        NotificationKind, Notifier, Playback, Subtitle, VideoPlayer,
    },
    coordinators::LaundryDispatch,
    protocol::{ConfigFile, HistoryInfo, HistoryMessage, ModelInfo},
};
use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Logs every UI-facing call.
#[derive(Debug, Default)]
pub struct Console {
    mic_open: AtomicBool,
    current_history: Mutex<Option<String>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mic_open(&self) -> bool {
        self.mic_open.load(Ordering::Acquire)
    }

    pub fn current_history(&self) -> Option<String> {
        self.current_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Microphone for Console {
    fn start(&self) {
        if !self.mic_open.swap(true, Ordering::AcqRel) {
            info!("Microphone on.");
        }
    }

    fn stop(&self) {
        if self.mic_open.swap(false, Ordering::AcqRel) {
            info!("Microphone off.");
        }
    }
}

impl Subtitle for Console {
    fn set_text(&self, text: &str) {
        info!(target: "kiosk::subtitle", "{}", text);
    }
}

impl CharacterConfig for Console {
    fn set_name(&self, name: &str) {
        info!(%name, "Character name set.");
    }

    fn set_uid(&self, uid: &str) {
        debug!(%uid, "Character config uid set.");
    }

    fn set_config_files(&self, configs: Vec<ConfigFile>) {
        let names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        info!(?names, "Character configurations available.");
    }

    fn set_background_files(&self, files: Vec<String>) {
        debug!(count = files.len(), "Background images available.");
    }

    fn apply_model_info(&self, info: ModelInfo) {
        info!(url = %info.url, "Loading avatar model.");
    }
}

impl Notifier for Console {
    fn show(&self, title: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Error => error!(target: "kiosk::toast", "{}", title),
            NotificationKind::Success | NotificationKind::Info => {
                info!(target: "kiosk::toast", ?kind, "{}", title)
            }
        }
    }
}

impl ChatHistory for Console {
    fn set_messages(&self, messages: Vec<HistoryMessage>) {
        debug!(count = messages.len(), "Chat messages replaced.");
    }

    fn set_history_list(&self, histories: Vec<HistoryInfo>) {
        debug!(count = histories.len(), "Chat history list replaced.");
    }

    fn prepend_history(&self, history: HistoryInfo) {
        debug!(uid = %history.uid, "Chat history added.");
    }

    fn set_current_history_uid(&self, uid: &str) {
        *self
            .current_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(uid.to_string());
    }

    fn append_human_message(&self, text: &str) {
        info!(target: "kiosk::transcript", "user: {}", text);
    }

    fn clear_response(&self) {}

    fn set_force_new_message(&self, force: bool) {
        debug!(force, "Next assistant message starts a new bubble.");
    }
}

impl AdvertisementDisplay for Console {
    fn set_visible(&self, visible: bool) {
        info!(visible, "Advertisements toggled.");
    }

    fn reload(&self) {
        info!("Advertisements reloaded.");
    }
}

impl VideoPlayer for Console {
    fn play_video(&self, dispatch: &LaundryDispatch) {
        info!(url = %dispatch.url, title = %dispatch.title, silent = dispatch.silent, "Playing video.");
    }

    fn close_video(&self) {
        info!("Video closed.");
    }

    fn voice_cue(&self, text: &str) {
        info!(target: "kiosk::subtitle", "{}", text);
    }
}

/// Plays clips into the void, taking as long as the real clip would.
#[derive(Debug, Default)]
pub struct HeadlessPlayer {
    stop: Notify,
}

impl HeadlessPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration implied by the clip's volume envelope.
    pub fn clip_duration(clip: &AudioClip) -> Duration {
        let millis = clip.volumes.len() as f64 * clip.slice_length.max(0.0);
        Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl Playback for HeadlessPlayer {
    async fn play(&self, clip: AudioClip) -> anyhow::Result<()> {
        let bytes = STANDARD
            .decode(clip.audio_base64.as_bytes())
            .context("Audio payload is not valid base64")?;
        let duration = Self::clip_duration(&clip);
        debug!(
            bytes = bytes.len(),
            duration_ms = duration.as_millis() as u64,
            expressions = ?clip.expressions,
            forwarded = clip.forwarded,
            "Playing clip."
        );

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.notified() => debug!("Clip stopped early."),
        }
        Ok(())
    }
}

impl Interrupter for HeadlessPlayer {
    fn trigger(&self, notify_remote: bool) {
        if notify_remote {
            info!("Assistant interrupted by the user.");
        } else {
            warn!("Assistant interrupted by a relayed signal.");
        }
        self.stop.notify_waiters();
    }
}
