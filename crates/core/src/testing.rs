//! A recording stand-in for every collaborator, for session-level tests.

use crate::{
    collaborators::{
        AdvertisementDisplay, AudioClip, CharacterConfig, ChatHistory, Interrupter, Microphone,
        NotificationKind, Notifier, OutboundSink, Playback, Subtitle, VideoPlayer,
    },
    coordinators::LaundryDispatch,
    protocol::{ConfigFile, HistoryInfo, HistoryMessage, ModelInfo},
    session::{Collaborators, Session, SessionOptions},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

/// Records every collaborator call as a short string.
#[derive(Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<String>>,
    sent: Mutex<Vec<Value>>,
    play_time: Mutex<Duration>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    /// How long each clip takes to "play".
    pub(crate) fn set_play_time(&self, duration: Duration) {
        *self.play_time.lock().unwrap() = duration;
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl Microphone for Recorder {
    fn start(&self) {
        self.push("mic:start");
    }

    fn stop(&self) {
        self.push("mic:stop");
    }
}

impl Subtitle for Recorder {
    fn set_text(&self, text: &str) {
        self.push(format!("subtitle:{}", text));
    }
}

impl CharacterConfig for Recorder {
    fn set_name(&self, name: &str) {
        self.push(format!("config:name:{}", name));
    }

    fn set_uid(&self, uid: &str) {
        self.push(format!("config:uid:{}", uid));
    }

    fn set_config_files(&self, configs: Vec<ConfigFile>) {
        self.push(format!("config:files:{}", configs.len()));
    }

    fn set_background_files(&self, files: Vec<String>) {
        self.push(format!("config:backgrounds:{}", files.len()));
    }

    fn apply_model_info(&self, info: ModelInfo) {
        self.push(format!("config:model:{}", info.url));
    }
}

#[async_trait]
impl Playback for Recorder {
    async fn play(&self, clip: AudioClip) -> anyhow::Result<()> {
        let text = clip.display_text.map(|d| d.text).unwrap_or_default();
        self.push(format!("play:{}", text));
        let play_time = *self.play_time.lock().unwrap();
        tokio::time::sleep(play_time).await;
        self.push(format!("played:{}", text));
        Ok(())
    }
}

impl Interrupter for Recorder {
    fn trigger(&self, notify_remote: bool) {
        self.push(format!("interrupt:{}", notify_remote));
    }
}

impl Notifier for Recorder {
    fn show(&self, title: &str, kind: NotificationKind) {
        self.push(format!("toast:{:?}:{}", kind, title));
    }
}

impl ChatHistory for Recorder {
    fn set_messages(&self, messages: Vec<HistoryMessage>) {
        self.push(format!("history:messages:{}", messages.len()));
    }

    fn set_history_list(&self, histories: Vec<HistoryInfo>) {
        self.push(format!("history:list:{}", histories.len()));
    }

    fn prepend_history(&self, history: HistoryInfo) {
        self.push(format!("history:prepend:{}", history.uid));
    }

    fn set_current_history_uid(&self, uid: &str) {
        self.push(format!("history:current:{}", uid));
    }

    fn append_human_message(&self, text: &str) {
        self.push(format!("history:human:{}", text));
    }

    fn clear_response(&self) {
        self.push("history:clear-response");
    }

    fn set_force_new_message(&self, force: bool) {
        self.push(format!("history:force-new:{}", force));
    }
}

impl AdvertisementDisplay for Recorder {
    fn set_visible(&self, visible: bool) {
        self.push(format!("ads:visible:{}", visible));
    }

    fn reload(&self) {
        self.push("ads:reload");
    }
}

impl VideoPlayer for Recorder {
    fn play_video(&self, dispatch: &LaundryDispatch) {
        self.push(format!("video:play:{}", dispatch.url));
    }

    fn close_video(&self) {
        self.push("video:close");
    }

    fn voice_cue(&self, text: &str) {
        self.push(format!("video:cue:{}", text));
    }
}

impl OutboundSink for Recorder {
    fn send(&self, frame: Value) -> bool {
        self.sent.lock().unwrap().push(frame);
        true
    }
}

pub(crate) fn collaborators(recorder: &Arc<Recorder>) -> Collaborators {
    Collaborators {
        microphone: recorder.clone(),
        subtitle: recorder.clone(),
        config: recorder.clone(),
        playback: recorder.clone(),
        interrupter: recorder.clone(),
        notifier: recorder.clone(),
        history: recorder.clone(),
        advertisements: recorder.clone(),
        video: recorder.clone(),
        outbound: recorder.clone(),
    }
}

/// A session wired to a fresh `Recorder`.
pub(crate) fn harness(options: SessionOptions) -> (Session, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let session = Session::new(options, collaborators(&recorder));
    (session, recorder)
}
