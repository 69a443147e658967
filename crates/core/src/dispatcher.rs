//! Turns raw frames into `InboundMessage`s and routes each to its handler.
//!
//! Routing is synchronous. Anything that has to wait (audio playback, the
//! deferred end of a turn) is handed to the task queue.

use crate::{
    collaborators::{AudioClip, Microphone, NotificationKind},
    coordinators::resolve_media_url,
    error::DecodeError,
    protocol::{AudioMessage, HistoryInfo, InboundMessage, ModelInfo, OutboundMessage, WakeWordState},
    queue::{PlaybackTask, TaskMeta, TaskQueue},
    session::Session,
    state::{SessionState, SessionStateMachine},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, PoisonError, atomic::Ordering};
use tracing::{debug, info, instrument, warn};

const THINKING_SUBTITLE: &str = "Thinking...";
const TURN_END_LABEL: &str = "conversation-chain-end";

/// Decodes one frame, reporting why it could not be decoded.
pub fn decode(raw: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::InvalidJson)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingKind)?
        .to_string();
    let message: InboundMessage = serde_json::from_value(value)
        .map_err(|source| DecodeError::InvalidPayload { kind: kind.clone(), source })?;
    if matches!(message, InboundMessage::Unknown) {
        warn!(%kind, "Received unknown message kind.");
    }
    Ok(message)
}

/// Decodes one frame, never failing.
///
/// Frames that cannot be decoded become `InboundMessage::Invalid` after the
/// reason is logged.
pub fn classify(raw: &str) -> InboundMessage {
    decode(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding undecodable frame.");
        InboundMessage::Invalid
    })
}

impl Session {
    /// Hands `message` to exactly one handler.
    #[instrument(level = "debug", skip_all, fields(kind = message.kind()))]
    pub fn route(&self, message: InboundMessage) {
        match message {
            InboundMessage::Control { text } => self.on_control(text.as_deref().unwrap_or_default()),
            InboundMessage::SetModelAndConf {
                conf_name,
                conf_uid,
                client_uid,
                model_info,
            } => self.on_set_model_and_conf(conf_name, conf_uid, client_uid, model_info),
            InboundMessage::FullText { text } => {
                if let Some(text) = text {
                    self.io.subtitle.set_text(&text);
                }
            }
            InboundMessage::ConfigFiles { configs } => {
                self.io.config.set_config_files(configs.unwrap_or_default());
            }
            InboundMessage::ConfigSwitched => self.on_config_switched(),
            InboundMessage::BackgroundFiles { files } => {
                if let Some(files) = files {
                    self.io.config.set_background_files(files);
                }
            }
            InboundMessage::LaundryVideoResponse(response) => {
                self.laundry.handle_video_response(&response);
            }
            InboundMessage::LaundryMachinesList { machines } => {
                self.laundry.set_machines(machines.unwrap_or_default());
            }
            InboundMessage::WakeWordState(state) => self.on_wake_word_state(state),
            InboundMessage::Audio(audio) => self.on_audio(audio),
            InboundMessage::HistoryData { messages } => {
                if let Some(messages) = messages {
                    self.io.history.set_messages(messages);
                }
                self.io.notifier.show("History loaded", NotificationKind::Success);
            }
            InboundMessage::NewHistoryCreated { history_uid } => {
                self.on_new_history_created(history_uid)
            }
            InboundMessage::HistoryDeleted { success } => {
                if success {
                    self.io
                        .notifier
                        .show("History deleted successfully", NotificationKind::Success);
                } else {
                    self.io
                        .notifier
                        .show("Failed to delete history", NotificationKind::Error);
                }
            }
            InboundMessage::HistoryList { histories } => {
                let histories = histories.unwrap_or_default();
                if let Some(first) = histories.first() {
                    self.io.history.set_current_history_uid(&first.uid);
                }
                self.io.history.set_history_list(histories);
            }
            InboundMessage::UserInputTranscription { text } => {
                if let Some(text) = text {
                    self.io.history.append_human_message(&text);
                }
            }
            InboundMessage::Error { message } => {
                warn!(%message, "Backend reported an error.");
                self.io.notifier.show(&message, NotificationKind::Error);
            }
            InboundMessage::GroupUpdate { members, is_owner } => {
                if let Some(members) = members {
                    self.group.replace_members(members);
                }
                if let Some(is_owner) = is_owner {
                    self.group.set_owner(is_owner);
                }
            }
            InboundMessage::GroupOperationResult { success, message } => {
                self.group.report_operation(success, &message);
            }
            InboundMessage::BackendSynthComplete => {
                self.backend_synth_complete.store(true, Ordering::Release);
            }
            InboundMessage::ForceNewMessage => self.io.history.set_force_new_message(true),
            InboundMessage::InterruptSignal => self.interrupt(false),
            InboundMessage::McpToolResponse { tool_name } => {
                debug!(tool = ?tool_name, "Tool response received.");
            }
            InboundMessage::AdaptiveVadResponse {
                success,
                action,
                error,
            } => {
                if success {
                    info!(action = ?action, "Adaptive VAD request succeeded.");
                } else {
                    warn!(action = ?action, error = ?error, "Adaptive VAD request failed.");
                }
            }
            InboundMessage::ConversationChainEnd => self.on_conversation_chain_end(),
            InboundMessage::Invalid | InboundMessage::Unknown => {}
        }
    }

    fn on_control(&self, text: &str) {
        match text {
            "start-mic" => self.io.microphone.start(),
            "stop-mic" => self.io.microphone.stop(),
            "conversation-chain-start" => {
                self.state.set(SessionState::ThinkingSpeaking);
                self.queue.clear();
                self.lock_heard().clear();
                self.backend_synth_complete.store(false, Ordering::Release);
                self.io.history.clear_response();
                self.io.subtitle.set_text(THINKING_SUBTITLE);
            }
            "conversation-chain-end" => self.on_conversation_chain_end(),
            other => warn!(control = %other, "Unknown control command."),
        }
    }

    /// Ends the turn now if nothing is playing, otherwise once playback drains.
    ///
    /// The deferred check re-reads the live state when it runs, so a turn that
    /// was interrupted in the meantime stays interrupted.
    fn on_conversation_chain_end(&self) {
        let auto_start_mic = self.options.auto_start_mic_on_conversation_end;
        if !self.queue.has_pending() {
            finish_turn(&self.state, self.io.microphone.as_ref(), auto_start_mic);
            return;
        }
        debug!(queued = self.queue.len(), "Deferring end of turn until playback drains.");
        self.queue.enqueue(deferred_turn_end(
            self.queue.clone(),
            self.state.clone(),
            self.io.microphone.clone(),
            auto_start_mic,
        ));
    }

    fn on_set_model_and_conf(
        &self,
        conf_name: Option<String>,
        conf_uid: Option<String>,
        client_uid: Option<String>,
        model_info: Option<ModelInfo>,
    ) {
        self.state.set(SessionState::Loading);
        if let Some(name) = conf_name {
            self.io.config.set_name(&name);
        }
        if let Some(uid) = conf_uid {
            self.io.config.set_uid(&uid);
        }
        if let Some(uid) = client_uid {
            self.group.set_self_uid(&uid);
        }
        if let Some(mut info) = model_info {
            if !info.url.is_empty() {
                info.url = resolve_media_url(&self.options.base_url, &info.url);
            }
            self.staging.stage(info);
        }
        self.state.set(SessionState::Idle);
    }

    fn on_config_switched(&self) {
        info!("Character switched.");
        self.state.set(SessionState::Idle);
        self.io.subtitle.set_text("New character loaded");
        self.io
            .notifier
            .show("Character switched", NotificationKind::Success);
        self.send(&OutboundMessage::FetchHistoryList);
        self.send(&OutboundMessage::CreateNewHistory);
    }

    fn on_new_history_created(&self, history_uid: Option<String>) {
        self.state.set(SessionState::Idle);
        self.io.subtitle.set_text("New conversation started");
        let Some(uid) = history_uid else {
            warn!("New history created without an identifier.");
            return;
        };
        self.io.history.set_current_history_uid(&uid);
        self.io.history.set_messages(Vec::new());
        self.io.history.prepend_history(HistoryInfo {
            uid,
            latest_message: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        });
        self.io
            .notifier
            .show("New chat history created", NotificationKind::Success);
    }

    fn on_wake_word_state(&self, state: WakeWordState) {
        let word = state.matched_word.as_deref().unwrap_or_default();
        match state.action.as_deref() {
            Some("wake_up") => info!(%word, language = ?state.language, "Wake word detected."),
            Some("sleep") => info!(%word, "End word detected; going to sleep."),
            Some("ignored") => debug!(%word, current = ?state.current_state, "Wake word ignored."),
            other => debug!(action = ?other, "Wake word state update."),
        }
        if let Some(control) = &state.advertisement_control {
            self.advertisements.apply_control(control);
        }
    }

    fn on_audio(&self, audio: AudioMessage) {
        let current = self.state.current();
        if matches!(current, SessionState::Interrupted | SessionState::Listening) {
            debug!(state = %current, "Dropping audio received while not speaking.");
            return;
        }

        let expressions = audio.actions.map(|a| a.expressions).unwrap_or_default();
        let meta = TaskMeta {
            label: "audio",
            display_text: audio.display_text.as_ref().map(|d| d.text.clone()),
            expressions: expressions.clone(),
            forwarded: audio.forwarded,
        };
        let clip = AudioClip {
            audio_base64: audio.audio.unwrap_or_default(),
            volumes: audio.volumes,
            slice_length: audio.slice_length,
            display_text: audio.display_text,
            expressions,
            forwarded: audio.forwarded,
        };

        let subtitle = self.io.subtitle.clone();
        let playback = self.io.playback.clone();
        let heard = self.heard_response.clone();
        self.queue.enqueue(PlaybackTask::new(meta, async move {
            if let Some(display) = &clip.display_text {
                subtitle.set_text(&display.text);
                heard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(&display.text);
            }
            playback.play(clip).await
        }));
    }
}

/// Queued end of turn. If clips were queued behind it, it moves to the back
/// of the queue instead of ending the turn under them.
fn deferred_turn_end(
    queue: TaskQueue,
    state: Arc<SessionStateMachine>,
    microphone: Arc<dyn Microphone>,
    auto_start_mic: bool,
) -> PlaybackTask {
    PlaybackTask::new(TaskMeta::labelled(TURN_END_LABEL), async move {
        let waiting = queue.waiting_other_than(TURN_END_LABEL);
        if waiting > 0 && state.current() == SessionState::ThinkingSpeaking {
            debug!(waiting, "Playback queued after the end of turn; deferring again.");
            let retry = deferred_turn_end(queue.clone(), state, microphone, auto_start_mic);
            queue.enqueue(retry);
            return Ok(());
        }
        finish_turn(&state, microphone.as_ref(), auto_start_mic);
        Ok(())
    })
}

fn finish_turn(state: &SessionStateMachine, microphone: &dyn Microphone, auto_start_mic: bool) {
    if state.transition(SessionState::ThinkingSpeaking, SessionState::Idle) && auto_start_mic {
        debug!("Restarting microphone after the assistant's turn.");
        microphone.start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{session::SessionOptions, testing::harness};
    use serde_json::json;
    use std::time::Duration;

    fn frame(value: Value) -> String {
        value.to_string()
    }

    fn auto_mic() -> SessionOptions {
        SessionOptions {
            auto_start_mic_on_conversation_end: true,
            ..Default::default()
        }
    }

    fn audio(text: &str) -> String {
        frame(json!({
            "type": "audio",
            "audio": "AAAA",
            "volumes": [0.2, 0.4],
            "slice_length": 20,
            "display_text": { "text": text, "name": "Mao" },
            "actions": { "expressions": ["smile"] }
        }))
    }

    #[test]
    fn test_decode_reports_each_failure() {
        assert!(matches!(decode("{not json"), Err(DecodeError::InvalidJson(_))));
        assert!(matches!(decode(r#"{"text":"x"}"#), Err(DecodeError::MissingKind)));
        assert!(matches!(decode(r#"{"type":7}"#), Err(DecodeError::MissingKind)));
        match decode(r#"{"type":"group-update","members":"nope"}"#) {
            Err(DecodeError::InvalidPayload { kind, .. }) => assert_eq!(kind, "group-update"),
            other => panic!("Expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_never_fails() {
        assert!(matches!(classify("garbage"), InboundMessage::Invalid));
        assert!(matches!(
            classify(r#"{"type":"teleport","to":"mars"}"#),
            InboundMessage::Unknown
        ));
        assert!(matches!(
            classify(r#"{"type":"full-text","text":"hi"}"#),
            InboundMessage::FullText { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_frames_have_no_effect() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(r#"{"type":"teleport","to":"mars"}"#);
        session.handle_frame("}{");
        session.handle_frame(r#"{"type":"audio","volumes":"loud"}"#);

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_pending());
        assert!(recorder.events().is_empty());
        assert!(recorder.sent().is_empty());

        session.handle_frame(&frame(json!({ "type": "full-text", "text": "Still here" })));
        assert_eq!(recorder.events(), vec!["subtitle:Still here"]);
    }

    #[tokio::test]
    async fn test_unknown_frames_leave_queued_playback_alone() {
        let (session, recorder) = harness(SessionOptions::default());
        recorder.set_play_time(Duration::from_millis(20));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));
        session.handle_frame(&audio("one"));
        session.handle_frame(&audio("two"));
        let waiting = session.queue.len();

        session.handle_frame(r#"{"type":"teleport","to":"mars"}"#);
        session.handle_frame("}{");

        assert!(session.has_pending());
        assert_eq!(session.queue.len(), waiting);
        assert_eq!(session.state(), SessionState::ThinkingSpeaking);

        session.wait_idle().await;
        assert_eq!(recorder.count("played:one"), 1);
        assert_eq!(recorder.count("played:two"), 1);
    }

    #[tokio::test]
    async fn test_control_commands() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(&frame(json!({ "type": "control", "text": "start-mic" })));
        session.handle_frame(&frame(json!({ "type": "control", "text": "stop-mic" })));
        session.handle_frame(&frame(json!({ "type": "control", "text": "dance" })));

        assert_eq!(recorder.events(), vec!["mic:start", "mic:stop"]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_chain_start_enters_thinking_speaking() {
        let (session, recorder) = harness(SessionOptions::default());
        session.backend_synth_complete.store(true, Ordering::Release);

        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));

        assert_eq!(session.state(), SessionState::ThinkingSpeaking);
        assert!(!session.backend_synth_complete());
        assert_eq!(
            recorder.events(),
            vec!["history:clear-response", "subtitle:Thinking..."]
        );
    }

    #[tokio::test]
    async fn test_chain_end_with_empty_queue_goes_idle_immediately() {
        let (session, recorder) = harness(auto_mic());
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));

        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-end" })));

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.has_pending());
        assert_eq!(recorder.count("mic:start"), 1);
    }

    #[tokio::test]
    async fn test_chain_end_waits_for_playback_and_fires_once() {
        let (session, recorder) = harness(auto_mic());
        recorder.set_play_time(Duration::from_millis(20));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));
        session.handle_frame(&audio("one"));
        session.handle_frame(&audio("two"));

        // Both forms of the completion signal.
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-end" })));
        session.handle_frame(&frame(json!({ "type": "conversation-chain-end" })));
        assert_eq!(session.state(), SessionState::ThinkingSpeaking);

        session.wait_idle().await;

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(recorder.count("mic:start"), 1);
        let events = recorder.events();
        let last_played = events.iter().rposition(|e| e == "played:two").unwrap();
        let mic = events.iter().position(|e| e == "mic:start").unwrap();
        assert!(mic > last_played);
    }

    #[tokio::test]
    async fn test_audio_after_chain_end_keeps_the_turn_open() {
        let (session, recorder) = harness(auto_mic());
        recorder.set_play_time(Duration::from_millis(30));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));
        session.handle_frame(&audio("a"));
        session.handle_frame(&frame(json!({ "type": "conversation-chain-end" })));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-end" })));
        session.handle_frame(&audio("b"));

        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.count("play:b") == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(session.state(), SessionState::ThinkingSpeaking);
        assert_eq!(recorder.count("mic:start"), 0);

        session.wait_idle().await;

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(recorder.count("mic:start"), 1);
        let events = recorder.events();
        let played = events.iter().position(|e| e == "played:b").unwrap();
        let mic = events.iter().position(|e| e == "mic:start").unwrap();
        assert!(mic > played);
    }

    #[tokio::test]
    async fn test_deferred_chain_end_respects_interruption() {
        let (session, recorder) = harness(auto_mic());
        recorder.set_play_time(Duration::from_millis(20));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));
        session.handle_frame(&audio("one"));
        session.handle_frame(&frame(json!({ "type": "conversation-chain-end" })));

        session.speech_started();
        session.wait_idle().await;

        assert_eq!(session.state(), SessionState::Listening);
        assert_eq!(recorder.count("mic:start"), 0);
    }

    #[tokio::test]
    async fn test_audio_plays_in_order_with_subtitles() {
        let (session, recorder) = harness(SessionOptions::default());
        recorder.set_play_time(Duration::from_millis(5));
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));

        for text in ["a", "b", "c"] {
            session.handle_frame(&audio(text));
        }
        session.wait_idle().await;

        let playback: Vec<String> = recorder
            .events()
            .into_iter()
            .filter(|e| e.starts_with("subtitle:") || e.starts_with("play"))
            .collect();
        assert_eq!(
            playback,
            vec![
                "subtitle:Thinking...",
                "subtitle:a", "play:a", "played:a",
                "subtitle:b", "play:b", "played:b",
                "subtitle:c", "play:c", "played:c",
            ]
        );
        assert_eq!(*session.lock_heard(), "abc");
    }

    #[tokio::test]
    async fn test_audio_dropped_while_listening_or_interrupted() {
        let (session, recorder) = harness(SessionOptions::default());

        session.state.set(SessionState::Listening);
        session.handle_frame(&audio("ignored"));
        session.state.set(SessionState::Interrupted);
        session.handle_frame(&audio("ignored"));

        assert!(!session.has_pending());
        session.wait_idle().await;
        assert_eq!(recorder.count("play:ignored"), 0);
    }

    #[tokio::test]
    async fn test_relayed_interrupt_signal_is_not_echoed() {
        let (session, recorder) = harness(SessionOptions::default());
        session.handle_frame(&frame(json!({ "type": "control", "text": "conversation-chain-start" })));

        session.handle_frame(&frame(json!({ "type": "interrupt-signal" })));

        assert_eq!(session.state(), SessionState::Interrupted);
        assert_eq!(recorder.count("interrupt:false"), 1);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn test_set_model_and_conf_stages_until_tick() {
        let options = SessionOptions {
            base_url: "http://h:9000".to_string(),
            ..Default::default()
        };
        let (session, recorder) = harness(options);

        session.handle_frame(&frame(json!({
            "type": "set-model-and-conf",
            "conf_name": "Mao",
            "conf_uid": "mao-001",
            "client_uid": "client-7",
            "model_info": { "url": "/live2d-models/mao/mao.model3.json", "kScale": 0.5 }
        })));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(recorder.events(), vec!["config:name:Mao", "config:uid:mao-001"]);
        assert_eq!(session.group().snapshot().self_uid.as_deref(), Some("client-7"));

        assert_eq!(session.tick(), 1);
        assert_eq!(
            recorder.events().last().map(String::as_str),
            Some("config:model:http://h:9000/live2d-models/mao/mao.model3.json")
        );
        assert_eq!(session.tick(), 0);
        assert_eq!(recorder.count("config:model:http://h:9000/live2d-models/mao/mao.model3.json"), 1);
    }

    #[tokio::test]
    async fn test_config_switched_requests_history() {
        let (session, recorder) = harness(SessionOptions::default());
        session.state.set(SessionState::Loading);

        session.handle_frame(&frame(json!({ "type": "config-switched" })));

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(
            recorder.events(),
            vec!["subtitle:New character loaded", "toast:Success:Character switched"]
        );
        assert_eq!(
            recorder.sent(),
            vec![
                json!({ "type": "fetch-history-list" }),
                json!({ "type": "create-new-history" })
            ]
        );
    }

    #[tokio::test]
    async fn test_history_messages() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(&frame(json!({
            "type": "history-list",
            "histories": [{ "uid": "h2" }, { "uid": "h1" }]
        })));
        session.handle_frame(&frame(json!({
            "type": "history-data",
            "messages": [{ "role": "human", "content": "hi" }]
        })));
        session.handle_frame(&frame(json!({ "type": "new-history-created", "history_uid": "h3" })));
        session.handle_frame(&frame(json!({ "type": "history-deleted", "success": false })));
        session.handle_frame(&frame(json!({ "type": "user-input-transcription", "text": "hello" })));
        session.handle_frame(&frame(json!({ "type": "force-new-message" })));

        assert_eq!(
            recorder.events(),
            vec![
                "history:current:h2",
                "history:list:2",
                "history:messages:1",
                "toast:Success:History loaded",
                "subtitle:New conversation started",
                "history:current:h3",
                "history:messages:0",
                "history:prepend:h3",
                "toast:Success:New chat history created",
                "toast:Error:Failed to delete history",
                "history:human:hello",
                "history:force-new:true",
            ]
        );
    }

    #[tokio::test]
    async fn test_backend_error_and_synth_complete() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(&frame(json!({ "type": "error", "message": "TTS offline" })));
        session.handle_frame(&frame(json!({ "type": "backend-synth-complete" })));
        session.handle_frame(&frame(json!({ "type": "mcp-tool-response", "tool_name": "search" })));
        session.handle_frame(&frame(json!({
            "type": "adaptive-vad-response", "success": false, "action": "reset", "error": "busy"
        })));

        assert_eq!(recorder.events(), vec!["toast:Error:TTS offline"]);
        assert!(session.backend_synth_complete());
    }

    #[tokio::test]
    async fn test_group_update_replaces_members() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(&frame(json!({ "type": "group-update", "members": ["a", "b"], "is_owner": true })));
        session.handle_frame(&frame(json!({ "type": "group-update", "members": ["c"] })));
        session.handle_frame(&frame(json!({
            "type": "group-operation-result", "success": true, "message": "Invited"
        })));

        let group = session.group().snapshot();
        assert_eq!(group.members.keys().collect::<Vec<_>>(), vec!["c"]);
        assert!(group.is_owner);
        assert_eq!(recorder.events(), vec!["toast:Success:Invited"]);
    }

    #[tokio::test]
    async fn test_wake_word_relays_advertisement_control() {
        let (session, recorder) = harness(SessionOptions::default());
        let wake = |action: &str| {
            frame(json!({
                "type": "wake-word-state",
                "action": "wake_up",
                "matched_word": "hello",
                "advertisement_control": {
                    "should_show_ads": action == "start_ads",
                    "control_action": action,
                    "trigger_reason": "test"
                }
            }))
        };

        session.handle_frame(&wake("start_ads"));
        session.handle_frame(&wake("stop_ads"));
        session.handle_frame(&wake("stop_ads"));
        session.handle_frame(&wake("start_ads"));
        session.handle_frame(&wake("start_ads"));

        assert_eq!(recorder.events(), vec!["ads:visible:false", "ads:visible:true"]);
        assert!(session.advertisements().state().visible);
    }

    #[tokio::test]
    async fn test_laundry_frames() {
        let options = SessionOptions {
            base_url: "http://h:9000".to_string(),
            ..Default::default()
        };
        let (session, recorder) = harness(options);

        session.handle_frame(&frame(json!({
            "type": "laundry-machines-list",
            "machines": [{ "id": "1", "name": "Washer", "videoPath": "/v/1.mp4", "available": true }]
        })));
        assert!(session.laundry().state().machines.is_empty());

        session.handle_frame(&frame(json!({
            "type": "laundry-video-response",
            "video_path": "/videos/x.mp4",
            "machine_id": "1",
            "silent_mode": true,
            "response_text": "Watch this"
        })));
        session.handle_frame(&frame(json!({
            "type": "laundry-machines-list",
            "machines": [{ "id": "1", "name": "Washer", "videoPath": "/v/1.mp4", "available": true }]
        })));

        assert_eq!(recorder.events(), vec!["video:play:http://h:9000/videos/x.mp4"]);
        let laundry = session.laundry().state();
        assert!(laundry.laundry_mode);
        assert_eq!(laundry.machines[0].video_path, "/v/1.mp4");
    }

    #[tokio::test]
    async fn test_character_files() {
        let (session, recorder) = harness(SessionOptions::default());

        session.handle_frame(&frame(json!({
            "type": "config-files",
            "configs": [{ "filename": "mao.yaml", "name": "Mao" }]
        })));
        session.handle_frame(&frame(json!({ "type": "background-files", "files": ["a.png", "b.png"] })));

        assert_eq!(recorder.events(), vec!["config:files:1", "config:backgrounds:2"]);
    }
}
