//! The session context object.
//!
//! A `Session` owns the state machine, the playback queue and the
//! coordinators, and holds the collaborators they call into. There is one per
//! backend connection; nothing here is global.

use crate::{
    collaborators::{
        AdvertisementDisplay, CharacterConfig, ChatHistory, Interrupter, Microphone, Notifier,
        OutboundSink, Playback, Subtitle, VideoPlayer,
    },
    coordinators::{AdvertisementCoordinator, GroupCoordinator, LaundryCoordinator, ModelStaging},
    dispatcher::classify,
    protocol::OutboundMessage,
    queue::TaskQueue,
    state::{SessionState, SessionStateMachine},
};
use std::{
    mem,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:12393";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// HTTP address that relative media paths are resolved against.
    pub base_url: String,
    /// Open the microphone again once the assistant finishes a turn.
    pub auto_start_mic_on_conversation_end: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_start_mic_on_conversation_end: false,
        }
    }
}

/// Everything the session calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub microphone: Arc<dyn Microphone>,
    pub subtitle: Arc<dyn Subtitle>,
    pub config: Arc<dyn CharacterConfig>,
    pub playback: Arc<dyn Playback>,
    pub interrupter: Arc<dyn Interrupter>,
    pub notifier: Arc<dyn Notifier>,
    pub history: Arc<dyn ChatHistory>,
    pub advertisements: Arc<dyn AdvertisementDisplay>,
    pub video: Arc<dyn VideoPlayer>,
    pub outbound: Arc<dyn OutboundSink>,
}

pub struct Session {
    pub(crate) options: SessionOptions,
    pub(crate) state: Arc<SessionStateMachine>,
    pub(crate) queue: TaskQueue,
    pub(crate) staging: ModelStaging,
    pub(crate) group: GroupCoordinator,
    pub(crate) advertisements: AdvertisementCoordinator,
    pub(crate) laundry: LaundryCoordinator,
    pub(crate) io: Collaborators,
    pub(crate) backend_synth_complete: AtomicBool,
    /// Assistant text shown to the user since the current turn started.
    pub(crate) heard_response: Arc<Mutex<String>>,
}

impl Session {
    /// Builds a session. Must be called from within a Tokio runtime, since the
    /// playback queue spawns its worker immediately.
    pub fn new(options: SessionOptions, io: Collaborators) -> Self {
        Self {
            state: Arc::new(SessionStateMachine::new()),
            queue: TaskQueue::new(),
            staging: ModelStaging::new(),
            group: GroupCoordinator::new(io.notifier.clone()),
            advertisements: AdvertisementCoordinator::new(io.advertisements.clone()),
            laundry: LaundryCoordinator::new(options.base_url.clone(), io.video.clone()),
            options,
            io,
            backend_synth_complete: AtomicBool::new(false),
            heard_response: Arc::default(),
        }
    }

    /// Classifies and routes one raw frame.
    pub fn handle_frame(&self, raw: &str) {
        self.route(classify(raw));
    }

    /// Runs deferred work once the current frame has been fully routed.
    ///
    /// Returns the number of staged model descriptors that were applied.
    pub fn tick(&self) -> usize {
        self.staging.flush(self.io.config.as_ref())
    }

    /// Cuts the assistant off.
    ///
    /// Drops queued playback and stops whatever is playing. The backend is only
    /// told when `notify_remote` is set; relayed interrupts must not echo back.
    pub fn interrupt(&self, notify_remote: bool) {
        let previous = self.state.set(SessionState::Interrupted);
        let dropped = self.queue.clear();
        let heard = mem::take(&mut *self.lock_heard());
        info!(%previous, dropped, notify_remote, "Interrupting assistant.");

        self.io.interrupter.trigger(notify_remote);
        if notify_remote {
            self.send(&OutboundMessage::InterruptSignal { text: heard });
        }
        self.io.history.clear_response();
    }

    /// The microphone detected the start of user speech.
    pub fn speech_started(&self) {
        if self.state.current() == SessionState::ThinkingSpeaking {
            self.interrupt(true);
        }
        self.state.set(SessionState::Listening);
    }

    /// The user stopped speaking; the utterance is on its way to the backend.
    pub fn speech_ended(&self) {
        self.state.set(SessionState::Waiting);
    }

    /// The detector fired on something that was not speech.
    pub fn speech_misfire(&self) {
        debug!("Speech misfire; returning to idle.");
        self.state.set(SessionState::Idle);
    }

    /// Sends a typed message to the backend. See `OutboundSink` for delivery rules.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        match serde_json::to_value(message) {
            Ok(frame) => self.io.outbound.send(frame),
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message.");
                false
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn has_pending(&self) -> bool {
        self.queue.has_pending()
    }

    /// Resolves once the playback queue has drained.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await
    }

    pub fn backend_synth_complete(&self) -> bool {
        self.backend_synth_complete.load(Ordering::Acquire)
    }

    pub fn group(&self) -> &GroupCoordinator {
        &self.group
    }

    pub fn advertisements(&self) -> &AdvertisementCoordinator {
        &self.advertisements
    }

    pub fn laundry(&self) -> &LaundryCoordinator {
        &self.laundry
    }

    pub(crate) fn lock_heard(&self) -> std::sync::MutexGuard<'_, String> {
        self.heard_response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
