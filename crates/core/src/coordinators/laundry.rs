use super::resolve_media_url;
use crate::{
    collaborators::VideoPlayer,
    protocol::{LaundryVideoResponse, MachineInfo},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A tutorial video ready for the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaundryDispatch {
    pub url: String,
    pub title: String,
    /// Play the video without the spoken cue.
    pub silent: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaundryState {
    pub laundry_mode: bool,
    pub current: Option<LaundryDispatch>,
    pub machines: Vec<MachineInfo>,
}

pub struct LaundryCoordinator {
    base_url: String,
    state: watch::Sender<LaundryState>,
    player: Arc<dyn VideoPlayer>,
}

impl LaundryCoordinator {
    pub fn new(base_url: impl Into<String>, player: Arc<dyn VideoPlayer>) -> Self {
        let (state, _) = watch::channel(LaundryState::default());
        Self {
            base_url: base_url.into(),
            state,
            player,
        }
    }

    pub fn state(&self) -> LaundryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaundryState> {
        self.state.subscribe()
    }

    /// Builds a dispatch from the backend's response and hands it to the player.
    ///
    /// The newest response always wins over whatever is playing.
    pub(crate) fn handle_video_response(&self, response: &LaundryVideoResponse) {
        if response.video_path.is_empty() {
            warn!("Laundry video response without a video path.");
            return;
        }

        let dispatch = LaundryDispatch {
            url: resolve_media_url(&self.base_url, &response.video_path),
            title: video_title(response.machine_id.as_deref()),
            silent: response.silent_mode,
        };
        info!(url = %dispatch.url, silent = dispatch.silent, "Dispatching laundry video.");

        self.state.send_modify(|state| {
            if !state.laundry_mode {
                debug!("Enabling laundry mode.");
                state.laundry_mode = true;
            }
            state.current = Some(dispatch.clone());
        });

        if !dispatch.silent {
            if let Some(text) = response.response_text.as_deref().filter(|t| !t.is_empty()) {
                self.player.voice_cue(text);
            }
        }
        self.player.play_video(&dispatch);
    }

    /// Replaces the machine list. Ignored outside laundry mode.
    pub(crate) fn set_machines(&self, machines: Vec<MachineInfo>) -> bool {
        self.state.send_if_modified(|state| {
            if !state.laundry_mode {
                debug!(count = machines.len(), "Ignoring machine list outside laundry mode.");
                return false;
            }
            state.machines = machines;
            true
        })
    }

    pub fn set_laundry_mode(&self, enabled: bool) {
        self.state.send_if_modified(|state| {
            if state.laundry_mode == enabled {
                return false;
            }
            state.laundry_mode = enabled;
            if !enabled {
                state.current = None;
                state.machines.clear();
            }
            true
        });
    }

    /// Stops the current video, if any.
    pub fn close_video(&self) {
        let had_video = self.state.send_if_modified(|state| state.current.take().is_some());
        if had_video {
            self.player.close_video();
        }
    }
}

pub fn video_title(machine_id: Option<&str>) -> String {
    match machine_id {
        Some(id) if !id.is_empty() => format!("Machine {} tutorial", id),
        _ => "Washing machine tutorial".to_string(),
    }
}
