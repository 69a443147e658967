use crate::{collaborators::AdvertisementDisplay, protocol::AdvertisementControl};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct AdvertisementControlState {
    pub visible: bool,
    pub last_trigger_reason: Option<String>,
}

impl Default for AdvertisementControlState {
    fn default() -> Self {
        Self {
            visible: true,
            last_trigger_reason: None,
        }
    }
}

/// Relays advertisement control from the wake-word detector to the display.
///
/// Showing an already visible carousel is a no-op. Content is only reloaded
/// through `refresh()`, never as a side effect of showing it again.
pub struct AdvertisementCoordinator {
    state: watch::Sender<AdvertisementControlState>,
    display: Arc<dyn AdvertisementDisplay>,
}

impl AdvertisementCoordinator {
    pub fn new(display: Arc<dyn AdvertisementDisplay>) -> Self {
        let (state, _) = watch::channel(AdvertisementControlState::default());
        Self { state, display }
    }

    pub fn state(&self) -> AdvertisementControlState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AdvertisementControlState> {
        self.state.subscribe()
    }

    pub(crate) fn apply_control(&self, control: &AdvertisementControl) {
        let reason = control.trigger_reason.as_deref();
        match control.control_action.as_str() {
            "start_ads" => {
                self.set_visible(true, reason);
            }
            "stop_ads" => {
                self.set_visible(false, reason);
            }
            other => debug!(action = %other, "Ignoring advertisement control action."),
        }
    }

    /// Shows or hides the carousel. Returns whether visibility changed.
    pub fn set_visible(&self, visible: bool, reason: Option<&str>) -> bool {
        let mut changed = false;
        self.state.send_if_modified(|state| {
            changed = state.visible != visible;
            state.visible = visible;
            let reason = reason.map(str::to_string);
            let reason_changed = state.last_trigger_reason != reason;
            if reason.is_some() {
                state.last_trigger_reason = reason;
            }
            changed || reason_changed
        });
        if changed {
            info!(visible, reason = ?reason, "Advertisement visibility changed.");
            self.display.set_visible(visible);
        }
        changed
    }

    /// Flips visibility from a local UI control.
    pub fn toggle(&self) -> bool {
        let visible = !self.state.borrow().visible;
        self.set_visible(visible, Some("manual_toggle"));
        visible
    }

    /// Reloads advertisement content.
    pub fn refresh(&self) {
        debug!("Reloading advertisement content.");
        self.display.reload();
    }
}
