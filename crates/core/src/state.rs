//! The assistant's conversational state.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// What the assistant is doing right now.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    ThinkingSpeaking,
    Interrupted,
    Loading,
    Waiting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::ThinkingSpeaking => write!(f, "thinking-speaking"),
            SessionState::Interrupted => write!(f, "interrupted"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Waiting => write!(f, "waiting"),
        }
    }
}

/// Holds the single current `SessionState` and broadcasts every change.
///
/// Mutation is crate-private: only message handlers and queued tasks move the
/// state. Everyone else reads `current()` or watches `subscribe()`.
#[derive(Debug)]
pub struct SessionStateMachine {
    tx: watch::Sender<SessionState>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    /// The latest applied state.
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Unconditionally moves to `next`, returning the previous state.
    pub(crate) fn set(&self, next: SessionState) -> SessionState {
        let previous = self.tx.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Session state changed.");
        }
        previous
    }

    /// Moves to `to` only if the live state is `from` at the moment of the call.
    ///
    /// Returns whether the transition happened. Subscribers are only notified
    /// when it did.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let applied = self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if applied {
            debug!(%from, %to, "Session state changed.");
        }
        applied
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
