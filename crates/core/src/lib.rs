//! Kiosk Assistant Session Core
//!
//! Everything between the raw backend socket and the on-screen/in-speaker side
//! effects lives here:
//!
//! - `protocol`: the JSON wire contract, one enum variant per message kind.
//! - `dispatcher`: fail-soft frame classification and routing to handlers.
//! - `state`: the assistant's conversational state and its transitions.
//! - `queue`: the strictly ordered playback task queue.
//! - `coordinators`: group, advertisement, laundry video and model staging.
//! - `collaborators`: traits implemented by the host (UI, audio, microphone).
//! - `session`: the context object that ties the pieces together.

pub mod collaborators;
pub mod coordinators;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use dispatcher::classify;
pub use error::DecodeError;
pub use protocol::{InboundMessage, OutboundMessage};
pub use session::{Collaborators, Session, SessionOptions};
pub use state::SessionState;
