//! Realtime Transport for the Kiosk Assistant
//!
//! This crate owns the single persistent WebSocket connection to the assistant
//! backend. It is deliberately protocol-agnostic: frames go out and come in as
//! JSON text, and everything above the socket lives in `kiosk-core`.
//!
//! - `connection`: the `ConnectionManager` and its lifecycle notifications.
//! - `backoff`: bounded exponential delay used by callers that re-dial.
//! - `error`: transport error types.

pub mod backoff;
pub mod connection;
pub mod error;

pub use backoff::Backoff;
pub use connection::{Connection, ConnectionManager, ConnectionOptions, ConnectionState, FrameReceiver};
pub use error::ConnectionError;
