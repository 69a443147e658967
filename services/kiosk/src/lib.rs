//! Kiosk Service Library Crate
//!
//! Hosts a realtime session headlessly: configuration from the environment,
//! log-backed stand-ins for the renderer and audio devices, and the reconnecting
//! run loop. The `kiosk` binary is a thin wrapper around this library.

pub mod config;
pub mod console;
pub mod runtime;
