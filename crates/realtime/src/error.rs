use tokio_tungstenite::tungstenite;

/// Errors raised while establishing a backend connection.
///
/// Failures on an established socket are never returned to callers; they are
/// reported as a transition to `ConnectionState::Closed`.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid backend address '{0}': expected a ws:// or wss:// URL")]
    InvalidAddress(String),
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}
