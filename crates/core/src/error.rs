use thiserror::Error;

/// Reasons a frame from the backend could not be turned into a message.
///
/// These never escape the dispatcher; they are logged and the frame is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Frame has no string `type` field")]
    MissingKind,
    #[error("Invalid payload for message kind '{kind}': {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
