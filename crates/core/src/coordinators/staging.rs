use crate::{collaborators::CharacterConfig, protocol::ModelInfo};
use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};
use tracing::debug;

/// Model descriptors waiting to be applied.
///
/// Handlers stage; the host loop flushes on its next tick, after the frame
/// that staged the value has been fully routed.
#[derive(Debug, Default)]
pub struct ModelStaging {
    pending: Mutex<VecDeque<ModelInfo>>,
}

impl ModelStaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn stage(&self, info: ModelInfo) {
        debug!(url = %info.url, "Staging model info.");
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(info);
    }

    pub fn has_pending(&self) -> bool {
        !self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Applies every staged value in arrival order, each exactly once.
    pub(crate) fn flush(&self, config: &dyn CharacterConfig) -> usize {
        let drained: Vec<ModelInfo> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = drained.len();
        for info in drained {
            debug!(url = %info.url, "Applying staged model info.");
            config.apply_model_info(info);
        }
        count
    }
}
