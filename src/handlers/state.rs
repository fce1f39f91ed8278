//! Shared service state.

use std::sync::Arc;

use crate::classifier::Classifier;
use crate::config::ServerConfig;
use crate::masking::MaskingEngine;

/// Everything the handlers need: the masking engine (which owns the
/// injected name recognizer), the ticket classifier, and the server
/// configuration. All pieces are read-only after construction, so the
/// state is shared as a plain `Arc`.
pub struct ServiceState {
    pub engine: MaskingEngine,
    pub classifier: Arc<dyn Classifier>,
    pub config: ServerConfig,
}

/// Application state type alias
pub type AppState = Arc<ServiceState>;

impl ServiceState {
    pub fn new(
        engine: MaskingEngine,
        classifier: Arc<dyn Classifier>,
        config: ServerConfig,
    ) -> Self {
        Self {
            engine,
            classifier,
            config,
        }
    }
}
