use std::sync::Arc;

use batchgen_pipeline::BatchServices;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Generation backend and persistence collaborators shared by every batch.
    pub services: BatchServices,
}

impl AppState {
    /// Whether batches can reach a generation backend at all.
    pub fn generation_configured(&self) -> bool {
        self.services.backend.is_some()
    }
}
