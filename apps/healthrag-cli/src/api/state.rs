use healthrag_rag::RagPipeline;

/// Shared state for all handlers; the pipeline is read-only after startup.
pub struct AppState {
    pub pipeline: RagPipeline,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { pipeline }
    }
}
