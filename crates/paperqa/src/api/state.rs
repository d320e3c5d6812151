//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::SessionStore;
use crate::document::{DocumentProcessor, DocumentRepository};
use crate::llm::{ModelInfo, ResponseGenerator};
use crate::ws::ConnectionRegistry;

/// Application state shared across all handlers.
///
/// The two in-memory stores are constructed once at process start and live
/// for the whole process; everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Chat session store (credential -> transcript).
    pub sessions: Arc<SessionStore>,
    /// Live WebSocket connections by client id.
    pub connections: Arc<ConnectionRegistry>,
    /// Document persistence and lexical search.
    pub documents: Arc<DocumentRepository>,
    /// Upload storage and text extraction.
    pub processor: Arc<DocumentProcessor>,
    /// External response generator.
    pub generator: Arc<dyn ResponseGenerator>,
    /// Models offered to clients.
    pub models: Arc<Vec<ModelInfo>>,
    /// Model used when a message names none.
    pub default_model: String,
    /// Directory of frontend assets, when serving them.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        documents: DocumentRepository,
        processor: DocumentProcessor,
        generator: Arc<dyn ResponseGenerator>,
        models: Vec<ModelInfo>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            connections: Arc::new(ConnectionRegistry::new()),
            documents: Arc::new(documents),
            processor: Arc::new(processor),
            generator,
            models: Arc::new(models),
            default_model: default_model.into(),
            static_dir: None,
        }
    }

    /// Serve frontend assets from the given directory.
    pub fn with_static_dir(mut self, dir: PathBuf) -> Self {
        self.static_dir = Some(dir);
        self
    }
}
