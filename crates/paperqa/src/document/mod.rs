//! Document ingestion: upload storage, text extraction and persistence.

mod models;
mod processor;
mod repository;

pub use models::Document;
pub use processor::{DocumentProcessor, ProcessorError, SavedFile};
pub use repository::DocumentRepository;
