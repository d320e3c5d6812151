//! Document data model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An uploaded document and its extracted text.
///
/// `content` holds the full extracted text; lexical search runs over it and
/// the metadata columns, and matching documents travel into the generation
/// prompt as context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    /// Unique document id.
    pub id: String,
    /// Filename as uploaded.
    pub original_filename: String,
    /// Unique filename on disk.
    pub saved_filename: String,
    /// Absolute path of the stored file.
    pub file_path: String,
    /// Lowercased extension without the dot.
    pub file_type: String,
    /// Upload timestamp, `%Y%m%d_%H%M%S`.
    pub upload_date: String,
    /// Size of the uploaded file in bytes.
    pub file_size: i64,
    /// Extracted plain text.
    pub content: String,
    /// Length of the extracted text in characters.
    pub text_length: i64,
    pub title: Option<String>,
    pub authors: Option<String>,
    #[serde(rename = "abstract")]
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    /// Title for display and citation, with a placeholder for untitled
    /// documents.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| "Untitled".to_string())
    }
}
