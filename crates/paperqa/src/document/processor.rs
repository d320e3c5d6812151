//! Upload storage and per-format text extraction.

use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::fs;

/// Extensions accepted for upload.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "md", "html", "tex", "txt"];

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static LATEX_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)%.*$").expect("valid regex"));
static LATEX_COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\{([^}]*)\}").expect("valid regex"));

/// Errors raised while storing or extracting a document.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to extract text from PDF: {0}")]
    Pdf(String),
}

/// Metadata of a stored upload.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub saved_filename: String,
    pub file_path: PathBuf,
    pub file_type: String,
    pub upload_date: String,
    pub file_size: i64,
}

/// Stores uploaded files and extracts their text.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    papers_dir: PathBuf,
}

impl DocumentProcessor {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            papers_dir: data_dir.join("papers"),
        }
    }

    /// Create the storage directory if missing.
    pub async fn ensure_directories(&self) -> Result<(), ProcessorError> {
        fs::create_dir_all(&self.papers_dir).await?;
        Ok(())
    }

    /// Persist an upload under a unique filename and return its metadata.
    pub async fn save(
        &self,
        content: &[u8],
        original_filename: &str,
    ) -> Result<SavedFile, ProcessorError> {
        let file_type = file_extension(original_filename)?;
        let upload_date = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let saved_filename = format!(
            "{}_{}_{}",
            upload_date,
            nanoid::nanoid!(6),
            original_filename
        );
        let file_path = self.papers_dir.join(&saved_filename);

        fs::write(&file_path, content).await?;

        Ok(SavedFile {
            saved_filename,
            file_path,
            file_type,
            upload_date,
            file_size: content.len() as i64,
        })
    }

    /// Extract plain text from a stored file according to its type.
    pub async fn extract_text(
        &self,
        path: &Path,
        file_type: &str,
    ) -> Result<String, ProcessorError> {
        match file_type {
            "txt" => Ok(fs::read_to_string(path).await?),
            "md" => {
                let raw = fs::read_to_string(path).await?;
                let html = comrak::markdown_to_html(&raw, &comrak::Options::default());
                Ok(strip_html(&html))
            }
            "html" => {
                let raw = fs::read_to_string(path).await?;
                Ok(strip_html(&raw))
            }
            "tex" => {
                let raw = fs::read_to_string(path).await?;
                Ok(strip_latex(&raw))
            }
            "pdf" => extract_pdf_text(path.to_path_buf()).await,
            other => Err(ProcessorError::UnsupportedType(other.to_string())),
        }
    }
}

/// Lowercased extension of an allowed upload, without the dot.
fn file_extension(filename: &str) -> Result<String, ProcessorError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .ok_or_else(|| ProcessorError::UnsupportedType(filename.to_string()))?;

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ProcessorError::UnsupportedType(extension))
    }
}

/// PDF extraction is CPU-bound, run it off the async runtime.
async fn extract_pdf_text(path: PathBuf) -> Result<String, ProcessorError> {
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text(&path).map_err(|err| ProcessorError::Pdf(err.to_string()))
    })
    .await
    .map_err(|err| ProcessorError::Pdf(err.to_string()))?
}

/// Remove markup and collapse whitespace, keeping the visible text.
fn strip_html(html: &str) -> String {
    let without_scripts = SCRIPT_RE.replace_all(html, " ");
    let without_styles = STYLE_RE.replace_all(&without_scripts, " ");
    let without_tags = TAG_RE.replace_all(&without_styles, " ");
    WHITESPACE_RE
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

/// Strip LaTeX comments and unwrap single-argument commands.
fn strip_latex(tex: &str) -> String {
    let without_comments = LATEX_COMMENT_RE.replace_all(tex, "");
    LATEX_COMMAND_RE
        .replace_all(&without_comments, "$1")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn processor() -> (TempDir, DocumentProcessor) {
        let dir = TempDir::new().unwrap();
        let processor = DocumentProcessor::new(dir.path());
        processor.ensure_directories().await.unwrap();
        (dir, processor)
    }

    #[tokio::test]
    async fn save_and_extract_txt() {
        let (_dir, processor) = processor().await;
        let saved = processor.save(b"plain text body", "notes.txt").await.unwrap();
        assert_eq!(saved.file_type, "txt");
        assert!(saved.saved_filename.ends_with("_notes.txt"));
        assert_eq!(saved.file_size, 15);

        let text = processor
            .extract_text(&saved.file_path, &saved.file_type)
            .await
            .unwrap();
        assert_eq!(text, "plain text body");
    }

    #[tokio::test]
    async fn saved_filenames_are_unique() {
        let (_dir, processor) = processor().await;
        let first = processor.save(b"a", "paper.txt").await.unwrap();
        let second = processor.save(b"b", "paper.txt").await.unwrap();
        assert_ne!(first.saved_filename, second.saved_filename);
    }

    #[tokio::test]
    async fn rejects_unsupported_extension() {
        let (_dir, processor) = processor().await;
        let err = processor.save(b"x", "binary.exe").await.unwrap_err();
        assert!(matches!(err, ProcessorError::UnsupportedType(ext) if ext == "exe"));
    }

    #[tokio::test]
    async fn rejects_missing_extension() {
        let (_dir, processor) = processor().await;
        assert!(matches!(
            processor.save(b"x", "README").await,
            Err(ProcessorError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn markdown_extraction_drops_markup() {
        let (_dir, processor) = processor().await;
        let saved = processor
            .save(b"# Title\n\nSome *emphasis* here.", "doc.md")
            .await
            .unwrap();
        let text = processor
            .extract_text(&saved.file_path, &saved.file_type)
            .await
            .unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("Some emphasis here."));
        assert!(!text.contains('#'));
        assert!(!text.contains('*'));
    }

    #[tokio::test]
    async fn html_extraction_keeps_visible_text_only() {
        let (_dir, processor) = processor().await;
        let saved = processor
            .save(
                b"<html><head><style>p { color: red; }</style></head>\
                  <body><p>visible</p><script>var x = 1;</script></body></html>",
                "page.html",
            )
            .await
            .unwrap();
        let text = processor
            .extract_text(&saved.file_path, &saved.file_type)
            .await
            .unwrap();
        assert_eq!(text, "visible");
    }

    #[tokio::test]
    async fn latex_extraction_strips_comments_and_commands() {
        let (_dir, processor) = processor().await;
        let saved = processor
            .save(
                b"\\section{Introduction} % a comment\nBody text.",
                "paper.tex",
            )
            .await
            .unwrap();
        let text = processor
            .extract_text(&saved.file_path, &saved.file_type)
            .await
            .unwrap();
        assert!(text.contains("Introduction"));
        assert!(text.contains("Body text."));
        assert!(!text.contains("comment"));
        assert!(!text.contains("\\section"));
    }
}
