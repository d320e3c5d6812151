//! HTTP request handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::{Document, DocumentRepository};
use crate::llm::ModelInfo;

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Default number of search results.
const DEFAULT_SEARCH_LIMIT: i64 = 10;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /models
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.models.as_ref().clone())
}

/// Response to a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub document_id: String,
    pub metadata: Document,
}

/// POST /upload
///
/// Multipart upload with a single `file` field. The file is stored, its
/// text extracted and a document row inserted.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::bad_request("Upload is missing a filename."))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(format!("Failed to read upload: {err}")))?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("Upload is missing a 'file' field."))?;

    let saved = state.processor.save(&bytes, &filename).await?;
    let content = state
        .processor
        .extract_text(&saved.file_path, &saved.file_type)
        .await?;

    let now = Utc::now().to_rfc3339();
    let document = Document {
        id: DocumentRepository::new_document_id(),
        original_filename: filename.clone(),
        saved_filename: saved.saved_filename,
        file_path: saved.file_path.to_string_lossy().into_owned(),
        file_type: saved.file_type,
        upload_date: saved.upload_date,
        file_size: saved.file_size,
        text_length: content.chars().count() as i64,
        content,
        title: Some(title_from_filename(&filename)),
        authors: None,
        abstract_text: None,
        keywords: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.documents.insert(&document).await?;

    info!(
        "uploaded document {} ({}, {} bytes)",
        document.id, document.original_filename, document.file_size
    );

    Ok(Json(UploadResponse {
        message: "Document uploaded successfully.".to_string(),
        document_id: document.id.clone(),
        metadata: document,
    }))
}

/// GET /documents/{doc_id}
pub async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> ApiResult<Json<Document>> {
    let document = state
        .documents
        .get(&doc_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Document not found: {doc_id}")))?;
    Ok(Json(document))
}

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<i64>,
}

/// GET /search?query=...&limit=...
pub async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Document>>> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state.documents.search(&params.query, limit).await?;
    Ok(Json(results))
}

/// DELETE /documents/{doc_id}
pub async fn delete_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.documents.delete(&doc_id).await? {
        return Err(ApiError::not_found(format!("Document not found: {doc_id}")));
    }
    info!("deleted document {doc_id}");
    Ok(Json(json!({ "message": "Document deleted successfully." })))
}

/// Derive a display title from the uploaded filename.
fn title_from_filename(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
        .to_string()
}
