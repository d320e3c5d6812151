//! Document database repository.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::Document;

/// Repository for document persistence and lexical search.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Create a new repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mint a new document id.
    pub fn new_document_id() -> String {
        format!("doc_{}", nanoid::nanoid!(12))
    }

    /// Insert a document row.
    pub async fn insert(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, original_filename, saved_filename, file_path, file_type,
                upload_date, file_size, content, text_length,
                title, authors, abstract, keywords, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.original_filename)
        .bind(&document.saved_filename)
        .bind(&document.file_path)
        .bind(&document.file_type)
        .bind(&document.upload_date)
        .bind(document.file_size)
        .bind(&document.content)
        .bind(document.text_length)
        .bind(&document.title)
        .bind(&document.authors)
        .bind(&document.abstract_text)
        .bind(&document.keywords)
        .bind(&document.created_at)
        .bind(&document.updated_at)
        .execute(&self.pool)
        .await
        .context("inserting document")?;

        Ok(())
    }

    /// Get a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, original_filename, saved_filename, file_path, file_type,
                   upload_date, file_size, content, text_length,
                   title, authors, abstract, keywords, created_at, updated_at
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching document")?;

        Ok(document)
    }

    /// Delete a document by id. Returns whether a row existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("deleting document")?;

        Ok(result.rows_affected() > 0)
    }

    /// Lexical search over metadata and extracted text.
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<Document>> {
        let pattern = format!("%{query}%");
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, original_filename, saved_filename, file_path, file_type,
                   upload_date, file_size, content, text_length,
                   title, authors, abstract, keywords, created_at, updated_at
            FROM documents
            WHERE title LIKE ?
               OR authors LIKE ?
               OR abstract LIKE ?
               OR keywords LIKE ?
               OR content LIKE ?
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("searching documents")?;

        Ok(documents)
    }
}
