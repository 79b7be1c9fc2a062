//! Stored files and their attachment to products.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub checksum: Option<String>,
    /// Path relative to the configured files directory.
    pub storage_path: String,
    pub created_at: i64,
}

/// One attachment row joined with its file metadata, as read for
/// building activation payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ProductFileDetail {
    pub id: String,
    pub file_id: String,
    pub label: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub checksum: Option<String>,
}

/// Client-facing download entry with a presigned URL.
#[derive(Debug, Clone, Serialize)]
pub struct FileDownload {
    pub file_id: String,
    pub label: String,
    pub description: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub checksum: Option<String>,
    pub url: String,
    pub url_expires_at: i64,
}
