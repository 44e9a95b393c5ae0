use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::UploadMeta;

/// Optional JSON body of `POST /download/:code`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub code: String,
    pub file_name: String,
    pub size: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub has_password: bool,
}

/// File metadata as shown to clients; never includes bytes or hashes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub code: String,
    pub file_name: String,
    pub size: i64,
    pub has_password: bool,
    pub download_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_time: OffsetDateTime,
}

impl FileSummary {
    pub fn from_meta(meta: UploadMeta, with_id: bool) -> Self {
        Self {
            id: with_id.then_some(meta.id),
            has_password: meta.file_password.is_some(),
            code: meta.unique_code,
            file_name: meta.file_name,
            size: meta.file_size,
            download_count: meta.download_count,
            expires_at: meta.expires_at,
            upload_time: meta.upload_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}
