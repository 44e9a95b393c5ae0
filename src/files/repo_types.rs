use bytes::Bytes;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Upload metadata; never carries the payload.
#[derive(Debug, Clone, FromRow)]
pub struct UploadMeta {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub unique_code: String,
    pub file_password: Option<String>, // Argon2 hash
    pub download_count: i64,
    pub expires_at: Option<OffsetDateTime>,
    pub upload_time: OffsetDateTime,
}

impl UploadMeta {
    /// An upload is expired once `expires_at` is strictly in the past.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires_at, Some(at) if at < now)
    }
}

/// Full row including the stored bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub meta: UploadMeta,
    pub file_data: Vec<u8>,
}

/// Result of a counted download: the new count and the payload.
#[derive(Debug, Clone, FromRow)]
pub struct DownloadedRow {
    pub download_count: i64,
    pub file_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewUpload {
    pub owner_id: Option<Uuid>,
    pub file_name: String,
    pub file_data: Bytes,
    pub file_size: i64,
    pub unique_code: String,
    pub file_password: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
    pub upload_time: OffsetDateTime,
}
