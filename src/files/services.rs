use bytes::Bytes;
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{repo::UploadStore, repo_types::NewUpload};
use crate::{
    auth::password::{hash_password_blocking, verify_password_blocking},
    config::{UploadConfig, MAX_EXPIRY_DAYS},
    error::{AppError, AppResult},
    files::dto::FileSummary,
};

/// Share codes are this many random bytes, hex encoded.
const CODE_BYTES: usize = 6;
/// Column width of `uploads.file_name`.
const MAX_FILE_NAME_LEN: usize = 255;
/// Longer suffixes are not treated as an extension when truncating.
const MAX_KEPT_EXTENSION_LEN: usize = 16;

pub struct UploadItem {
    pub owner_id: Option<Uuid>,
    pub file_name: String,
    pub body: Bytes,
    pub password: Option<String>,
    pub expiry_days: Option<i64>,
}

#[derive(Debug)]
pub struct UploadReceipt {
    pub code: String,
    pub file_name: String,
    pub size: i64,
    pub expires_at: Option<OffsetDateTime>,
    pub has_password: bool,
}

#[derive(Debug)]
pub struct DownloadedFile {
    pub file_name: String,
    pub body: Bytes,
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.is_empty() {
        return "file".to_string();
    }
    if cleaned.len() <= MAX_FILE_NAME_LEN {
        return cleaned;
    }

    // only ASCII survives the filter, so byte offsets are char boundaries
    match cleaned.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= MAX_KEPT_EXTENSION_LEN => {
            let stem_len = MAX_FILE_NAME_LEN - ext.len() - 1;
            format!("{}.{}", &cleaned[..stem_len], ext)
        }
        _ => cleaned[..MAX_FILE_NAME_LEN].to_string(),
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.trim().rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.trim().to_ascii_lowercase())
}

fn is_blocked(name: &str, blocked: &[String]) -> bool {
    extension_of(name).is_some_and(|ext| blocked.iter().any(|b| *b == ext))
}

pub fn generate_code() -> String {
    let mut buf = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

fn effective_expiry_days(requested: Option<i64>, default_days: i64) -> i64 {
    match requested {
        Some(d) if (1..=MAX_EXPIRY_DAYS).contains(&d) => d,
        _ => default_days.clamp(1, MAX_EXPIRY_DAYS),
    }
}

pub async fn create_upload(
    store: &dyn UploadStore,
    cfg: &UploadConfig,
    item: UploadItem,
    now: OffsetDateTime,
) -> AppResult<UploadReceipt> {
    let file_name = sanitize_file_name(&item.file_name);
    if is_blocked(&item.file_name, &cfg.blocked_extensions)
        || is_blocked(&file_name, &cfg.blocked_extensions)
    {
        warn!(file_name = %item.file_name, "blocked file extension");
        return Err(AppError::Validation(
            "This file type is not allowed for security reasons".into(),
        ));
    }

    let file_password = match item.password.filter(|p| !p.is_empty()) {
        Some(p) => Some(hash_password_blocking(p).await?),
        None => None,
    };

    let days = effective_expiry_days(item.expiry_days, cfg.default_expiry_days);
    let expires_at = Some(now + Duration::days(days));

    let meta = store
        .insert(NewUpload {
            owner_id: item.owner_id,
            file_name,
            file_size: item.body.len() as i64,
            file_data: item.body,
            unique_code: generate_code(),
            file_password,
            expires_at,
            upload_time: now,
        })
        .await?;

    info!(
        upload_id = %meta.id,
        owner = ?meta.owner_id,
        size = meta.file_size,
        protected = meta.file_password.is_some(),
        "file uploaded"
    );
    Ok(UploadReceipt {
        has_password: meta.file_password.is_some(),
        code: meta.unique_code,
        file_name: meta.file_name,
        size: meta.file_size,
        expires_at: meta.expires_at,
    })
}

/// Read-only lookup; an expired upload is reported but left in place.
pub async fn get_info(
    store: &dyn UploadStore,
    code: &str,
    now: OffsetDateTime,
) -> AppResult<FileSummary> {
    let meta = store
        .find_meta_by_code(code)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;
    if meta.is_expired(now) {
        return Err(AppError::Expired);
    }
    Ok(FileSummary::from_meta(meta, false))
}

pub async fn download(
    store: &dyn UploadStore,
    code: &str,
    password: Option<String>,
    now: OffsetDateTime,
) -> AppResult<DownloadedFile> {
    // gate on metadata only; the payload is read once access is granted
    let meta = store
        .find_meta_by_code(code)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    if meta.is_expired(now) {
        store.delete_if_expired(meta.id, now).await?;
        info!(upload_id = %meta.id, "expired upload removed on access");
        return Err(AppError::Expired);
    }

    if let Some(hash) = meta.file_password.clone() {
        let Some(given) = password.filter(|p| !p.is_empty()) else {
            return Err(AppError::PasswordRequired);
        };
        if !verify_password_blocking(given, hash).await? {
            warn!(upload_id = %meta.id, "incorrect file password");
            return Err(AppError::PasswordIncorrect);
        }
    }

    let row = store
        .record_download(meta.id)
        .await?
        // deleted between lookup and download
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    debug!(upload_id = %meta.id, download_count = row.download_count, "file downloaded");
    Ok(DownloadedFile {
        file_name: meta.file_name,
        body: Bytes::from(row.file_data),
    })
}

pub async fn list_owned(store: &dyn UploadStore, owner_id: Uuid) -> AppResult<Vec<FileSummary>> {
    let rows = store.list_by_owner(owner_id).await?;
    Ok(rows
        .into_iter()
        .map(|m| FileSummary::from_meta(m, true))
        .collect())
}

/// Non-owners and missing ids get the same `NotFound`.
pub async fn delete_owned(store: &dyn UploadStore, id: Uuid, owner_id: Uuid) -> AppResult<()> {
    if store.delete_owned(id, owner_id).await? {
        info!(upload_id = %id, owner_id = %owner_id, "upload deleted by owner");
        Ok(())
    } else {
        Err(AppError::NotFound("File not found".into()))
    }
}
