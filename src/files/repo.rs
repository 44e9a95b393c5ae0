use std::{collections::HashMap, sync::Mutex};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{DownloadedRow, NewUpload, Upload, UploadMeta};

/// Persistence for uploaded files and their metadata.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn insert(&self, upload: NewUpload) -> anyhow::Result<UploadMeta>;
    async fn find_meta_by_code(&self, code: &str) -> anyhow::Result<Option<UploadMeta>>;
    /// Bumps the download count and reads the payload in one step.
    /// `None` if the row no longer exists.
    async fn record_download(&self, id: Uuid) -> anyhow::Result<Option<DownloadedRow>>;
    /// Deletes one upload if it has expired as of `now`.
    async fn delete_if_expired(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool>;
    /// Newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<UploadMeta>>;
    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> anyhow::Result<bool>;
    /// Deletes every upload whose expiry lies strictly before `now`.
    async fn delete_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64>;
}

const META_COLUMNS: &str = "id, owner_id, file_name, file_size, unique_code, file_password, \
                            download_count, expires_at, upload_time";

#[derive(Clone)]
pub struct PgUploadStore {
    db: PgPool,
}

impl PgUploadStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn insert(&self, upload: NewUpload) -> anyhow::Result<UploadMeta> {
        let sql = format!(
            r#"
            INSERT INTO uploads
                (owner_id, file_name, file_data, file_size, unique_code,
                 file_password, expires_at, upload_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {META_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UploadMeta>(&sql)
            .bind(upload.owner_id) // Option<Uuid> → NULL for anonymous uploads
            .bind(&upload.file_name)
            .bind(upload.file_data.as_ref())
            .bind(upload.file_size)
            .bind(&upload.unique_code)
            .bind(&upload.file_password)
            .bind(upload.expires_at)
            .bind(upload.upload_time)
            .fetch_one(&self.db)
            .await
            .context("insert upload")?;
        Ok(row)
    }

    async fn find_meta_by_code(&self, code: &str) -> anyhow::Result<Option<UploadMeta>> {
        let sql = format!("SELECT {META_COLUMNS} FROM uploads WHERE unique_code = $1 LIMIT 1");
        let row = sqlx::query_as::<_, UploadMeta>(&sql)
            .bind(code)
            .fetch_optional(&self.db)
            .await
            .context("find upload meta by code")?;
        Ok(row)
    }

    async fn record_download(&self, id: Uuid) -> anyhow::Result<Option<DownloadedRow>> {
        let row = sqlx::query_as::<_, DownloadedRow>(
            r#"
            UPDATE uploads
               SET download_count = download_count + 1
             WHERE id = $1
         RETURNING download_count, file_data
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("record download")?;
        Ok(row)
    }

    async fn delete_if_expired(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"DELETE FROM uploads WHERE id = $1 AND expires_at IS NOT NULL AND expires_at < $2"#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.db)
        .await
        .context("delete expired upload")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<UploadMeta>> {
        let sql = format!(
            "SELECT {META_COLUMNS} FROM uploads WHERE owner_id = $1 ORDER BY upload_time DESC"
        );
        let rows = sqlx::query_as::<_, UploadMeta>(&sql)
            .bind(owner_id)
            .fetch_all(&self.db)
            .await
            .context("list uploads by owner")?;
        Ok(rows)
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM uploads WHERE id = $1 AND owner_id = $2"#)
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await
            .context("delete owned upload")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"DELETE FROM uploads WHERE expires_at IS NOT NULL AND expires_at < $1"#,
        )
        .bind(now)
        .execute(&self.db)
        .await
        .context("sweep expired uploads")?;
        Ok(res.rows_affected())
    }
}

/// Process-local store used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryUploadStore {
    uploads: Mutex<HashMap<Uuid, Upload>>,
}

impl MemoryUploadStore {
    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<Uuid, Upload>>> {
        self.uploads
            .lock()
            .map_err(|_| anyhow::anyhow!("upload store lock poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn insert(&self, upload: NewUpload) -> anyhow::Result<UploadMeta> {
        let meta = UploadMeta {
            id: Uuid::new_v4(),
            owner_id: upload.owner_id,
            file_name: upload.file_name,
            file_size: upload.file_size,
            unique_code: upload.unique_code,
            file_password: upload.file_password,
            download_count: 0,
            expires_at: upload.expires_at,
            upload_time: upload.upload_time,
        };
        self.lock()?.insert(
            meta.id,
            Upload {
                meta: meta.clone(),
                file_data: upload.file_data.to_vec(),
            },
        );
        Ok(meta)
    }

    async fn find_meta_by_code(&self, code: &str) -> anyhow::Result<Option<UploadMeta>> {
        Ok(self
            .lock()?
            .values()
            .find(|u| u.meta.unique_code == code)
            .map(|u| u.meta.clone()))
    }

    async fn record_download(&self, id: Uuid) -> anyhow::Result<Option<DownloadedRow>> {
        Ok(self.lock()?.get_mut(&id).map(|u| {
            u.meta.download_count += 1;
            DownloadedRow {
                download_count: u.meta.download_count,
                file_data: u.file_data.clone(),
            }
        }))
    }

    async fn delete_if_expired(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<bool> {
        let mut uploads = self.lock()?;
        match uploads.get(&id) {
            Some(u) if u.meta.is_expired(now) => {
                uploads.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<UploadMeta>> {
        let mut rows: Vec<UploadMeta> = self
            .lock()?
            .values()
            .filter(|u| u.meta.owner_id == Some(owner_id))
            .map(|u| u.meta.clone())
            .collect();
        rows.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(rows)
    }

    async fn delete_owned(&self, id: Uuid, owner_id: Uuid) -> anyhow::Result<bool> {
        let mut uploads = self.lock()?;
        match uploads.get(&id) {
            Some(u) if u.meta.owner_id == Some(owner_id) => {
                uploads.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut uploads = self.lock()?;
        let before = uploads.len();
        uploads.retain(|_, u| !u.meta.is_expired(now));
        Ok((before - uploads.len()) as u64)
    }
}
