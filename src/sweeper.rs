use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info};

use crate::files::repo::UploadStore;

/// Periodically deletes uploads whose expiry has passed.
pub struct ExpirySweeper {
    store: Arc<dyn UploadStore>,
    interval: Duration,
    in_flight: AtomicBool,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn UploadStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs one sweep. Returns `Ok(None)` if another sweep is still running.
    pub async fn sweep_once(&self, now: OffsetDateTime) -> anyhow::Result<Option<u64>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("sweep already in flight; skipping");
            return Ok(None);
        }
        let result = self.store.delete_expired(now).await;
        self.in_flight.store(false, Ordering::Release);
        result.map(Some)
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.interval.as_secs(), "expiry sweeper started");
            loop {
                ticker.tick().await;
                match self.sweep_once(OffsetDateTime::now_utc()).await {
                    Ok(Some(0)) | Ok(None) => {}
                    Ok(Some(n)) => info!(deleted = n, "swept expired uploads"),
                    Err(e) => error!(error = %format!("{e:#}"), "expiry sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        files::{
            repo::MemoryUploadStore,
            services::{create_upload, download, UploadItem},
        },
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use time::Duration as TimeDuration;
    use uuid::Uuid;

    fn item(name: &str, days: i64) -> UploadItem {
        UploadItem {
            owner_id: None,
            file_name: name.into(),
            body: Bytes::from_static(b"data"),
            password: None,
            expiry_days: Some(days),
        }
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_uploads() {
        let store = Arc::new(MemoryUploadStore::default());
        let cfg = AppConfig::for_tests().uploads;
        let now = OffsetDateTime::now_utc();
        create_upload(store.as_ref(), &cfg, item("short.txt", 1), now)
            .await
            .unwrap();
        let keep = create_upload(store.as_ref(), &cfg, item("long.txt", 30), now)
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(store.clone(), Duration::from_secs(3600));
        let later = now + TimeDuration::days(2);
        assert_eq!(sweeper.sweep_once(later).await.unwrap(), Some(1));
        assert_eq!(store.len(), 1);
        assert!(download(store.as_ref(), &keep.code, None, later).await.is_ok());

        // nothing left to sweep
        assert_eq!(sweeper.sweep_once(later).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn second_sweep_is_skipped_while_one_runs() {
        let sweeper = ExpirySweeper::new(
            Arc::new(MemoryUploadStore::default()),
            Duration::from_secs(3600),
        );
        sweeper.in_flight.store(true, Ordering::SeqCst);
        assert_eq!(
            sweeper.sweep_once(OffsetDateTime::now_utc()).await.unwrap(),
            None
        );
        sweeper.in_flight.store(false, Ordering::SeqCst);
        assert_eq!(
            sweeper.sweep_once(OffsetDateTime::now_utc()).await.unwrap(),
            Some(0)
        );
    }

    struct FailingStore;

    #[async_trait]
    impl UploadStore for FailingStore {
        async fn insert(
            &self,
            _u: crate::files::repo_types::NewUpload,
        ) -> anyhow::Result<crate::files::repo_types::UploadMeta> {
            anyhow::bail!("down")
        }
        async fn find_meta_by_code(
            &self,
            _c: &str,
        ) -> anyhow::Result<Option<crate::files::repo_types::UploadMeta>> {
            anyhow::bail!("down")
        }
        async fn record_download(
            &self,
            _id: Uuid,
        ) -> anyhow::Result<Option<crate::files::repo_types::DownloadedRow>> {
            anyhow::bail!("down")
        }
        async fn delete_if_expired(&self, _id: Uuid, _n: OffsetDateTime) -> anyhow::Result<bool> {
            anyhow::bail!("down")
        }
        async fn list_by_owner(
            &self,
            _o: Uuid,
        ) -> anyhow::Result<Vec<crate::files::repo_types::UploadMeta>> {
            anyhow::bail!("down")
        }
        async fn delete_owned(&self, _id: Uuid, _o: Uuid) -> anyhow::Result<bool> {
            anyhow::bail!("down")
        }
        async fn delete_expired(&self, _n: OffsetDateTime) -> anyhow::Result<u64> {
            anyhow::bail!("down")
        }
    }

    #[tokio::test]
    async fn failed_sweep_releases_the_guard() {
        let sweeper = ExpirySweeper::new(Arc::new(FailingStore), Duration::from_secs(3600));
        assert!(sweeper.sweep_once(OffsetDateTime::now_utc()).await.is_err());
        assert!(!sweeper.in_flight.load(Ordering::SeqCst));
    }
}
