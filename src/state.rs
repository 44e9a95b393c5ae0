use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::files::repo::{MemoryUploadStore, PgUploadStore, UploadStore};
use crate::rate_limit::RateLimitState;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub users: Arc<dyn UserStore>,
    pub uploads: Arc<dyn UploadStore>,
    pub rate_limit: Arc<RateLimitState>,
}

impl AppState {
    /// Loads configuration and opens storage. Runs once before serving.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (users, uploads) = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                (
                    Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>,
                    Arc::new(PgUploadStore::new(pool)) as Arc<dyn UploadStore>,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory storage (data is lost on restart)");
                (
                    Arc::new(MemoryUserStore::default()) as Arc<dyn UserStore>,
                    Arc::new(MemoryUploadStore::default()) as Arc<dyn UploadStore>,
                )
            }
        };

        Ok(Self::from_parts(config, users, uploads))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        uploads: Arc<dyn UploadStore>,
    ) -> Self {
        Self {
            jwt: Arc::new(JwtKeys::from(&config.jwt)),
            rate_limit: Arc::new(RateLimitState::new(&config.rate_limit)),
            config,
            users,
            uploads,
        }
    }

    /// In-memory state with test settings.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryUserStore::default()),
            Arc::new(MemoryUploadStore::default()),
        )
    }
}
