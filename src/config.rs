use serde::Deserialize;

/// Upper bound for any upload lifetime, in days.
pub const MAX_EXPIRY_DAYS: i64 = 365;

const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "msi", "vbs", "js", "jar", "ps1", "sh", "dll",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub remember_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
    pub default_expiry_days: i64,
    /// Lowercase, without the leading dot.
    pub blocked_extensions: Vec<String>,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_per_minute: u32,
    pub api_per_minute: u32,
    /// Key buckets on `X-Forwarded-For` / `X-Real-IP`. Only safe behind a
    /// reverse proxy that overwrites them.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub uploads: UploadConfig,
    pub rate_limit: RateLimitConfig,
    pub static_dir: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!("JWT_SECRET not set; using development secret");
                "dev-secret".to_string()
            }
        };

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dropbin".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dropbin-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            remember_ttl_minutes: env_parse("JWT_REMEMBER_TTL_MINUTES", 60 * 24 * 7),
        };

        let blocked_extensions = match std::env::var("BLOCKED_EXTENSIONS") {
            Ok(list) => parse_extension_list(&list),
            Err(_) => DEFAULT_BLOCKED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        };

        let uploads = UploadConfig {
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 1024 * 1024 * 1024),
            default_expiry_days: clamp_expiry_days(env_parse("DEFAULT_EXPIRY_DAYS", 7)),
            blocked_extensions,
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", 60 * 60),
        };

        let rate_limit = RateLimitConfig {
            auth_per_minute: env_parse("AUTH_RATE_LIMIT_PER_MINUTE", 10),
            api_per_minute: env_parse("API_RATE_LIMIT_PER_MINUTE", 300),
            trust_proxy_headers: env_parse("TRUST_PROXY_HEADERS", false),
        };

        Ok(Self {
            database_url,
            jwt,
            uploads,
            rate_limit,
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "public".into()),
        })
    }

    /// Settings used by `AppState::fake` and the unit tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
                remember_ttl_minutes: 60 * 24 * 7,
            },
            uploads: UploadConfig {
                max_upload_bytes: 1024 * 1024,
                default_expiry_days: 7,
                blocked_extensions: DEFAULT_BLOCKED_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                sweep_interval_secs: 60 * 60,
            },
            rate_limit: RateLimitConfig {
                auth_per_minute: 1000,
                api_per_minute: 1000,
                trust_proxy_headers: false,
            },
            static_dir: "public".into(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn clamp_expiry_days(days: i64) -> i64 {
    let clamped = days.clamp(1, MAX_EXPIRY_DAYS);
    if clamped != days {
        tracing::warn!(days, clamped, "DEFAULT_EXPIRY_DAYS out of range");
    }
    clamped
}

fn parse_extension_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
