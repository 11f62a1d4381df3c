use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub redirect: RedirectConfig,
    pub title: TitleConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: u64,
    pub ttl_secs: u64,
    pub sweep_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// HTTP status for redirects; one of 301, 302, 303, 307, 308.
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    pub backfill: bool,
    pub fetch_timeout_secs: u64,
    pub fetch_max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./tern.db".to_string());

        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("PORT", 8080u16)?;

        let redirect_status = match env_parse("REDIRECT_STATUS", 302u16)? {
            status @ (301 | 302 | 303 | 307 | 308) => status,
            other => {
                tracing::warn!(
                    "REDIRECT_STATUS {other} is not a redirect status, falling back to 302"
                );
                302
            }
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            cache: CacheConfig {
                capacity: env_parse("CACHE_CAPACITY", 10_000u64)?,
                ttl_secs: env_parse("CACHE_TTL_SECS", 300u64)?,
                sweep_secs: env_parse("CACHE_SWEEP_SECS", 600u64)?,
            },
            redirect: RedirectConfig {
                status: redirect_status,
            },
            title: TitleConfig {
                backfill: env_flag("TITLE_BACKFILL", true),
                fetch_timeout_secs: env_parse("TITLE_FETCH_TIMEOUT_SECS", 4u64)?,
                fetch_max_bytes: env_parse("TITLE_FETCH_MAX_BYTES", 64 * 1024usize)?,
            },
            rate_limit: RateLimitConfig {
                max_requests: env_parse("RATE_LIMIT_MAX", 100u32)?,
                window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", 900i64)?,
            },
        })
    }
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("invalid {name}: {err}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}
