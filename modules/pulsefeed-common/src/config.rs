use std::env;
use std::time::Duration;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Upstream post provider
    pub firefeed_base_url: String,
    pub firefeed_api_key: String,

    // LLM providers (either may be empty; at least one must be set to
    // summarize)
    pub anthropic_api_key: String,
    pub openai_api_key: String,

    pub settings: Settings,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            firefeed_base_url: env::var("FIREFEED_BASE_URL")
                .unwrap_or_else(|_| "https://api.firefeed.io".to_string()),
            firefeed_api_key: required_env("FIREFEED_API_KEY"),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            settings: Settings::from_env(),
        }
    }

    /// Log the loaded configuration without leaking secrets.
    pub fn log_redacted(&self) {
        info!(
            firefeed_base_url = %self.firefeed_base_url,
            anthropic = !self.anthropic_api_key.is_empty(),
            openai = !self.openai_api_key.is_empty(),
            "Config loaded"
        );
    }
}

/// Pipeline tunables. Every field has a documented default and can be
/// overridden via the matching `PULSEFEED_*` environment variable.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Max retry attempts for transient fetch failures. Default 5.
    pub fetch_max_retries: u32,
    /// First retry delay; doubles per attempt. Default 1s.
    pub fetch_backoff_base: Duration,
    /// Retry delay ceiling. Default 60s.
    pub fetch_backoff_cap: Duration,
    /// Per-HTTP-call timeout. Default 30s.
    pub http_timeout: Duration,
    /// Accounts ingested in parallel. Default 3.
    pub ingest_concurrency: usize,
    /// Consecutive already-seen posts before ingestion stops scanning an
    /// account's history. 0 disables early stop. Default 5.
    pub early_stop_threshold: u32,
    /// Posts per deduplication batch. Default 1000.
    pub dedup_batch_size: usize,
    /// Cosine similarity threshold for near-duplicate grouping. Default 0.85.
    pub similarity_threshold: f64,
    /// When false the similarity pass reports no groups. Default true.
    pub similarity_enabled: bool,
    /// Groups summarized in parallel. Default 5.
    pub summarize_concurrency: usize,
    /// Texts shorter than this are echoed back instead of summarized.
    /// Default 40 chars.
    pub short_text_threshold: usize,
    /// Summary cache entry lifetime. Default 7 days.
    pub cache_ttl: Duration,
    /// How long terminal tasks stay visible in the registry. Default 1h.
    pub task_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch_max_retries: 5,
            fetch_backoff_base: Duration::from_secs(1),
            fetch_backoff_cap: Duration::from_secs(60),
            http_timeout: Duration::from_secs(30),
            ingest_concurrency: 3,
            early_stop_threshold: 5,
            dedup_batch_size: 1000,
            similarity_threshold: 0.85,
            similarity_enabled: true,
            summarize_concurrency: 5,
            short_text_threshold: 40,
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            task_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            fetch_max_retries: env_parsed("PULSEFEED_FETCH_MAX_RETRIES", d.fetch_max_retries),
            fetch_backoff_base: Duration::from_secs(env_parsed(
                "PULSEFEED_FETCH_BACKOFF_BASE_SECS",
                d.fetch_backoff_base.as_secs(),
            )),
            fetch_backoff_cap: Duration::from_secs(env_parsed(
                "PULSEFEED_FETCH_BACKOFF_CAP_SECS",
                d.fetch_backoff_cap.as_secs(),
            )),
            http_timeout: Duration::from_secs(env_parsed(
                "PULSEFEED_HTTP_TIMEOUT_SECS",
                d.http_timeout.as_secs(),
            )),
            ingest_concurrency: env_parsed("PULSEFEED_INGEST_CONCURRENCY", d.ingest_concurrency),
            early_stop_threshold: env_parsed(
                "PULSEFEED_EARLY_STOP_THRESHOLD",
                d.early_stop_threshold,
            ),
            dedup_batch_size: env_parsed("PULSEFEED_DEDUP_BATCH_SIZE", d.dedup_batch_size),
            similarity_threshold: env_parsed(
                "PULSEFEED_SIMILARITY_THRESHOLD",
                d.similarity_threshold,
            ),
            similarity_enabled: env_parsed("PULSEFEED_SIMILARITY_ENABLED", d.similarity_enabled),
            summarize_concurrency: env_parsed(
                "PULSEFEED_SUMMARIZE_CONCURRENCY",
                d.summarize_concurrency,
            ),
            short_text_threshold: env_parsed(
                "PULSEFEED_SHORT_TEXT_THRESHOLD",
                d.short_text_threshold,
            ),
            cache_ttl: Duration::from_secs(env_parsed(
                "PULSEFEED_CACHE_TTL_SECS",
                d.cache_ttl.as_secs(),
            )),
            task_ttl: Duration::from_secs(env_parsed(
                "PULSEFEED_TASK_TTL_SECS",
                d.task_ttl.as_secs(),
            )),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.fetch_max_retries, 5);
        assert_eq!(s.fetch_backoff_base, Duration::from_secs(1));
        assert_eq!(s.fetch_backoff_cap, Duration::from_secs(60));
        assert_eq!(s.ingest_concurrency, 3);
        assert_eq!(s.dedup_batch_size, 1000);
        assert!((s.similarity_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(s.summarize_concurrency, 5);
        assert_eq!(s.cache_ttl, Duration::from_secs(604_800));
    }
}
