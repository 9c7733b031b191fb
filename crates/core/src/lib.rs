pub mod domain;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod render;
pub mod time;

pub use error::ForecastError;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub price_provider: String,
        pub yahoo_base_url: Option<String>,
        pub data_provider_base_url: Option<String>,
        pub data_provider_api_key: Option<String>,
        pub price_cache_ttl_secs: u64,
        pub forecast_timeout_secs: u64,
        pub forecast_max_horizon: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let price_provider = std::env::var("PRICE_PROVIDER")
                .ok()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "yahoo".to_string());

            Ok(Self {
                price_provider,
                yahoo_base_url: std::env::var("YAHOO_BASE_URL").ok(),
                data_provider_base_url: std::env::var("DATA_PROVIDER_BASE_URL").ok(),
                data_provider_api_key: std::env::var("DATA_PROVIDER_API_KEY").ok(),
                price_cache_ttl_secs: env_u64("PRICE_CACHE_TTL_SECS", 86_400)?,
                forecast_timeout_secs: env_u64(
                    "FORECAST_TIMEOUT_SECS",
                    crate::forecast::service::DEFAULT_TIMEOUT_SECS,
                )?,
                forecast_max_horizon: env_u64(
                    "FORECAST_MAX_HORIZON",
                    crate::forecast::service::DEFAULT_MAX_HORIZON as u64,
                )? as usize,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_data_provider_base_url(&self) -> anyhow::Result<&str> {
            self.data_provider_base_url
                .as_deref()
                .context("DATA_PROVIDER_BASE_URL is required")
        }
    }

    fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
        match std::env::var(key) {
            Ok(s) => s
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a non-negative integer (got {s:?})")),
            Err(_) => Ok(default),
        }
    }
}
