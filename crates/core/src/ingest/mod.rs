pub mod cache;
pub mod loader;
pub mod performance;
pub mod provider;
pub mod types;
pub mod yahoo;

use crate::config::Settings;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub use loader::load_price_series;
pub use performance::{sector_performance, SectorPerformance};
pub use provider::PriceHistoryProvider;

/// Builds the configured provider, wrapped in the TTL cache unless the TTL is zero.
pub fn provider_from_settings(settings: &Settings) -> Result<Arc<dyn PriceHistoryProvider>> {
    let inner: Arc<dyn PriceHistoryProvider> = match settings.price_provider.as_str() {
        "yahoo" => Arc::new(yahoo::YahooChartProvider::from_settings(settings)?),
        "http_json" => Arc::new(provider::HttpJsonPriceProvider::from_settings(settings)?),
        other => anyhow::bail!("unknown PRICE_PROVIDER {other:?} (expected yahoo or http_json)"),
    };

    tracing::info!(
        provider = inner.provider_name(),
        cache_ttl_secs = settings.price_cache_ttl_secs,
        "price provider configured"
    );

    if settings.price_cache_ttl_secs == 0 {
        return Ok(inner);
    }
    Ok(Arc::new(cache::CachedPriceProvider::new(
        inner,
        Duration::from_secs(settings.price_cache_ttl_secs),
    )))
}
