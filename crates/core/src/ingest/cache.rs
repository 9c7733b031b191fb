use crate::domain::price_series::PriceBar;
use crate::ingest::provider::PriceHistoryProvider;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

type CacheKey = (String, NaiveDate, NaiveDate);

#[derive(Debug, Clone)]
struct CachedBars {
    bars: Vec<PriceBar>,
    fetched_at: Instant,
}

/// Time-boxed memoization of provider results keyed by (ticker, start, end).
/// Only non-empty successful fetches are kept.
pub struct CachedPriceProvider {
    inner: Arc<dyn PriceHistoryProvider>,
    ttl: Duration,
    entries: tokio::sync::Mutex<HashMap<CacheKey, CachedBars>>,
}

impl CachedPriceProvider {
    pub fn new(inner: Arc<dyn PriceHistoryProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for CachedPriceProvider {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let key = (ticker.trim().to_ascii_uppercase(), start, end);

        {
            let mut guard = self.entries.lock().await;
            let fresh = guard
                .get(&key)
                .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
                .map(|cached| cached.bars.clone());
            if let Some(bars) = fresh {
                tracing::debug!(%ticker, %start, %end, "price cache hit");
                return Ok(bars);
            }
            guard.remove(&key);
        }

        // Lock is not held across the network call; concurrent misses may both fetch.
        let bars = self.inner.fetch_daily_bars(ticker, start, end).await?;
        if !bars.is_empty() {
            let mut guard = self.entries.lock().await;
            guard.retain(|_, v| v.fetched_at.elapsed() < self.ttl);
            guard.insert(
                key,
                CachedBars {
                    bars: bars.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        bars: Vec<PriceBar>,
    }

    #[async_trait::async_trait]
    impl PriceHistoryProvider for CountingProvider {
        fn provider_name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_daily_bars(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bars.clone())
        }
    }

    fn one_bar() -> Vec<PriceBar> {
        vec![PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }]
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn serves_repeat_requests_from_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            bars: one_bar(),
        });
        let cache = CachedPriceProvider::new(inner.clone(), Duration::from_secs(3600));
        let (start, end) = range();

        cache.fetch_daily_bars("aapl", start, end).await.unwrap();
        let bars = cache.fetch_daily_bars("AAPL", start, end).await.unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.provider_name(), "counting");
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            bars: one_bar(),
        });
        let cache = CachedPriceProvider::new(inner.clone(), Duration::ZERO);
        let (start, end) = range();

        cache.fetch_daily_bars("AAPL", start, end).await.unwrap();
        cache.fetch_daily_bars("AAPL", start, end).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_results_are_not_cached() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            bars: vec![],
        });
        let cache = CachedPriceProvider::new(inner.clone(), Duration::from_secs(3600));
        let (start, end) = range();

        cache.fetch_daily_bars("AAPL", start, end).await.unwrap();
        cache.fetch_daily_bars("AAPL", start, end).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 0);
    }
}
