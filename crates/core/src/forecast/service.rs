use crate::config::Settings;
use crate::domain::forecast::{ForecastResult, ModelKind};
use crate::error::ForecastError;
use crate::forecast::{forecaster_for, ForecastConfig};
use crate::ingest::{
    load_price_series, sector_performance, PriceHistoryProvider, SectorPerformance,
};
use crate::render::{render_forecast, ForecastChart};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_HORIZON: usize = 60;

#[derive(Debug, Clone)]
pub struct ForecastRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub model: ModelKind,
    pub horizon: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutcome {
    pub ticker: String,
    pub model: ModelKind,
    pub observations: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub forecast: ForecastResult,
    pub chart: ForecastChart,
}

/// Load -> forecast -> render for one request. Forecasting runs on a blocking thread and is
/// bounded by `timeout`; an expired forecast is abandoned, not cancelled.
pub struct ForecastService {
    provider: Arc<dyn PriceHistoryProvider>,
    config: ForecastConfig,
    timeout: Duration,
    max_horizon: usize,
}

impl ForecastService {
    pub fn new(provider: Arc<dyn PriceHistoryProvider>, config: ForecastConfig) -> Self {
        Self {
            provider,
            config,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_horizon: DEFAULT_MAX_HORIZON,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        provider: Arc<dyn PriceHistoryProvider>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(provider, ForecastConfig::from_env()?)
            .with_timeout(Duration::from_secs(settings.forecast_timeout_secs))
            .with_max_horizon(settings.forecast_max_horizon))
    }

    pub fn with_config(mut self, config: ForecastConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_horizon(mut self, max_horizon: usize) -> Self {
        self.max_horizon = max_horizon;
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn max_horizon(&self) -> usize {
        self.max_horizon
    }

    /// Trailing-month performance of a catalog sector, from the same provider forecasts use.
    pub async fn sector_performance(
        &self,
        sector: &str,
        today: NaiveDate,
    ) -> Result<SectorPerformance, ForecastError> {
        sector_performance(self.provider.as_ref(), sector, today).await
    }

    pub async fn run(&self, req: ForecastRequest) -> Result<ForecastOutcome, ForecastError> {
        if req.horizon == 0 || req.horizon > self.max_horizon {
            return Err(ForecastError::InvalidRequest(format!(
                "horizon must be 1..={} (got {})",
                self.max_horizon, req.horizon
            )));
        }

        let series =
            load_price_series(self.provider.as_ref(), &req.ticker, req.start, req.end).await?;

        let forecaster = forecaster_for(req.model, &self.config);
        let kind = forecaster.kind();
        let horizon = req.horizon;
        let t0 = Instant::now();
        let task = tokio::task::spawn_blocking(move || {
            let res = forecaster.forecast(&series, horizon);
            (series, res)
        });

        let (series, forecast) = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok((series, res))) => (series, res?),
            Ok(Err(join_err)) => {
                return Err(ForecastError::fit(format!(
                    "forecast task failed: {join_err}"
                )))
            }
            Err(_) => {
                tracing::warn!(
                    ticker = %req.ticker,
                    model = %kind,
                    timeout = ?self.timeout,
                    "forecast timed out"
                );
                return Err(ForecastError::fit(format!(
                    "forecast did not finish within {:?}",
                    self.timeout
                )));
            }
        };

        tracing::info!(
            ticker = series.ticker(),
            model = %kind,
            horizon = forecast.horizon(),
            observations = series.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "forecast complete"
        );

        let chart = render_forecast(&series, &forecast, kind.label())?;
        Ok(ForecastOutcome {
            ticker: series.ticker().to_string(),
            model: kind,
            observations: series.len(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            forecast,
            chart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PriceBar;
    use chrono::Days;

    struct LinearProvider {
        days: u64,
    }

    #[async_trait::async_trait]
    impl PriceHistoryProvider for LinearProvider {
        fn provider_name(&self) -> &'static str {
            "linear"
        }

        async fn fetch_daily_bars(
            &self,
            _ticker: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> anyhow::Result<Vec<PriceBar>> {
            Ok((0..self.days)
                .map(|i| {
                    let close = 100.0 + i as f64;
                    PriceBar {
                        date: start.checked_add_days(Days::new(i)).unwrap(),
                        open: close,
                        high: close,
                        low: close,
                        close,
                        volume: 1_000.0,
                    }
                })
                .collect())
        }
    }

    fn request(model: ModelKind, horizon: usize) -> ForecastRequest {
        ForecastRequest {
            ticker: "AAPL".to_string(),
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            model,
            horizon,
        }
    }

    #[tokio::test]
    async fn arima_end_to_end() {
        let service = ForecastService::new(
            Arc::new(LinearProvider { days: 120 }),
            ForecastConfig::default(),
        );
        let out = service.run(request(ModelKind::Arima, 5)).await.unwrap();

        assert_eq!(out.observations, 120);
        assert_eq!(out.forecast.values.len(), 5);
        for (k, v) in out.forecast.values.iter().enumerate() {
            let expected = 220.0 + k as f64;
            assert!((v - expected).abs() < 1e-3, "step {k}: {v} vs {expected}");
        }
        assert_eq!(out.chart.forecast.points.len(), 5);
        assert_eq!(
            out.chart.forecast.points[0].date,
            out.last_date.checked_add_days(Days::new(1)).unwrap()
        );
    }

    #[tokio::test]
    async fn horizon_outside_limits_is_rejected() {
        let service = ForecastService::new(
            Arc::new(LinearProvider { days: 120 }),
            ForecastConfig::default(),
        )
        .with_max_horizon(60);

        for h in [0, 61] {
            let err = service.run(request(ModelKind::Arima, h)).await.unwrap_err();
            assert!(matches!(err, ForecastError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn short_history_propagates_insufficient_data() {
        let service = ForecastService::new(
            Arc::new(LinearProvider { days: 30 }),
            ForecastConfig::default(),
        );
        let err = service.run(request(ModelKind::Lstm, 5)).await.unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_fit_error() {
        let config = ForecastConfig {
            window_size: 10,
            layer_widths: vec![8, 8],
            epochs: 50,
            batch_size: 8,
            ..ForecastConfig::default()
        }
        .with_seed(1);
        let service = ForecastService::new(Arc::new(LinearProvider { days: 120 }), config)
            .with_timeout(Duration::from_millis(1));

        let err = service.run(request(ModelKind::Lstm, 5)).await.unwrap_err();
        assert!(matches!(err, ForecastError::ModelFitError(_)));
    }

    #[tokio::test]
    async fn sector_performance_uses_service_provider() {
        let service = ForecastService::new(
            Arc::new(LinearProvider { days: 120 }),
            ForecastConfig::default(),
        );
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let perf = service.sector_performance("Energy", today).await.unwrap();

        assert_eq!(perf.tickers.len(), 5);
        for t in &perf.tickers {
            assert_eq!(t.first_close, 100.0);
            assert_eq!(t.last_date, today);
            assert!(t.pct_change > 0.0);
        }
    }
}
