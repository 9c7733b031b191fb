use crate::domain::price_series::PriceSeries;
use crate::error::ForecastError;
use crate::ingest::provider::PriceHistoryProvider;
use chrono::NaiveDate;

/// Fetches daily bars for `ticker` over the inclusive range `[start, end]`.
pub async fn load_price_series(
    provider: &dyn PriceHistoryProvider,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, ForecastError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(ForecastError::InvalidRequest(
            "ticker must be non-empty".to_string(),
        ));
    }
    if start > end {
        return Err(ForecastError::InvalidRequest(format!(
            "start date {start} is after end date {end}"
        )));
    }

    let mut bars = provider
        .fetch_daily_bars(ticker, start, end)
        .await
        .map_err(|err| {
            tracing::warn!(
                %ticker,
                provider = provider.provider_name(),
                error = %err,
                "price history fetch failed"
            );
            ForecastError::provider(provider.provider_name(), &err)
        })?;

    bars.retain(|b| b.date >= start && b.date <= end);
    if bars.is_empty() {
        return Err(ForecastError::DataUnavailable {
            ticker: ticker.to_string(),
            start,
            end,
        });
    }

    let series = PriceSeries::new(ticker, bars)?;
    tracing::info!(
        %ticker,
        provider = provider.provider_name(),
        bars = series.len(),
        first = %series.first_date(),
        last = %series.last_date(),
        "loaded price history"
    );
    Ok(series)
}
