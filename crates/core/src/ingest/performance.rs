use crate::domain::catalog;
use crate::error::ForecastError;
use crate::ingest::loader::load_price_series;
use crate::ingest::provider::PriceHistoryProvider;
use chrono::{Months, NaiveDate};
use serde::Serialize;

pub const LOOKBACK_MONTHS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerPerformance {
    pub ticker: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub first_close: f64,
    pub last_close: f64,
    /// Percent change from the first to the last close in the window.
    pub pct_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorPerformance {
    pub sector: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub tickers: Vec<TickerPerformance>,
}

/// Trailing-month change for every ticker in `sector`, in catalog order.
/// Tickers that fail to load are logged and skipped.
pub async fn sector_performance(
    provider: &dyn PriceHistoryProvider,
    sector: &str,
    today: NaiveDate,
) -> Result<SectorPerformance, ForecastError> {
    let Some(entry) = catalog::find(sector) else {
        return Err(ForecastError::InvalidRequest(format!(
            "unknown sector {sector:?}"
        )));
    };
    let start = today
        .checked_sub_months(Months::new(LOOKBACK_MONTHS))
        .ok_or_else(|| ForecastError::InvalidRequest(format!("date {today} out of range")))?;

    let mut tickers = Vec::with_capacity(entry.tickers.len());
    for &ticker in entry.tickers {
        let series = match load_price_series(provider, ticker, start, today).await {
            Ok(series) => series,
            Err(err) => {
                tracing::warn!(%ticker, sector = entry.name, error = %err, "skipping ticker");
                continue;
            }
        };

        let closes = series.closes();
        let first_close = closes[0];
        let last_close = closes[closes.len() - 1];
        if first_close <= 0.0 {
            tracing::warn!(%ticker, first_close, "skipping ticker with non-positive close");
            continue;
        }

        tickers.push(TickerPerformance {
            ticker: ticker.to_string(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            first_close,
            last_close,
            pct_change: (last_close - first_close) / first_close * 100.0,
        });
    }

    if tickers.is_empty() {
        return Err(ForecastError::DataUnavailable {
            ticker: entry.name.to_string(),
            start,
            end: today,
        });
    }

    tracing::info!(
        sector = entry.name,
        tickers = tickers.len(),
        %start,
        end = %today,
        "sector performance computed"
    );
    Ok(SectorPerformance {
        sector: entry.name,
        start,
        end: today,
        tickers,
    })
}
