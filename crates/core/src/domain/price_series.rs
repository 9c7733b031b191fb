use crate::error::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily bars for one ticker, ascending by date with no duplicate dates. Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Sorts by date and keeps the last bar seen for a repeated date.
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, ForecastError> {
        let ticker = ticker.into().trim().to_string();
        if ticker.is_empty() {
            return Err(ForecastError::InvalidRequest(
                "ticker must be non-empty".to_string(),
            ));
        }

        let mut by_date = BTreeMap::<NaiveDate, PriceBar>::new();
        for bar in bars {
            if !bar.close.is_finite() {
                return Err(ForecastError::InvalidRequest(format!(
                    "non-finite close for {ticker} on {}",
                    bar.date
                )));
            }
            by_date.insert(bar.date, bar);
        }

        if by_date.is_empty() {
            return Err(ForecastError::InvalidRequest(format!(
                "price series for {ticker} is empty"
            )));
        }

        Ok(Self {
            ticker,
            bars: by_date.into_values().collect(),
        })
    }

    /// Convenience for synthetic series: one bar per calendar day starting at `start`.
    pub fn from_closes(
        ticker: impl Into<String>,
        start: NaiveDate,
        closes: &[f64],
    ) -> Result<Self, ForecastError> {
        let bars = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| PriceBar {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect();
        Self::new(ticker, bars)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn sorts_and_deduplicates_dates() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let s = PriceSeries::new(
            "AAPL",
            vec![bar(d2, 11.0), bar(d1, 10.0), bar(d2, 12.0)],
        )
        .unwrap();

        assert_eq!(s.len(), 2);
        assert_eq!(s.first_date(), d1);
        assert_eq!(s.last_date(), d2);
        assert_eq!(s.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn rejects_empty_and_blank_ticker() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(PriceSeries::new("AAPL", vec![]).is_err());
        assert!(PriceSeries::new("  ", vec![bar(d, 1.0)]).is_err());
    }

    #[test]
    fn rejects_non_finite_close() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let res = PriceSeries::new("AAPL", vec![bar(d, f64::NAN)]);
        assert!(matches!(res, Err(ForecastError::InvalidRequest(_))));
    }

    #[test]
    fn from_closes_uses_consecutive_days() {
        let start = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();
        let s = PriceSeries::from_closes("X", start, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.last_date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }
}
