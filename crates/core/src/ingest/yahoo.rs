use crate::config::Settings;
use crate::domain::price_series::PriceBar;
use crate::ingest::provider::{
    build_http_client, get_text_with_retries, provider_retries, provider_timeout_secs,
    PriceHistoryProvider,
};
use crate::ingest::types::{YahooChartEnvelope, YahooChartResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .yahoo_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http = build_http_client(provider_timeout_secs())
            .context("failed to build Yahoo http client")?;

        Ok(Self {
            http,
            base_url,
            retries: provider_retries(),
        })
    }

    fn chart_url(&self, ticker: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid Yahoo base url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Yahoo base url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(ticker)?;
        let (period1, period2) = period_bounds(start, end)?;
        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];

        let (status, text) = get_text_with_retries(
            || self.http.get(url.clone()).query(&query),
            self.retries,
            ticker,
        )
        .await?;

        // Unknown symbols come back as 404 with a chart.error body.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("Yahoo chart HTTP {status}: {text}");
        }

        let bars = parse_chart_response(&text)?;
        tracing::debug!(%ticker, %start, %end, bars = bars.len(), "Yahoo chart fetched");
        Ok(bars)
    }
}

/// Unix seconds for `start` and for the day after `end`, so the range is inclusive.
fn period_bounds(start: NaiveDate, end: NaiveDate) -> Result<(i64, i64)> {
    let after_end = end
        .checked_add_days(Days::new(1))
        .context("end date out of range")?;
    let to_ts = |d: NaiveDate| {
        d.and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .context("invalid date")
    };
    Ok((to_ts(start)?, to_ts(after_end)?))
}

pub(crate) fn parse_chart_response(text: &str) -> Result<Vec<PriceBar>> {
    let envelope = serde_json::from_str::<YahooChartEnvelope>(text)
        .with_context(|| format!("Yahoo chart response is not valid JSON: {text}"))?;

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(Vec::new());
        }
        anyhow::bail!("Yahoo chart error {}: {}", err.code, err.description);
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    bars_from_result(&result)
}

fn bars_from_result(result: &YahooChartResult) -> Result<Vec<PriceBar>> {
    let Some(quote) = result.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(result.timestamp.len());
    for (idx, ts) in result.timestamp.iter().enumerate() {
        let at = |v: &Vec<Option<f64>>| v.get(idx).copied().flatten();

        // Rows without a close are holidays or halted sessions.
        let Some(close) = at(&quote.close) else {
            continue;
        };

        let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .with_context(|| format!("invalid Yahoo timestamp {ts}"))?
            .date_naive();

        out.push(PriceBar {
            date,
            open: at(&quote.open).unwrap_or(close),
            high: at(&quote.high).unwrap_or(close),
            low: at(&quote.low).unwrap_or(close),
            close,
            volume: at(&quote.volume).unwrap_or(0.0),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_chart_and_skips_null_rows() {
        // Sessions opening 14:30 UTC on 2026-03-02..04, reported with a US/Eastern offset.
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "AAPL", "gmtoffset": -18000},
                    "timestamp": [1772461800, 1772548200, 1772634600],
                    "indicators": {"quote": [{
                        "open": [10.0, null, 12.0],
                        "high": [11.0, null, 13.0],
                        "low": [9.0, null, 11.5],
                        "close": [10.5, null, 12.5],
                        "volume": [1000, null, null]
                    }]}
                }],
                "error": null
            }
        })
        .to_string();

        let bars = parse_chart_response(&body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(bars[0].volume, 1000.0);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(bars[1].close, 12.5);
        assert_eq!(bars[1].volume, 0.0);
    }

    #[test]
    fn not_found_is_empty_not_error() {
        let body = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        })
        .to_string();
        assert!(parse_chart_response(&body).unwrap().is_empty());
    }

    #[test]
    fn other_chart_errors_fail() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Bad Request", "description": "Invalid input"}}
        })
        .to_string();
        assert!(parse_chart_response(&body).is_err());
    }

    #[test]
    fn period_end_is_exclusive_next_day() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let (p1, p2) = period_bounds(start, end).unwrap();
        assert_eq!(p2 - p1, 2 * 86_400);
    }

    #[test]
    fn chart_url_appends_symbol_segment() {
        let provider = YahooChartProvider {
            http: reqwest::Client::new(),
            base_url: "https://example.test/".to_string(),
            retries: 1,
        };
        let url = provider.chart_url("BRK-B").unwrap();
        assert_eq!(url.as_str(), "https://example.test/v8/finance/chart/BRK-B");
    }
}
