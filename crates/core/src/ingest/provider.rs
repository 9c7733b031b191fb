use crate::config::Settings;
use crate::domain::price_series::PriceBar;
use crate::ingest::types::{DailyBarItem, DailyBarsResponse};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_PATH: &str = "/v1/daily_bars";

/// Symbol + inclusive date range -> daily bars. An empty vec means the provider had nothing.
#[async_trait::async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonPriceProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

impl HttpJsonPriceProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_data_provider_base_url()?.to_string();
        let api_key = settings.data_provider_api_key.clone();

        let path = std::env::var("DATA_PROVIDER_BARS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = build_http_client(provider_timeout_secs())
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries: provider_retries(),
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for HttpJsonPriceProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let url = self.url();
        let headers = self.headers()?;
        let query = [
            ("ticker", ticker.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
        ];

        let (status, text) = get_text_with_retries(
            || {
                self.http
                    .get(url.as_str())
                    .headers(headers.clone())
                    .query(&query)
            },
            self.retries,
            ticker,
        )
        .await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            anyhow::bail!("data provider HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<DailyBarsResponse>(&text)
            .with_context(|| format!("failed to parse provider response into DailyBarsResponse: {text}"))?;
        validate_response(&parsed, ticker)?;

        Ok(parsed.bars.into_iter().map(PriceBar::from).collect())
    }
}

impl From<DailyBarItem> for PriceBar {
    fn from(item: DailyBarItem) -> Self {
        PriceBar {
            date: item.date,
            open: item.open,
            high: item.high,
            low: item.low,
            close: item.close,
            volume: item.volume,
        }
    }
}

fn validate_response(resp: &DailyBarsResponse, expected: &str) -> Result<()> {
    anyhow::ensure!(
        resp.ticker.trim().eq_ignore_ascii_case(expected.trim()),
        "provider ticker mismatch: expected {expected}, got {}",
        resp.ticker
    );
    for bar in &resp.bars {
        anyhow::ensure!(
            bar.close.is_finite() && bar.close > 0.0,
            "close must be a positive number (date={}, close={})",
            bar.date,
            bar.close
        );
    }
    Ok(())
}

pub(crate) fn provider_timeout_secs() -> u64 {
    std::env::var("DATA_PROVIDER_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

pub(crate) fn provider_retries() -> u32 {
    std::env::var("DATA_PROVIDER_RETRIES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_RETRIES)
        .max(1)
}

pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("stockcast/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Sends the request built by `build` until it yields a non-retryable response.
/// Transport errors, 429 and 5xx are retried with exponential backoff.
pub(crate) async fn get_text_with_retries<F>(
    build: F,
    max_attempts: u32,
    ticker: &str,
) -> Result<(StatusCode, String)>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let res = match build().send().await {
            Ok(r) => r,
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err).context("price request failed");
                }
                let backoff = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(attempt, ?backoff, %ticker, error = %err, "price request failed; retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }
        };

        let status = res.status();
        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if retryable && attempt < max_attempts {
            let backoff = Duration::from_secs(1 << (attempt - 1));
            tracing::warn!(
                attempt,
                ?backoff,
                %ticker,
                http_status = %status,
                "price provider HTTP error; retrying"
            );
            tokio::time::sleep(backoff).await;
            continue;
        }

        let text = res
            .text()
            .await
            .context("failed to read provider response")?;
        return Ok((status, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_expected_shape() {
        let v = json!({
            "ticker": "AAPL",
            "bars": [
                {"date": "2026-03-02", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 100.0},
                {"date": "2026-03-03", "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0}
            ]
        });

        let parsed: DailyBarsResponse = serde_json::from_value(v).unwrap();
        validate_response(&parsed, "aapl").unwrap();
        assert_eq!(parsed.bars.len(), 2);
        assert_eq!(parsed.bars[1].volume, 0.0);

        let bar = PriceBar::from(parsed.bars[0].clone());
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(bar.close, 1.5);
    }

    #[test]
    fn rejects_ticker_mismatch() {
        let parsed = DailyBarsResponse {
            ticker: "MSFT".to_string(),
            bars: vec![],
        };
        assert!(validate_response(&parsed, "AAPL").is_err());
    }

    #[test]
    fn rejects_non_positive_close() {
        let v = json!({
            "ticker": "AAPL",
            "bars": [{"date": "2026-03-02", "open": 1.0, "high": 1.0, "low": 1.0, "close": 0.0}]
        });
        let parsed: DailyBarsResponse = serde_json::from_value(v).unwrap();
        assert!(validate_response(&parsed, "AAPL").is_err());
    }

    #[test]
    fn rejects_non_numeric_close_via_deserialize() {
        let v = json!({
            "ticker": "AAPL",
            "bars": [{"date": "2026-03-02", "open": 1.0, "high": 1.0, "low": 1.0, "close": "1.0"}]
        });
        assert!(serde_json::from_value::<DailyBarsResponse>(v).is_err());
    }
}
