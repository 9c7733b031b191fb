use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBarsResponse {
    pub ticker: String,
    pub bars: Vec<DailyBarItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBarItem {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

// Yahoo chart API (v8). Quote arrays are parallel to `timestamp` and may hold nulls
// for days the exchange reported nothing.

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChartEnvelope {
    pub chart: YahooChart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    pub error: Option<YahooChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChartError {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooChartResult {
    #[serde(default)]
    pub meta: YahooChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: YahooIndicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YahooChartMeta {
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YahooQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}
