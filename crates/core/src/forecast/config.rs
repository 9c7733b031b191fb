use crate::error::ForecastError;
use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Autoregressive lags.
    pub ar_order: usize,

    /// Differencing passes applied before the AR fit.
    pub diff_order: usize,

    /// Moving-average terms. Only 0 is supported.
    pub ma_order: usize,

    /// Trailing observations fed to the recurrent model per prediction.
    pub window_size: usize,

    /// Hidden width of each stacked recurrent layer, input side first.
    pub layer_widths: Vec<usize>,

    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,

    /// Seed for weight init and shuffling. `None` draws from OS entropy, so runs differ.
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            ar_order: 5,
            diff_order: 1,
            ma_order: 0,
            window_size: 60,
            layer_widths: vec![50, 50],
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

impl ForecastConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies `FORECAST_*` overrides from `lookup` on top of the defaults. Malformed values
    /// are errors, and the result must pass `validate`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(n) = parse_var(&lookup, "FORECAST_AR_ORDER")? {
            out.ar_order = n;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_DIFF_ORDER")? {
            out.diff_order = n;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_WINDOW_SIZE")? {
            out.window_size = n;
        }
        if let Some(s) = lookup("FORECAST_LAYER_WIDTHS") {
            out.layer_widths = s
                .split(',')
                .map(|p| p.trim().parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| {
                    format!("FORECAST_LAYER_WIDTHS must be comma-separated integers (got {s:?})")
                })?;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_EPOCHS")? {
            out.epochs = n;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_BATCH_SIZE")? {
            out.batch_size = n;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_LEARNING_RATE")? {
            out.learning_rate = n;
        }
        if let Some(n) = parse_var(&lookup, "FORECAST_SEED")? {
            out.seed = Some(n);
        }

        out.validate().context("invalid forecast configuration")?;
        Ok(out)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let invalid = |msg: String| Err(ForecastError::InvalidRequest(msg));

        if self.ar_order == 0 {
            return invalid("ar_order must be >= 1".to_string());
        }
        if self.window_size == 0 {
            return invalid("window_size must be >= 1".to_string());
        }
        if self.layer_widths.is_empty() || self.layer_widths.contains(&0) {
            return invalid(format!(
                "layer_widths must be non-empty and positive (got {:?})",
                self.layer_widths
            ));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return invalid(format!(
                "epochs and batch_size must be >= 1 (got {} and {})",
                self.epochs, self.batch_size
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be positive (got {})",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} is malformed (got {s:?})")),
        None => Ok(None),
    }
}
