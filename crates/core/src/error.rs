use std::fmt;

/// Terminal failure of a single forecast request. Nothing is retried at this level.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastError {
    InvalidRequest(String),
    DataUnavailable {
        ticker: String,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    ProviderError {
        provider: &'static str,
        detail: String,
    },
    InsufficientData {
        required: usize,
        available: usize,
    },
    ModelFitError(String),
}

impl ForecastError {
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InvalidRequest(_) => "invalid_request",
            ForecastError::DataUnavailable { .. } => "data_unavailable",
            ForecastError::ProviderError { .. } => "provider_error",
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::ModelFitError(_) => "model_fit_error",
        }
    }

    pub(crate) fn provider(provider: &'static str, err: &anyhow::Error) -> Self {
        ForecastError::ProviderError {
            provider,
            detail: format!("{err:#}"),
        }
    }

    pub(crate) fn fit(detail: impl Into<String>) -> Self {
        ForecastError::ModelFitError(detail.into())
    }
}

impl fmt::Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastError::InvalidRequest(detail) => write!(f, "invalid request: {detail}"),
            ForecastError::DataUnavailable { ticker, start, end } => write!(
                f,
                "no data found for ticker {ticker} between {start} and {end}"
            ),
            ForecastError::ProviderError { provider, detail } => {
                write!(f, "price provider error (provider={provider}): {detail}")
            }
            ForecastError::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "insufficient data: need at least {required} observations, got {available}"
            ),
            ForecastError::ModelFitError(detail) => write!(f, "model fit failed: {detail}"),
        }
    }
}

impl std::error::Error for ForecastError {}
