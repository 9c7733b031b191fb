pub mod arima;
pub mod config;
pub mod lstm;
pub mod scaler;
pub mod sequence;
pub mod service;
pub mod window;

use crate::domain::forecast::{ForecastResult, ModelKind};
use crate::domain::price_series::PriceSeries;
use crate::error::ForecastError;

pub use config::ForecastConfig;

/// A closing-price forecaster. Calls are independent: no fitted state survives a call.
pub trait Forecaster: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn forecast(&self, series: &PriceSeries, horizon: usize)
        -> Result<ForecastResult, ForecastError>;
}

pub fn forecaster_for(kind: ModelKind, config: &ForecastConfig) -> Box<dyn Forecaster> {
    match kind {
        ModelKind::Arima => Box::new(arima::ArimaForecaster::new(config)),
        ModelKind::Lstm => Box::new(sequence::SequenceForecaster::new(config.clone())),
    }
}

pub(crate) fn check_horizon(horizon: usize) -> Result<(), ForecastError> {
    if horizon == 0 {
        return Err(ForecastError::InvalidRequest(
            "horizon must be >= 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forecaster_for_dispatches_on_model_kind() {
        let config = ForecastConfig::default();
        for kind in [ModelKind::Arima, ModelKind::Lstm] {
            assert_eq!(forecaster_for(kind, &config).kind(), kind);
        }
    }

    #[test]
    fn zero_horizon_is_invalid() {
        assert!(matches!(
            check_horizon(0),
            Err(ForecastError::InvalidRequest(_))
        ));
        check_horizon(1).unwrap();
    }
}
