use crate::domain::forecast::{ForecastResult, ModelKind};
use crate::domain::price_series::PriceSeries;
use crate::error::ForecastError;
use crate::forecast::config::ForecastConfig;
use crate::forecast::lstm::SequenceModel;
use crate::forecast::scaler::MinMaxScaler;
use crate::forecast::window::build_training_windows;
use crate::forecast::{check_horizon, Forecaster};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Recurrent-network forecaster. Every call normalizes, trains and predicts from scratch.
#[derive(Debug, Clone)]
pub struct SequenceForecaster {
    config: ForecastConfig,
}

impl SequenceForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl Forecaster for SequenceForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Lstm
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: usize,
    ) -> Result<ForecastResult, ForecastError> {
        check_horizon(horizon)?;
        self.config.validate()?;

        let window = self.config.window_size;
        let closes = series.closes();
        if closes.len() < window + 1 {
            return Err(ForecastError::InsufficientData {
                required: window + 1,
                available: closes.len(),
            });
        }

        let scaler = MinMaxScaler::fit(&closes)?;
        let scaled = scaler.transform_all(&closes);
        let examples = build_training_windows(&scaled, window)?;

        let mut rng = self.rng();
        let mut model = SequenceModel::new(&self.config.layer_widths, &mut rng);
        let losses = model.train(
            &examples,
            self.config.epochs,
            self.config.batch_size,
            self.config.learning_rate,
            &mut rng,
        )?;
        tracing::info!(
            ticker = series.ticker(),
            examples = examples.len(),
            final_loss = losses.last().copied().unwrap_or(f64::NAN),
            seeded = self.config.seed.is_some(),
            "sequence model trained"
        );

        let tail = &scaled[scaled.len() - window..];
        let predictions = roll_forward(tail, horizon, |w| model.predict(w))?;
        tracing::debug!(
            ticker = series.ticker(),
            horizon,
            scale_min = scaler.min(),
            scale_max = scaler.max(),
            "sequence forecast rolled forward"
        );

        Ok(ForecastResult {
            model: ModelKind::Lstm,
            values: scaler.inverse_all(&predictions),
        })
    }
}

/// Predicts `horizon` steps from `tail`. Each prediction is pushed as the newest input and
/// the oldest value dropped, so step `k` sees `k - 1` predicted values.
pub(crate) fn roll_forward(
    tail: &[f64],
    horizon: usize,
    mut predict: impl FnMut(&[f64]) -> f64,
) -> Result<Vec<f64>, ForecastError> {
    let mut buffer: VecDeque<f64> = tail.iter().copied().collect();
    let mut predictions = Vec::with_capacity(horizon);
    for step in 0..horizon {
        let next = predict(buffer.make_contiguous());
        if !next.is_finite() {
            return Err(ForecastError::fit(format!(
                "non-finite prediction at forecast step {}",
                step + 1
            )));
        }
        predictions.push(next);
        buffer.pop_front();
        buffer.push_back(next);
    }
    Ok(predictions)
}
