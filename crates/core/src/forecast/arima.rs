use crate::domain::forecast::{ForecastResult, ModelKind};
use crate::domain::price_series::PriceSeries;
use crate::error::ForecastError;
use crate::forecast::config::ForecastConfig;
use crate::forecast::{check_horizon, Forecaster};
use ndarray::{Array1, Array2};

// Relative ridge keeps perfectly collinear lags (e.g. a straight-line series) solvable.
const RIDGE_RELATIVE: f64 = 1e-8;
const RIDGE_FLOOR: f64 = 1e-12;

/// Integrated autoregressive model with fixed orders, fitted by conditional least squares.
#[derive(Debug, Clone)]
pub struct ArimaForecaster {
    ar_order: usize,
    diff_order: usize,
    ma_order: usize,
}

#[derive(Debug, Clone)]
pub struct ArimaFit {
    pub coefficients: Vec<f64>,
    pub sigma2: f64,
    /// Last observed value at each differencing level, level 0 first.
    level_tails: Vec<f64>,
    /// Last `p` values of the fully differenced series, oldest first.
    recent: Vec<f64>,
}

impl ArimaForecaster {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            ar_order: config.ar_order,
            diff_order: config.diff_order,
            ma_order: config.ma_order,
        }
    }

    /// Fewer rows than this would leave the lag regression with no more equations than unknowns.
    pub fn min_observations(&self) -> usize {
        2 * self.ar_order + self.diff_order + 1
    }

    pub fn fit(&self, closes: &[f64]) -> Result<ArimaFit, ForecastError> {
        if self.ma_order != 0 {
            return Err(ForecastError::fit(format!(
                "moving-average terms are not supported (ma_order={})",
                self.ma_order
            )));
        }
        if self.ar_order == 0 {
            return Err(ForecastError::fit("ar_order must be >= 1"));
        }

        let required = self.min_observations();
        if closes.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                available: closes.len(),
            });
        }

        let mut levels = vec![closes.to_vec()];
        for k in 0..self.diff_order {
            let next = difference(&levels[k]);
            levels.push(next);
        }
        let level_tails: Vec<f64> = levels
            .iter()
            .take(self.diff_order)
            .map(|l| l[l.len() - 1])
            .collect();

        let w = &levels[self.diff_order];
        let p = self.ar_order;
        let rows = w.len() - p;

        let mut x = Array2::<f64>::zeros((rows, p));
        let mut y = Array1::<f64>::zeros(rows);
        for r in 0..rows {
            for j in 0..p {
                x[[r, j]] = w[r + p - 1 - j];
            }
            y[r] = w[r + p];
        }

        let mut xtx = x.t().dot(&x);
        let xty = x.t().dot(&y);
        let ridge = RIDGE_RELATIVE * xtx.diag().sum() / p as f64 + RIDGE_FLOOR;
        for j in 0..p {
            xtx[[j, j]] += ridge;
        }

        let phi = solve(xtx, xty)?;
        if phi.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::fit("non-finite AR coefficients"));
        }

        let residuals = &y - &x.dot(&phi);
        let sigma2 = residuals.mapv(|r| r * r).sum() / rows as f64;

        tracing::debug!(
            ar_order = p,
            diff_order = self.diff_order,
            observations = closes.len(),
            coefficients = ?phi.as_slice(),
            sigma2,
            "ARIMA fitted"
        );

        Ok(ArimaFit {
            coefficients: phi.to_vec(),
            sigma2,
            level_tails,
            recent: w[w.len() - p..].to_vec(),
        })
    }
}

impl ArimaFit {
    /// Recursive AR extrapolation of the differenced series, integrated back to price level.
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        let p = self.coefficients.len();
        let mut history = self.recent.clone();
        let mut diffs = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let n = history.len();
            let next: f64 = self
                .coefficients
                .iter()
                .enumerate()
                .map(|(j, phi)| phi * history[n - 1 - j])
                .sum();
            history.push(next);
            diffs.push(next);
        }
        debug_assert!(history.len() >= p);

        let mut out = diffs;
        for tail in self.level_tails.iter().rev() {
            let mut last = *tail;
            for v in out.iter_mut() {
                last += *v;
                *v = last;
            }
        }
        out
    }
}

impl Forecaster for ArimaForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Arima
    }

    fn forecast(
        &self,
        series: &PriceSeries,
        horizon: usize,
    ) -> Result<ForecastResult, ForecastError> {
        check_horizon(horizon)?;
        let fit = self.fit(&series.closes())?;
        let values = fit.forecast(horizon);
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::fit("ARIMA forecast diverged to non-finite values"));
        }

        Ok(ForecastResult {
            model: ModelKind::Arima,
            values,
        })
    }
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, ForecastError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < f64::MIN_POSITIVE {
            return Err(ForecastError::fit("singular normal equations"));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}
