use crate::error::ForecastError;

/// Min/max affine map to [0, 1], learned from one series and discarded with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::fit("cannot normalize an empty series"));
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if !(min.is_finite() && max.is_finite()) {
            return Err(ForecastError::fit("series contains non-finite values"));
        }
        if max == min {
            return Err(ForecastError::fit(format!(
                "constant series (every close is {min}) cannot be normalized"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn transform(&self, x: f64) -> f64 {
        (x - self.min) / (self.max - self.min)
    }

    pub fn inverse(&self, y: f64) -> f64 {
        y * (self.max - self.min) + self.min
    }

    pub fn transform_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.transform(x)).collect()
    }

    pub fn inverse_all(&self, ys: &[f64]) -> Vec<f64> {
        ys.iter().map(|&y| self.inverse(y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extremes_to_unit_interval() {
        let s = MinMaxScaler::fit(&[5.0, 10.0, 7.5]).unwrap();
        assert_eq!(s.transform_all(&[5.0, 10.0, 7.5]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn round_trips_every_value() {
        let xs: Vec<f64> = (0..200)
            .map(|i| 123.456 + (i as f64 * 0.731).sin() * 17.3)
            .collect();
        let s = MinMaxScaler::fit(&xs).unwrap();
        for &x in &xs {
            let back = s.inverse(s.transform(x));
            assert!((back - x).abs() <= 1e-9 * x.abs().max(1.0), "{x} -> {back}");
        }
    }

    #[test]
    fn constant_series_is_a_fit_error() {
        let err = MinMaxScaler::fit(&[3.0, 3.0, 3.0]).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFitError(_)));
    }
}
