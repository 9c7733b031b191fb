use crate::error::ForecastError;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingWindow {
    pub inputs: Vec<f64>,
    pub label: f64,
}

/// One example per index `i` in `[size, len)`: inputs `[i - size, i)`, label `i`. Stride 1.
pub fn build_training_windows(
    values: &[f64],
    size: usize,
) -> Result<Vec<TrainingWindow>, ForecastError> {
    let required = size + 1;
    if size == 0 || values.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            available: values.len(),
        });
    }

    Ok((size..values.len())
        .map(|i| TrainingWindow {
            inputs: values[i - size..i].to_vec(),
            label: values[i],
        })
        .collect())
}
