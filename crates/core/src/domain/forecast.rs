use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Arima,
    Lstm,
}

impl ModelKind {
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Lstm => "LSTM",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arima" => Ok(ModelKind::Arima),
            "lstm" => Ok(ModelKind::Lstm),
            other => Err(format!("unknown model {other:?} (expected arima or lstm)")),
        }
    }
}

/// Predicted closes, one per calendar day after the last observed date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub model: ModelKind,
    pub values: Vec<f64>,
}

impl ForecastResult {
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// D+1..=D+H. Weekends and holidays are not skipped.
    pub fn dates(&self, last_observed: NaiveDate) -> Vec<NaiveDate> {
        (1..=self.values.len() as u64)
            .filter_map(|k| last_observed.checked_add_days(Days::new(k)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_kind_case_insensitively() {
        assert_eq!("ARIMA".parse::<ModelKind>().unwrap(), ModelKind::Arima);
        assert_eq!(" lstm ".parse::<ModelKind>().unwrap(), ModelKind::Lstm);
        assert!("prophet".parse::<ModelKind>().is_err());
    }

    #[test]
    fn dates_run_over_weekends() {
        // 2026-01-02 is a Friday.
        let last = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let f = ForecastResult {
            model: ModelKind::Arima,
            values: vec![1.0, 2.0, 3.0],
        };
        assert_eq!(
            f.dates(last),
            vec![
                NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 4).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            ]
        );
    }
}
