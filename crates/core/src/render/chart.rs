use crate::domain::forecast::ForecastResult;
use crate::domain::price_series::PriceSeries;
use crate::error::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub label: String,
    pub style: LineStyle,
    pub points: Vec<ChartPoint>,
}

/// Display-agnostic chart: historical closes overlaid with a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub grid: bool,
    pub historical: ChartSeries,
    pub forecast: ChartSeries,
}

pub fn render_forecast(
    series: &PriceSeries,
    forecast: &ForecastResult,
    label: &str,
) -> Result<ForecastChart, ForecastError> {
    if series.is_empty() {
        return Err(ForecastError::InvalidRequest(
            "cannot render an empty price series".to_string(),
        ));
    }
    if forecast.values.is_empty() {
        return Err(ForecastError::InvalidRequest(
            "cannot render an empty forecast".to_string(),
        ));
    }
    if forecast.values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidRequest(
            "forecast contains non-finite values".to_string(),
        ));
    }

    let dates = forecast.dates(series.last_date());
    if dates.len() != forecast.values.len() {
        return Err(ForecastError::InvalidRequest(format!(
            "forecast of {} steps runs past the representable date range",
            forecast.values.len()
        )));
    }

    let historical = ChartSeries {
        label: "Historical Prices".to_string(),
        style: LineStyle::Solid,
        points: series
            .bars()
            .iter()
            .map(|b| ChartPoint {
                date: b.date,
                value: b.close,
            })
            .collect(),
    };

    let forecast = ChartSeries {
        label: format!("{label} Forecast"),
        style: LineStyle::Dashed,
        points: dates
            .into_iter()
            .zip(forecast.values.iter().copied())
            .map(|(date, value)| ChartPoint { date, value })
            .collect(),
    };

    Ok(ForecastChart {
        title: format!("{label} Stock Price Prediction"),
        x_label: "Date".to_string(),
        y_label: "Price".to_string(),
        grid: true,
        historical,
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::ModelKind;
    use chrono::Days;

    fn history() -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        PriceSeries::from_closes("AAPL", start, &[10.0, 11.0, 12.0]).unwrap()
    }

    #[test]
    fn forecast_axis_starts_the_day_after_history() {
        let s = history();
        let f = ForecastResult {
            model: ModelKind::Lstm,
            values: vec![13.0, 14.0, 15.0, 16.0],
        };
        let chart = render_forecast(&s, &f, "LSTM").unwrap();

        let last = s.last_date();
        let dates: Vec<NaiveDate> = chart.forecast.points.iter().map(|p| p.date).collect();
        let expected: Vec<NaiveDate> = (1..=4)
            .map(|k| last.checked_add_days(Days::new(k)).unwrap())
            .collect();
        assert_eq!(dates, expected);
        assert_eq!(chart.historical.points.len(), 3);
        assert_eq!(chart.forecast.label, "LSTM Forecast");
        assert_eq!(chart.forecast.style, LineStyle::Dashed);
        assert_eq!(chart.title, "LSTM Stock Price Prediction");
    }

    #[test]
    fn rejects_empty_forecast() {
        let f = ForecastResult {
            model: ModelKind::Arima,
            values: vec![],
        };
        assert!(matches!(
            render_forecast(&history(), &f, "ARIMA"),
            Err(ForecastError::InvalidRequest(_))
        ));
    }

    #[test]
    fn serializes_for_display_layer() {
        let f = ForecastResult {
            model: ModelKind::Arima,
            values: vec![13.0],
        };
        let chart = render_forecast(&history(), &f, "ARIMA").unwrap();
        let v = serde_json::to_value(&chart).unwrap();
        assert_eq!(v["forecast"]["style"], "dashed");
        assert_eq!(v["forecast"]["points"][0]["date"], "2026-02-23");
        assert_eq!(v["x_label"], "Date");
    }
}
