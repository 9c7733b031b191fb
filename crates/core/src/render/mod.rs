pub mod chart;

pub use chart::{render_forecast, ForecastChart};
