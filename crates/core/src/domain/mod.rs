pub mod catalog;
pub mod forecast;
pub mod price_series;
