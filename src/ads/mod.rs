//! Google Ads keyword planning: historical-metrics forecasts and keyword ideas.

pub mod client;
pub mod forecast;
pub mod scheduler;

pub use client::{
    AdsClient, AdsSettings, HistoricalMetricsSource, IdeaSeed, KeywordMetrics, StaticTokenProvider,
    TokenProvider,
};
pub use forecast::{get_metric_forecast, metrics_to_csv, ForecastOptions};
pub use scheduler::ForecastScheduler;
