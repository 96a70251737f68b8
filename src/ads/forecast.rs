//! Historical-metrics forecast over arbitrarily long keyword lists.
//!
//! Keywords are split into chunks of 1,000 (the API maximum per call). Each
//! chunk is fetched under a [`ForecastScheduler`] permit; a chunk that fails
//! degrades to placeholder metrics instead of failing the whole forecast.
//! The result keeps chunk order, and every input keyword appears at least
//! once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ads::client::{HistoricalMetricsSource, KeywordMetrics};
use crate::ads::scheduler::ForecastScheduler;
use crate::error::AppError;
use crate::requests::chunker::{chunk, ChunkSize};
use crate::results::csv_output::to_csv_string;

/// Pause after each chunk, holding its permit.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Debug, Clone)]
pub struct ForecastOptions {
    pub chunk_size: usize,
    pub max_concurrent: usize,
    pub chunk_delay: Duration,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::Metrics.as_usize(),
            max_concurrent: 1,
            chunk_delay: DEFAULT_CHUNK_DELAY,
        }
    }
}

/// Fetches metrics for every keyword.
///
/// # Errors
///
/// Only `AppError::InvalidInput` for a zero chunk size. Remote failures are
/// logged and replaced by placeholders.
pub async fn get_metric_forecast<S>(
    source: Arc<S>,
    keywords: &[String],
    options: &ForecastOptions,
) -> Result<Vec<KeywordMetrics>, AppError>
where
    S: HistoricalMetricsSource + ?Sized + 'static,
{
    let chunks = chunk(keywords, options.chunk_size)?;
    let scheduler = ForecastScheduler::new(options.max_concurrent);
    info!(
        "[ADS] Forecasting {} keywords in {} chunks ({} concurrent)",
        keywords.len(),
        chunks.len(),
        scheduler.max_concurrent()
    );

    let mut tasks = JoinSet::new();
    for (index, keywords) in chunks.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        let scheduler = scheduler.clone();
        let delay = options.chunk_delay;

        tasks.spawn(async move {
            let _permit = match scheduler.acquire().await {
                Ok(permit) => permit,
                Err(e) => return (index, Err(e)),
            };
            let result = source.fetch_metrics(&keywords).await;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            (index, result)
        });
    }

    let mut slots: Vec<Option<Vec<KeywordMetrics>>> = vec![None; chunks.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(metrics))) => slots[index] = Some(metrics),
            Ok((index, Err(e))) => {
                warn!(
                    "[ADS] Chunk {} ({} keywords) failed, using placeholders: {}",
                    index,
                    chunks[index].len(),
                    e
                );
            }
            Err(e) => warn!("[ADS] Forecast task aborted: {}", e),
        }
    }

    let mut all: Vec<KeywordMetrics> = slots
        .into_iter()
        .zip(&chunks)
        .flat_map(|(slot, chunk)| {
            slot.unwrap_or_else(|| chunk.iter().map(KeywordMetrics::placeholder).collect())
        })
        .collect();

    let returned: HashSet<String> = all.iter().map(|m| m.keyword.clone()).collect();
    let missing: Vec<KeywordMetrics> = keywords
        .iter()
        .filter(|k| !returned.contains(k.as_str()))
        .map(KeywordMetrics::placeholder)
        .collect();
    if !missing.is_empty() {
        info!("[ADS] {} keywords had no metrics, appended placeholders", missing.len());
    }
    all.extend(missing);

    Ok(all)
}

/// Serializes metrics with one column per field, in the CSV style used for
/// merged results.
pub fn metrics_to_csv(metrics: &[KeywordMetrics]) -> Result<String, AppError> {
    let headers: Vec<String> = [
        "keyword",
        "avg_monthly_searches",
        "competition",
        "competition_index",
        "low_top_of_page_bid",
        "high_top_of_page_bid",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    let rows: Vec<Vec<String>> = metrics
        .iter()
        .map(|m| {
            vec![
                m.keyword.clone(),
                m.avg_monthly_searches.clone(),
                m.competition.clone(),
                m.competition_index.clone(),
                m.low_top_of_page_bid.clone(),
                m.high_top_of_page_bid.clone(),
            ]
        })
        .collect();
    to_csv_string(&headers, &rows)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::client::BoxFut;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns metrics for every keyword, failing chunks whose first keyword
    /// is listed in `fail_on`, and dropping keywords listed in `omit`.
    #[derive(Default)]
    struct FakeSource {
        fail_on: Vec<String>,
        omit: Vec<String>,
        reverse_delay: bool,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<usize>>,
    }

    fn metric(keyword: &str) -> KeywordMetrics {
        KeywordMetrics {
            keyword: keyword.to_string(),
            avg_monthly_searches: "10".into(),
            competition: "LOW".into(),
            competition_index: "5".into(),
            low_top_of_page_bid: "1".into(),
            high_top_of_page_bid: "2".into(),
        }
    }

    impl HistoricalMetricsSource for FakeSource {
        fn fetch_metrics<'a>(
            &'a self,
            keywords: &'a [String],
        ) -> BoxFut<'a, Vec<KeywordMetrics>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                self.seen.lock().unwrap().push(keywords.len());

                if self.reverse_delay {
                    // earlier chunks finish later
                    tokio::time::sleep(Duration::from_millis(100 - 10 * call as u64)).await;
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if keywords.first().is_some_and(|k| self.fail_on.contains(k)) {
                    return Err(AppError::Remote {
                        status: 429,
                        message: "quota".into(),
                    });
                }
                Ok(keywords
                    .iter()
                    .filter(|k| !self.omit.contains(k))
                    .map(|k| metric(k))
                    .collect())
            })
        }
    }

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{}", i)).collect()
    }

    fn options(chunk_size: usize, max_concurrent: usize) -> ForecastOptions {
        ForecastOptions {
            chunk_size,
            max_concurrent,
            chunk_delay: Duration::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_of_one_thousand() {
        let source = Arc::new(FakeSource::default());
        let input = keywords(2_500);

        let result = get_metric_forecast(source.clone(), &input, &ForecastOptions {
            chunk_delay: Duration::ZERO,
            ..ForecastOptions::default()
        })
        .await
        .unwrap();

        assert_eq!(result.len(), 2_500);
        let mut seen = source.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![500, 1_000, 1_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_chunk_degrades_to_placeholders() {
        let source = Arc::new(FakeSource {
            fail_on: vec!["kw2".into()],
            ..FakeSource::default()
        });
        let input = keywords(5);

        let result = get_metric_forecast(source, &input, &options(2, 1)).await.unwrap();

        let names: Vec<&str> = result.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(names, vec!["kw0", "kw1", "kw2", "kw3", "kw4"]);
        assert_eq!(result[2], KeywordMetrics::placeholder("kw2"));
        assert_eq!(result[3], KeywordMetrics::placeholder("kw3"));
        assert_eq!(result[4].competition, "LOW");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_keywords_are_appended() {
        let source = Arc::new(FakeSource {
            omit: vec!["kw1".into()],
            ..FakeSource::default()
        });
        let input = keywords(3);

        let result = get_metric_forecast(source, &input, &options(10, 1)).await.unwrap();

        let names: Vec<&str> = result.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(names, vec!["kw0", "kw2", "kw1"]);
        assert_eq!(result[2], KeywordMetrics::placeholder("kw1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_follows_chunks_not_completion() {
        let source = Arc::new(FakeSource {
            reverse_delay: true,
            ..FakeSource::default()
        });
        let input = keywords(6);

        let result = get_metric_forecast(source.clone(), &input, &options(2, 3)).await.unwrap();

        let names: Vec<&str> = result.iter().map(|m| m.keyword.as_str()).collect();
        assert_eq!(names, vec!["kw0", "kw1", "kw2", "kw3", "kw4", "kw5"]);
        assert!(source.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_is_respected() {
        let source = Arc::new(FakeSource::default());
        let input = keywords(10);

        get_metric_forecast(source.clone(), &input, &options(1, 2)).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 10);
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_input_and_zero_chunk_size() {
        let source = Arc::new(FakeSource::default());
        assert!(get_metric_forecast(source.clone(), &[], &options(10, 1))
            .await
            .unwrap()
            .is_empty());

        let result = get_metric_forecast(source, &keywords(1), &options(0, 1)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_metrics_to_csv() {
        let csv = metrics_to_csv(&[KeywordMetrics::placeholder("shoe")]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("\"keyword\",\"avg_monthly_searches\""));
        assert_eq!(
            lines.next().unwrap(),
            "\"shoe\",\"0\",\"UNKNOWN\",\"0\",\"0\",\"0\""
        );
    }
}
