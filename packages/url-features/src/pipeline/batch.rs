//! Chunked, paced extraction over many URLs.

use indexmap::IndexSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::orchestrator::FeatureExtractor;
use crate::pacing::{Pacer, PauseKind};
use crate::types::config::BatchConfig;
use crate::types::feature::FeatureVector;

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// One vector per input URL, in input order. Failed URLs hold zeros.
    pub vectors: Vec<FeatureVector>,

    /// Input positions whose extraction panicked, timed out or was never
    /// dispatched. Repeated URLs are tracked per position.
    pub failed: IndexSet<usize>,

    /// Chunks started.
    pub chunks: usize,

    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.vectors.len() - self.failed.len().min(self.vectors.len())
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }
}

/// Runs a [`FeatureExtractor`] over a URL list in chunks.
///
/// Within a chunk, at most `concurrency` URLs are in flight. A slot that
/// finished a URL other than the chunk's last pauses
/// [`PauseKind::BetweenUrls`] before taking the next one; the scheduler
/// pauses [`PauseKind::BetweenBatches`] between chunks.
pub struct BatchScheduler {
    extractor: Arc<FeatureExtractor>,
    pacer: Arc<dyn Pacer>,
    config: BatchConfig,
}

impl BatchScheduler {
    pub fn new(extractor: Arc<FeatureExtractor>, pacer: Arc<dyn Pacer>, config: BatchConfig) -> Self {
        Self {
            extractor,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn run(&self, urls: &[String]) -> BatchResult {
        self.run_with_cancel(urls, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stops dispatching once `cancel` fires.
    ///
    /// URLs already in flight finish (or time out); the rest are reported
    /// failed with zero vectors.
    pub async fn run_with_cancel(&self, urls: &[String], cancel: &CancellationToken) -> BatchResult {
        let chunk_size = self.config.chunk_size.max(1);
        let total_chunks = self.config.chunk_count(urls.len());
        let slots = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut result = BatchResult {
            vectors: vec![FeatureVector::neutral(); urls.len()],
            ..BatchResult::default()
        };
        let mut dispatched = vec![false; urls.len()];

        for (chunk_index, chunk) in urls.chunks(chunk_size).enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            result.chunks += 1;
            info!(
                chunk = chunk_index + 1,
                total = total_chunks,
                urls = chunk.len(),
                "processing chunk"
            );

            let mut tasks: Vec<(usize, JoinHandle<Option<FeatureVector>>)> = Vec::with_capacity(chunk.len());
            for (offset, url) in chunk.iter().enumerate() {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        result.cancelled = true;
                        break;
                    }
                    permit = slots.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let index = chunk_index * chunk_size + offset;
                dispatched[index] = true;

                let pause_after = offset + 1 < chunk.len();
                let extractor = self.extractor.clone();
                let pacer = self.pacer.clone();
                let timeout = self.config.url_timeout;
                let url = url.clone();

                tasks.push((
                    index,
                    tokio::spawn(async move {
                        let outcome = tokio::time::timeout(timeout, extractor.extract(&url)).await;
                        if outcome.is_err() {
                            warn!(url = %url, timeout = ?timeout, "extraction timed out");
                        }
                        if pause_after {
                            pacer.pause(PauseKind::BetweenUrls).await;
                        }
                        drop(permit);
                        outcome.ok()
                    }),
                ));
            }

            for (index, task) in tasks {
                match task.await {
                    Ok(Some(vector)) => result.vectors[index] = vector,
                    Ok(None) => {
                        result.failed.insert(index);
                    }
                    Err(e) => {
                        error!(url = %urls[index], error = %e, "extraction task failed");
                        result.failed.insert(index);
                    }
                }
            }

            if result.cancelled {
                break;
            }
            if chunk_index + 1 < total_chunks {
                self.pacer.pause(PauseKind::BetweenBatches).await;
            }
        }

        if result.cancelled {
            for (index, _) in dispatched.iter().enumerate().filter(|(_, sent)| !**sent) {
                result.failed.insert(index);
            }
        }

        info!(
            urls = urls.len(),
            chunks = result.chunks,
            failed = result.failed.len(),
            cancelled = result.cancelled,
            "batch complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFetcher, MockResolver, MockSearchBackend, RecordingPacer};
    use crate::types::config::ExtractorConfig;
    use std::time::Duration;

    fn extractor(resolver: MockResolver, fetcher: MockFetcher) -> Arc<FeatureExtractor> {
        Arc::new(
            FeatureExtractor::builder(ExtractorConfig::default())
                .resolver(Arc::new(resolver))
                .registry_backends(vec![])
                .fetcher(Arc::new(fetcher))
                .search_backends(vec![Arc::new(MockSearchBackend::new())])
                .build()
                .unwrap(),
        )
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://site{}.invalid/", i)).collect()
    }

    #[tokio::test]
    async fn test_chunks_and_pauses() {
        let pacer = Arc::new(RecordingPacer::new());
        let scheduler = BatchScheduler::new(
            extractor(MockResolver::new(), MockFetcher::new()),
            pacer.clone(),
            BatchConfig::new().with_chunk_size(3),
        );

        let result = scheduler.run(&urls(7)).await;

        assert_eq!(result.chunks, 3);
        assert_eq!(result.vectors.len(), 7);
        assert!(result.failed.is_empty());
        assert!(!result.cancelled);
        // Chunks of 3, 3, 1: two pauses inside each full chunk, none in the last.
        assert_eq!(pacer.count(PauseKind::BetweenUrls), 4);
        assert_eq!(pacer.count(PauseKind::BetweenBatches), 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let scheduler = BatchScheduler::new(
            extractor(MockResolver::new(), MockFetcher::new()),
            Arc::new(RecordingPacer::new()),
            BatchConfig::default(),
        );
        let result = scheduler.run(&[]).await;
        assert_eq!(result.chunks, 0);
        assert!(result.vectors.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_records_failure_in_place() {
        let resolver = MockResolver::new().with_host("slow.example", "93.184.216.34");
        let fetcher = MockFetcher::new()
            .with_page("http://slow.example/", "<html></html>")
            .with_delay(Duration::from_millis(500));

        let scheduler = BatchScheduler::new(
            extractor(resolver, fetcher),
            Arc::new(RecordingPacer::new()),
            BatchConfig::new().with_url_timeout(Duration::from_millis(100)),
        );

        let input = vec![
            "http://fast.invalid/".to_string(),
            "http://slow.example/".to_string(),
            "http://also-fast.invalid/".to_string(),
        ];
        let result = scheduler.run(&input).await;

        assert_eq!(result.failed.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(result.vectors[1], FeatureVector::neutral());
        assert_ne!(result.vectors[0], FeatureVector::neutral());
        assert_ne!(result.vectors[2], FeatureVector::neutral());
    }

    #[tokio::test]
    async fn test_repeated_url_fails_only_where_it_timed_out() {
        let resolver = MockResolver::new().with_host("dup.example", "93.184.216.34");
        let fetcher = MockFetcher::new()
            .with_page("http://dup.example/", "<html></html>")
            .with_first_call_delay(Duration::from_millis(500));

        let scheduler = BatchScheduler::new(
            extractor(resolver, fetcher),
            Arc::new(RecordingPacer::new()),
            BatchConfig::new().with_url_timeout(Duration::from_millis(100)),
        );

        let input = vec!["http://dup.example/".to_string(); 2];
        let result = scheduler.run(&input).await;

        assert!(result.is_failed(0));
        assert!(!result.is_failed(1));
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.vectors[0], FeatureVector::neutral());
        assert_ne!(result.vectors[1], FeatureVector::neutral());
    }

    #[tokio::test]
    async fn test_concurrent_slots_keep_input_order() {
        let scheduler = BatchScheduler::new(
            extractor(MockResolver::new(), MockFetcher::new()),
            Arc::new(RecordingPacer::new()),
            BatchConfig::new().with_chunk_size(4).with_concurrency(3),
        );

        let input = vec![
            "http://192.168.0.1/".to_string(),
            "http://example.invalid/".to_string(),
            "http://10.0.0.1/".to_string(),
            "http://plain.invalid/".to_string(),
        ];
        let result = scheduler.run(&input).await;

        let ip_flags: Vec<i8> = result
            .vectors
            .iter()
            .map(|v| v.get(crate::types::feature::Feature::IpAddress).value())
            .collect();
        assert_eq!(ip_flags, vec![-1, 1, -1, 1]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scheduler = BatchScheduler::new(
            extractor(MockResolver::new(), MockFetcher::new()),
            Arc::new(RecordingPacer::new()),
            BatchConfig::new().with_chunk_size(2),
        );
        let input = urls(3);
        let result = scheduler.run_with_cancel(&input, &cancel).await;

        assert!(result.cancelled);
        assert_eq!(result.chunks, 0);
        assert_eq!(result.failed.len(), 3);
        assert!(result.vectors.iter().all(|v| *v == FeatureVector::neutral()));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_dispatched_results() {
        let cancel = CancellationToken::new();
        let pacer = Arc::new(CancellingPacer {
            token: cancel.clone(),
        });

        let scheduler = BatchScheduler::new(
            extractor(MockResolver::new(), MockFetcher::new()),
            pacer,
            BatchConfig::new().with_chunk_size(2),
        );
        let input = urls(5);
        let result = scheduler.run_with_cancel(&input, &cancel).await;

        // First URL runs, its between-URL pause cancels, the rest never start.
        assert!(result.cancelled);
        assert_eq!(result.chunks, 1);
        assert_ne!(result.vectors[0], FeatureVector::neutral());
        assert_eq!(result.failed.len(), 4);
        assert!(!result.is_failed(0));
    }

    struct CancellingPacer {
        token: CancellationToken,
    }

    #[async_trait::async_trait]
    impl Pacer for CancellingPacer {
        async fn pause(&self, _kind: PauseKind) {
            self.token.cancel();
        }
    }
}
