//! Extraction pipeline - checkpointed, retryable batch runner
//!
//! Partitions the article dataset into fixed-size batches, submits each
//! batch to the extraction service, falls back to bounded per-article
//! retries when a batch (or one of its slots) fails, appends every
//! terminal outcome to the JSONL sink, and persists the checkpoint after
//! every article. An interrupted run resumes from the checkpoint; a
//! completed run removes it.
//!
//! Exactly one logical writer touches the checkpoint and the sink per
//! run. Launching two runs against the same files concurrently is
//! undefined; callers serialize runs externally.

pub mod checkpoint;
pub mod sink;
pub mod source;

pub use checkpoint::CheckpointStore;
pub use sink::JsonlSink;
pub use source::{Article, ArticleSource, CsvArticleSource};

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::extraction::{EntityExtractor, ExtractionValue};
use crate::graph::{EntityRelation, OutputRecord};

// ============================================================================
// Configuration
// ============================================================================

/// One run's tunables. No state outlives the run that was configured.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Articles per batch call
    pub batch_size: usize,
    /// Attempts per article in the single-item fallback
    pub max_article_retries: u32,
    /// Fixed delay between fallback attempts
    pub retry_delay: Duration,
    /// Bound on each single-article call
    pub timeout_per_article: Duration,
    /// Bound on each whole-batch call
    pub timeout_per_batch: Duration,
    /// First dataset row to process when there is no checkpoint
    pub start_row: usize,
    /// Row bound (exclusive); `None` means the whole dataset
    pub end_row: Option<usize>,
    /// Random pause between batches in seconds (politeness toward the API)
    pub pause_range: (f64, f64),
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_article_retries: 5,
            retry_delay: Duration::from_secs(10),
            timeout_per_article: Duration::from_secs(300),
            timeout_per_batch: Duration::from_secs(600),
            start_row: 0,
            end_row: None,
            pause_range: (0.3, 0.7),
        }
    }
}

/// Counts of terminal outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Articles that reached a terminal state
    pub processed: usize,
    /// Articles that produced at least one relation
    pub with_entities: usize,
    /// Articles with an explicit empty result
    pub empty: usize,
    /// Articles that exhausted all retries
    pub failed: usize,
    /// Entity lines appended to the sink
    pub entity_lines: usize,
}

/// Terminal state of one article.
enum Outcome {
    Entities(Vec<EntityRelation>),
    Exhausted,
}

// ============================================================================
// Batch Runner
// ============================================================================

pub struct BatchRunner<E> {
    extractor: E,
    config: RunConfig,
}

impl<E: EntityExtractor> BatchRunner<E> {
    pub fn new(extractor: E, config: RunConfig) -> Self {
        Self { extractor, config }
    }

    /// Process the configured dataset slice, resuming from the checkpoint
    /// when one exists. Articles are handled strictly in position order;
    /// the checkpoint always reflects the last article that reached a
    /// terminal state (success or exhausted retries), never a
    /// partially-handled one.
    ///
    /// The sink is appended before the checkpoint advances, so a crash
    /// between the two can duplicate an article's records on resume.
    /// At-least-once output is the documented trade-off; the stream is
    /// never deduplicated.
    pub async fn run(
        &self,
        source: &dyn ArticleSource,
        sink: &mut JsonlSink,
        checkpoint: &CheckpointStore,
    ) -> Result<RunReport> {
        let end = self.config.end_row.unwrap_or(usize::MAX).min(source.len());
        let start = checkpoint.load(self.config.start_row).min(end);
        let articles = source.slice(start, end);

        tracing::info!(
            "Extracting rows {}..{} ({} articles, batches of {})",
            start,
            end,
            articles.len(),
            self.config.batch_size
        );

        let mut report = RunReport::default();
        for chunk in articles.chunks(self.config.batch_size.max(1)) {
            let slots = self.submit_batch(chunk).await;

            for (article, slot) in chunk.iter().zip(slots) {
                let outcome = match slot {
                    Some(ExtractionValue::Entities(entities)) => Outcome::Entities(entities),
                    // Missing slot (failed batch) or invalid shape: retry alone.
                    _ => self.extract_with_retries(&article.text).await,
                };

                self.record(article, outcome, sink, &mut report)?;
                checkpoint.save(article.position + 1)?;
            }

            self.pause_between_batches().await;
        }

        checkpoint.clear()?;
        tracing::info!(
            "Process completed: {} articles, {} entity lines, {} empty, {} failed.",
            report.processed,
            report.entity_lines,
            report.empty,
            report.failed
        );
        Ok(report)
    }

    /// Submit one whole chunk. Any batch-level error or timeout empties
    /// every slot so each article falls back to single processing; the
    /// batch itself is never retried.
    async fn submit_batch(&self, chunk: &[Article]) -> Vec<Option<ExtractionValue>> {
        let texts: Vec<String> = chunk.iter().map(|a| a.text.clone()).collect();

        match timeout(
            self.config.timeout_per_batch,
            self.extractor.extract_batch(&texts),
        )
        .await
        {
            Ok(Ok(values)) if values.len() == chunk.len() => {
                values.into_iter().map(Some).collect()
            }
            Ok(Ok(values)) => {
                tracing::warn!(
                    "Batch returned {} results for {} inputs, falling back to individual processing",
                    values.len(),
                    chunk.len()
                );
                vec![None; chunk.len()]
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Batch-level error, falling back to individual processing: {}",
                    e
                );
                vec![None; chunk.len()]
            }
            Err(_) => {
                tracing::warn!(
                    "Batch call exceeded {:?}, falling back to individual processing",
                    self.config.timeout_per_batch
                );
                vec![None; chunk.len()]
            }
        }
    }

    /// Single-article fallback: bounded attempts, each under its own
    /// timeout. Transport errors, timeouts, and invalid result shapes all
    /// count as failed attempts.
    async fn extract_with_retries(&self, text: &str) -> Outcome {
        let max = self.config.max_article_retries.max(1);

        for attempt in 1..=max {
            match timeout(
                self.config.timeout_per_article,
                self.extractor.extract_one(text),
            )
            .await
            {
                Ok(Ok(ExtractionValue::Entities(entities))) => return Outcome::Entities(entities),
                Ok(Ok(ExtractionValue::Invalid(raw))) => {
                    tracing::warn!("Invalid result shape ({}), attempt {}/{}", raw, attempt, max);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Error: {}, attempt {}/{}", e, attempt, max);
                }
                Err(_) => {
                    tracing::warn!(
                        "Timeout: article processing exceeded {:?}, attempt {}/{}",
                        self.config.timeout_per_article,
                        attempt,
                        max
                    );
                }
            }

            if attempt < max && !self.config.retry_delay.is_zero() {
                sleep(self.config.retry_delay).await;
            }
        }

        Outcome::Exhausted
    }

    /// Append an article's terminal records to the sink.
    fn record(
        &self,
        article: &Article,
        outcome: Outcome,
        sink: &mut JsonlSink,
        report: &mut RunReport,
    ) -> Result<()> {
        report.processed += 1;

        match outcome {
            Outcome::Entities(entities) if !entities.is_empty() => {
                for entity in entities {
                    sink.write(&OutputRecord::entity(entity, article.date.clone()))?;
                    report.entity_lines += 1;
                }
                report.with_entities += 1;
            }
            Outcome::Entities(_) => {
                sink.write(&OutputRecord::error(
                    "parsing error",
                    article.date.clone(),
                    Value::Array(vec![]),
                ))?;
                report.empty += 1;
            }
            Outcome::Exhausted => {
                sink.write(&OutputRecord::error(
                    format!("Failed after {} attempts", self.config.max_article_retries),
                    article.date.clone(),
                    Value::String(article.text.clone()),
                ))?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn pause_between_batches(&self) {
        let (lo, hi) = self.config.pause_range;
        if hi <= 0.0 {
            return;
        }
        let secs = {
            let mut rng = rand::thread_rng();
            rng.gen_range(lo..=hi)
        };
        sleep(Duration::from_secs_f64(secs)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn rel(subject: &str) -> EntityRelation {
        EntityRelation {
            subject: subject.to_string(),
            subject_type: "PERUSAHAAN".to_string(),
            relation: "BerinvestasiDi".to_string(),
            object: "sektor energi".to_string(),
            object_type: "SEKTOR".to_string(),
        }
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article {
                position: i,
                text: format!("teks artikel {i}"),
                date: format!("tanggal-{i}"),
            })
            .collect()
    }

    struct VecSource(Vec<Article>);

    impl ArticleSource for VecSource {
        fn len(&self) -> usize {
            self.0.len()
        }
        fn slice(&self, start: usize, end: usize) -> Vec<Article> {
            let end = end.min(self.0.len());
            let start = start.min(end);
            self.0[start..end].to_vec()
        }
    }

    fn test_config() -> RunConfig {
        RunConfig {
            batch_size: 2,
            max_article_retries: 5,
            retry_delay: Duration::ZERO,
            timeout_per_article: Duration::from_secs(5),
            timeout_per_batch: Duration::from_secs(5),
            start_row: 0,
            end_row: None,
            pause_range: (0.0, 0.0),
        }
    }

    /// Harness holding the run's files in a temp dir.
    struct Files {
        _dir: tempfile::TempDir,
        sink: JsonlSink,
        checkpoint: CheckpointStore,
        output_path: std::path::PathBuf,
    }

    impl Files {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let output_path = dir.path().join("out.jsonl");
            Self {
                sink: JsonlSink::open(&output_path).unwrap(),
                checkpoint: CheckpointStore::new(dir.path().join("checkpoint.json")),
                output_path,
                _dir: dir,
            }
        }

        fn output_lines(&self) -> Vec<Value> {
            std::fs::read_to_string(&self.output_path)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    /// Wraps each input like `{"entities": [relation]}` and records the
    /// size of every batch call.
    struct WrappedExtractor {
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl WrappedExtractor {
        fn new() -> Self {
            Self {
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EntityExtractor for WrappedExtractor {
        async fn extract_one(&self, text: &str) -> Result<ExtractionValue, ExtractError> {
            Ok(ExtractionValue::from_value(json!({
                "entities": [serde_json::to_value(rel(text)).unwrap()]
            })))
        }

        async fn extract_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<ExtractionValue>, ExtractError> {
            self.batch_sizes.lock().unwrap().push(texts.len());
            let mut slots = Vec::with_capacity(texts.len());
            for text in texts {
                slots.push(self.extract_one(text).await?);
            }
            Ok(slots)
        }
    }

    /// Fails every call; counts single-item attempts.
    struct FailingExtractor {
        single_calls: AtomicUsize,
    }

    #[async_trait]
    impl EntityExtractor for FailingExtractor {
        async fn extract_one(&self, _text: &str) -> Result<ExtractionValue, ExtractError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Err(ExtractError::Malformed("boom".to_string()))
        }

        async fn extract_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<ExtractionValue>, ExtractError> {
            Err(ExtractError::Malformed("batch boom".to_string()))
        }
    }

    #[tokio::test]
    async fn partitions_into_batches_and_clears_checkpoint() {
        let runner = BatchRunner::new(WrappedExtractor::new(), test_config());
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(5)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        // BATCH_SIZE=2 over 5 articles: calls of size 2, 2, 1.
        assert_eq!(
            *runner.extractor.batch_sizes.lock().unwrap(),
            vec![2, 2, 1]
        );
        assert_eq!(report.processed, 5);
        assert_eq!(report.with_entities, 5);
        assert_eq!(report.entity_lines, 5);
        assert!(!files.checkpoint.exists());

        // One line per entity, each tagged with its article's date.
        let lines = files.output_lines();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["date"], format!("tanggal-{i}"));
            assert_eq!(line["subject"], format!("teks artikel {i}"));
        }
    }

    #[tokio::test]
    async fn always_failing_service_exhausts_exact_retry_budget() {
        let runner = BatchRunner::new(
            FailingExtractor {
                single_calls: AtomicUsize::new(0),
            },
            test_config(),
        );
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(3)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        // Exactly MAX_ARTICLE_RETRIES attempts per article.
        assert_eq!(
            runner.extractor.single_calls.load(Ordering::SeqCst),
            3 * 5
        );
        assert_eq!(report.failed, 3);

        // Exactly one error record per article, carrying the article text.
        let lines = files.output_lines();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["error"], "Failed after 5 attempts");
            assert_eq!(line["content"], format!("teks artikel {i}"));
            assert_eq!(line["date"], format!("tanggal-{i}"));
        }

        // Failures are terminal outcomes; the run still completes.
        assert!(!files.checkpoint.exists());
    }

    /// Returns an explicit empty list for every article.
    struct EmptyExtractor;

    #[async_trait]
    impl EntityExtractor for EmptyExtractor {
        async fn extract_one(&self, _text: &str) -> Result<ExtractionValue, ExtractError> {
            Ok(ExtractionValue::from_value(json!([])))
        }
    }

    #[tokio::test]
    async fn explicit_empty_result_records_error_and_advances() {
        let runner = BatchRunner::new(EmptyExtractor, test_config());
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(1)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        assert_eq!(report.empty, 1);
        assert_eq!(report.processed, 1);

        let lines = files.output_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["error"], "parsing error");
        assert!(!files.checkpoint.exists());
    }

    #[tokio::test]
    async fn resumes_from_persisted_checkpoint() {
        let runner = BatchRunner::new(WrappedExtractor::new(), test_config());
        let mut files = Files::new();

        // A previous run finished 3 of 5 articles before dying.
        files.checkpoint.save(3).unwrap();

        let report = runner
            .run(&VecSource(articles(5)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        let lines = files.output_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["date"], "tanggal-3");
        assert_eq!(lines[1]["date"], "tanggal-4");
        assert!(!files.checkpoint.exists());
    }

    #[tokio::test]
    async fn end_row_bounds_the_slice() {
        let runner = BatchRunner::new(
            WrappedExtractor::new(),
            RunConfig {
                end_row: Some(2),
                ..test_config()
            },
        );
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(5)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(files.output_lines().len(), 2);
    }

    /// Batch call reports one slot invalid; singles succeed.
    struct InvalidSlotExtractor {
        single_calls: AtomicUsize,
    }

    #[async_trait]
    impl EntityExtractor for InvalidSlotExtractor {
        async fn extract_one(&self, text: &str) -> Result<ExtractionValue, ExtractError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExtractionValue::Entities(vec![rel(text)]))
        }

        async fn extract_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<ExtractionValue>, ExtractError> {
            let mut slots: Vec<ExtractionValue> = texts
                .iter()
                .map(|t| ExtractionValue::Entities(vec![rel(t)]))
                .collect();
            slots[0] = ExtractionValue::Invalid(json!("garbage"));
            Ok(slots)
        }
    }

    #[tokio::test]
    async fn invalid_batch_slot_falls_back_to_single_processing() {
        let runner = BatchRunner::new(
            InvalidSlotExtractor {
                single_calls: AtomicUsize::new(0),
            },
            test_config(),
        );
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(2)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        // Only the invalid slot went through the fallback.
        assert_eq!(runner.extractor.single_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.with_entities, 2);
        assert_eq!(files.output_lines().len(), 2);
    }

    /// Batch hangs past the batch timeout; singles succeed immediately.
    struct HangingBatchExtractor;

    #[async_trait]
    impl EntityExtractor for HangingBatchExtractor {
        async fn extract_one(&self, text: &str) -> Result<ExtractionValue, ExtractError> {
            Ok(ExtractionValue::Entities(vec![rel(text)]))
        }

        async fn extract_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<ExtractionValue>, ExtractError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_batch_call_times_out_into_fallback() {
        let runner = BatchRunner::new(
            HangingBatchExtractor,
            RunConfig {
                timeout_per_batch: Duration::from_millis(50),
                ..test_config()
            },
        );
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(2)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        assert_eq!(report.with_entities, 2);
        assert_eq!(files.output_lines().len(), 2);
    }

    /// Hangs on every call, batch and single.
    struct HangingExtractor {
        single_calls: AtomicUsize,
    }

    #[async_trait]
    impl EntityExtractor for HangingExtractor {
        async fn extract_one(&self, _text: &str) -> Result<ExtractionValue, ExtractError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_secs(3600)).await;
            Ok(ExtractionValue::Entities(Vec::new()))
        }

        async fn extract_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<ExtractionValue>, ExtractError> {
            Err(ExtractError::Malformed("batch down".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_count_as_failed_attempts() {
        let runner = BatchRunner::new(
            HangingExtractor {
                single_calls: AtomicUsize::new(0),
            },
            RunConfig {
                max_article_retries: 2,
                timeout_per_article: Duration::from_millis(10),
                ..test_config()
            },
        );
        let mut files = Files::new();

        let report = runner
            .run(&VecSource(articles(1)), &mut files.sink, &files.checkpoint)
            .await
            .unwrap();

        assert_eq!(runner.extractor.single_calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(files.output_lines()[0]["error"], "Failed after 2 attempts");
    }

    #[tokio::test]
    async fn rerun_after_completion_appends_duplicates() {
        let mut files = Files::new();
        let source = VecSource(articles(2));

        for _ in 0..2 {
            let runner = BatchRunner::new(WrappedExtractor::new(), test_config());
            runner
                .run(&source, &mut files.sink, &files.checkpoint)
                .await
                .unwrap();
        }

        // Intentional non-dedup behavior: a completed dataset reprocesses
        // from the start row and appends everything again.
        assert_eq!(files.output_lines().len(), 4);
    }
}
