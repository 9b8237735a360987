//! Drives repeated calls against the external question generator until a
//! target count of usable questions has accumulated or the retry budget is
//! spent. Calls are sequential with a fixed per-call timeout and no backoff;
//! every transport error, non-2xx status, or unparseable body is a soft
//! failure that just consumes one attempt.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::core::config::Settings;
use crate::services::extraction::{self, QuestionCandidate};

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("could only generate {collected} questions after {attempts} attempts")]
    Exhausted { collected: usize, attempts: u32 },
}

/// One round trip to the external generator.
#[async_trait]
pub(crate) trait QuestionSource: Send + Sync {
    async fn fetch_batch(&self, count: u32, language: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpQuestionSource {
    client: Client,
    url: String,
}

impl HttpQuestionSource {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.generator().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(timeout)
            .build()
            .context("Failed to build generator HTTP client")?;

        Ok(Self { client, url: settings.generator().url.clone() })
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch_batch(&self, count: u32, language: &str) -> anyhow::Result<String> {
        // Wire format of the generation service.
        let payload = serde_json::json!({
            "questionscount": count,
            "language": language,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Failed to call question generator")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("question generator returned status {status}");
        }

        response.text().await.context("Failed to read question generator response")
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BatchGenerator {
    batch_size: u32,
    max_attempts: u32,
}

impl BatchGenerator {
    pub(crate) fn new(batch_size: u32, max_attempts: u32) -> Self {
        Self { batch_size, max_attempts }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.generator().batch_size, settings.generator().max_attempts)
    }

    /// Accumulate exactly `target_count` candidates, or fail all-or-nothing
    /// with the partial count once the attempt budget is exhausted.
    pub(crate) async fn generate<S>(
        &self,
        source: &S,
        target_count: usize,
        language: &str,
    ) -> Result<Vec<QuestionCandidate>, GenerationError>
    where
        S: QuestionSource + ?Sized,
    {
        let mut accumulated: Vec<QuestionCandidate> = Vec::with_capacity(target_count);
        let mut attempts = 0u32;

        while accumulated.len() < target_count && attempts < self.max_attempts {
            attempts += 1;

            let batch_count =
                (target_count - accumulated.len()).min(self.batch_size as usize) as u32;

            let raw = match source.fetch_batch(batch_count, language).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(attempt = attempts, error = %err, "Generator call failed; retrying");
                    continue;
                }
            };

            let batch = extraction::extract(&raw);
            if batch.is_empty() {
                tracing::warn!(attempt = attempts, "Generator response had no usable questions");
                continue;
            }

            accumulated.extend(batch);
        }

        if accumulated.len() < target_count {
            return Err(GenerationError::Exhausted { collected: accumulated.len(), attempts });
        }

        // The last batch may overshoot; surplus is discarded.
        accumulated.truncate(target_count);

        metrics::counter!("generator_batches_total").increment(attempts as u64);

        Ok(accumulated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct StubSource {
        calls: AtomicU32,
        per_call: usize,
        fail_first: u32,
    }

    impl StubSource {
        fn yielding(per_call: usize) -> Self {
            Self { calls: AtomicU32::new(0), per_call, fail_first: 0 }
        }

        fn empty() -> Self {
            Self::yielding(0)
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuestionSource for StubSource {
        async fn fetch_batch(&self, _count: u32, _language: &str) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if call <= self.fail_first {
                anyhow::bail!("simulated transport failure");
            }

            if self.per_call == 0 {
                return Ok("not json at all".to_string());
            }

            let objects: Vec<String> = (0..self.per_call)
                .map(|index| {
                    format!(
                        r#"{{"Question": "Q{call}-{index}", "Options": ["a", "b", "c", "d"], "Answer": "a"}}"#
                    )
                })
                .collect();

            Ok(format!("[{}]", objects.join(",")))
        }
    }

    #[tokio::test]
    async fn exhausts_budget_when_source_never_yields() {
        let generator = BatchGenerator::new(10, 30);
        let source = StubSource::empty();

        let err = generator.generate(&source, 25, "en").await.unwrap_err();

        assert!(matches!(err, GenerationError::Exhausted { collected: 0, attempts: 30 }));
        assert_eq!(source.calls(), 30);
    }

    #[tokio::test]
    async fn reaches_target_in_minimal_calls() {
        let generator = BatchGenerator::new(10, 30);
        let source = StubSource::yielding(10);

        let candidates = generator.generate(&source, 25, "en").await.expect("candidates");

        assert_eq!(candidates.len(), 25);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn transport_failures_are_soft_retries() {
        let generator = BatchGenerator::new(10, 30);
        let source = StubSource { calls: AtomicU32::new(0), per_call: 10, fail_first: 2 };

        let candidates = generator.generate(&source, 10, "en").await.expect("candidates");

        assert_eq!(candidates.len(), 10);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn surplus_from_final_batch_is_discarded() {
        let generator = BatchGenerator::new(10, 30);
        let source = StubSource::yielding(10);

        let candidates = generator.generate(&source, 7, "en").await.expect("candidates");

        assert_eq!(candidates.len(), 7);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_partial_count() {
        let generator = BatchGenerator::new(10, 3);
        // Yields 2 usable questions per call; 3 attempts can never reach 25.
        let source = StubSource::yielding(2);

        let err = generator.generate(&source, 25, "en").await.unwrap_err();

        assert!(matches!(err, GenerationError::Exhausted { collected: 6, attempts: 3 }));
    }
}
