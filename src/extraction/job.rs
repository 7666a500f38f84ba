//! Per-job extraction pipeline and batch fan-out.
//!
//! One async task per job. Suspension points are the provider round-trips
//! and (in the caller) record persistence; persistence always comes last so
//! a failed job leaves no partially-written record behind.

use std::sync::Arc;

use tracing::{debug, warn};

use super::limit::ProviderLimiter;
use super::normalize::normalize_extracted;
use super::provider::ExtractionProvider;
use super::retry::{build_retry_prompt, should_retry};
use crate::core::{CanonicalInvoice, ExtractionError, FormatId, ValidationOutcome, validate};

/// Input for one extraction job.
#[derive(Debug, Clone)]
pub struct JobInput {
    /// Raw document bytes (already downloaded by the caller).
    pub file: Vec<u8>,
    /// Document MIME type.
    pub mime_type: String,
    /// Pre-extracted document text, when an upstream OCR pass ran.
    pub extracted_text: Option<String>,
    /// Target output format.
    pub format: FormatId,
}

/// Progress reporting toward the job queue.
///
/// Checkpoints are monotonically increasing percentages; the queue
/// boundary owns delivery and durability.
pub trait ProgressSink: Send + Sync {
    fn update_progress(&self, percent: u8);
}

/// Sink for callers that do not track progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update_progress(&self, _percent: u8) {}
}

/// Result of one extraction job, valid or not.
///
/// An invoice that still fails validation after the retry budget is
/// returned with `outcome.valid == false` and the final issue list
/// verbatim — that is what the review surface shows the user.
#[derive(Debug)]
pub struct ExtractionJobResult {
    pub invoice: CanonicalInvoice,
    pub outcome: ValidationOutcome,
    /// Provider confidence of the accepted attempt.
    pub confidence: f32,
    /// Total attempts made (1 = no retries needed).
    pub attempts: u32,
}

/// Run one extraction job: extract, normalize, validate, and retry with a
/// corrective prompt while the budget and provider capabilities allow.
///
/// Progress checkpoints: 10 (queued permit), 40 (first extraction done),
/// 70 (validation settled), 90 (result assembled). The caller reports 100
/// after persisting — persistence stays the last step of a job.
pub async fn run_extraction(
    provider: &dyn ExtractionProvider,
    limiter: &ProviderLimiter,
    input: &JobInput,
    progress: &dyn ProgressSink,
) -> Result<ExtractionJobResult, ExtractionError> {
    let capabilities = provider.capabilities();
    progress.update_progress(10);

    limiter.acquire().await?;
    let mut raw = match (&input.extracted_text, capabilities.with_text) {
        (Some(text), true) => {
            provider
                .extract_with_text(&input.file, &input.mime_type, text)
                .await?
        }
        _ => provider.extract(&input.file, &input.mime_type).await?,
    };
    progress.update_progress(40);

    let mut invoice = normalize_extracted(&raw.fields, input.format);
    let mut outcome = validate(&invoice);
    let mut attempts: u32 = 1;

    while !outcome.valid && capabilities.with_retry && should_retry(attempts - 1) {
        let prompt = build_retry_prompt(
            &raw.fields.to_string(),
            &outcome.issues,
            input.extracted_text.as_deref(),
            attempts,
        );
        debug!(
            provider = provider.name(),
            attempt = attempts,
            issues = outcome.issues.len(),
            "extraction failed validation, retrying"
        );

        limiter.acquire().await?;
        raw = provider
            .extract_with_retry(&input.file, &input.mime_type, &prompt)
            .await?;
        invoice = normalize_extracted(&raw.fields, input.format);
        outcome = validate(&invoice);
        attempts += 1;
    }
    progress.update_progress(70);

    if !outcome.valid {
        warn!(
            provider = provider.name(),
            attempts,
            issues = outcome.issues.len(),
            "extraction still invalid after retry budget, surfacing for review"
        );
    }

    progress.update_progress(90);
    Ok(ExtractionJobResult {
        invoice,
        outcome,
        confidence: raw.confidence,
        attempts,
    })
}

/// Aggregated outcome of a batch job.
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Per-child results in input order.
    pub results: Vec<Result<ExtractionJobResult, ExtractionError>>,
}

/// Fan one parent job out into independent child jobs, one per file, and
/// aggregate once every child has reached a terminal state. A child that
/// panics or is cancelled counts as a failure — never a silent omission.
pub async fn run_batch(
    provider: Arc<dyn ExtractionProvider>,
    limiter: Arc<ProviderLimiter>,
    inputs: Vec<JobInput>,
) -> BatchSummary {
    let total = inputs.len();

    let handles: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let provider = Arc::clone(&provider);
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                run_extraction(provider.as_ref(), &limiter, &input, &NoProgress).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(ExtractionError::Provider(format!(
                "child job did not complete: {join_error}"
            ))),
        });
    }

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    BatchSummary {
        total,
        succeeded,
        failed: total - succeeded,
        results,
    }
}

/// Full conversion: extraction pipeline plus format generation.
///
/// Unlike [`run_extraction`], this path requires a valid invoice — an
/// exhausted retry budget is an error carrying the final issue list.
#[cfg(feature = "formats")]
pub async fn run_conversion(
    provider: &dyn ExtractionProvider,
    limiter: &ProviderLimiter,
    registry: &crate::formats::GeneratorRegistry,
    input: &JobInput,
    progress: &dyn ProgressSink,
) -> Result<(ExtractionJobResult, crate::formats::GeneratedDocument), ExtractionError> {
    let result = run_extraction(provider, limiter, input, progress).await?;
    if !result.outcome.valid {
        return Err(ExtractionError::RetriesExhausted {
            attempts: result.attempts,
            issues: result.outcome.issues.clone(),
        });
    }

    let generator = registry.create_for(input.format);
    let document = generator
        .generate(&result.invoice)
        .map_err(|e| ExtractionError::Unusable(format!("generation failed: {e}")))?;
    Ok((result, document))
}
