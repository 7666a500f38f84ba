#![cfg(feature = "extraction")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use einvoice::core::*;
use einvoice::extraction::*;
use serde_json::{Value, json};

/// Raw fields that survive validation unchanged.
fn good_fields() -> Value {
    json!({
        "invoice_number": "RE-2026-042",
        "issue_date": "2026-04-01",
        "currency": "EUR",
        "seller": {"name": "ACME GmbH", "country": "DE", "vat_id": "DE123456789"},
        "buyer": {"name": "Kunde AG", "country": "DE"},
        "line_items": [
            {"description": "Beratung", "quantity": 10, "unit_price": "150,00", "total_price": "1.500,00", "tax_rate": 19},
            {"description": "Lizenz", "quantity": 1, "unit_price": 500, "total_price": 500, "tax_rate": 19}
        ],
        "subtotal": "2.000,00",
        "tax_amount": "380,00",
        "total_amount": "2.380,00",
    })
}

/// Raw fields with an unusable total — validation must fail.
fn bad_fields() -> Value {
    let mut fields = good_fields();
    fields["total_amount"] = json!("N/A");
    fields
}

/// Scripted provider: serves `responses` in order across extract /
/// extract_with_retry calls and records which strategies ran.
struct ScriptedProvider {
    capabilities: ProviderCapabilities,
    responses: Vec<Value>,
    calls: AtomicUsize,
    with_text_calls: AtomicUsize,
    retry_calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(capabilities: ProviderCapabilities, responses: Vec<Value>) -> Self {
        Self {
            capabilities,
            responses,
            calls: AtomicUsize::new(0),
            with_text_calls: AtomicUsize::new(0),
            retry_calls: AtomicUsize::new(0),
        }
    }

    fn next_response(&self) -> RawExtraction {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let fields = self
            .responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.responses.last().cloned().unwrap_or(Value::Null));
        RawExtraction {
            fields,
            confidence: 0.9,
            processing_time_ms: 5,
        }
    }
}

#[async_trait]
impl ExtractionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn extract(
        &self,
        _file: &[u8],
        _mime_type: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        Ok(self.next_response())
    }

    async fn extract_with_text(
        &self,
        _file: &[u8],
        _mime_type: &str,
        _extracted_text: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        self.with_text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_response())
    }

    async fn extract_with_retry(
        &self,
        _file: &[u8],
        _mime_type: &str,
        retry_prompt: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        assert!(retry_prompt.contains("failed validation"));
        self.retry_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_response())
    }
}

struct RecordingProgress {
    last: AtomicU8,
}

impl RecordingProgress {
    fn new() -> Self {
        Self { last: AtomicU8::new(0) }
    }
}

impl ProgressSink for RecordingProgress {
    fn update_progress(&self, percent: u8) {
        let previous = self.last.swap(percent, Ordering::SeqCst);
        assert!(percent >= previous, "progress went backwards: {previous} -> {percent}");
    }
}

fn input(format: FormatId) -> JobInput {
    JobInput {
        file: b"%PDF-1.7 stub".to_vec(),
        mime_type: "application/pdf".into(),
        extracted_text: None,
        format,
    }
}

fn limiter() -> ProviderLimiter {
    ProviderLimiter::new(8, Duration::from_millis(10))
}

#[tokio::test]
async fn clean_extraction_needs_one_attempt() {
    let provider = ScriptedProvider::new(ProviderCapabilities::default(), vec![good_fields()]);
    let limiter = limiter();
    let progress = RecordingProgress::new();

    let result = run_extraction(&provider, &limiter, &input(FormatId::XrechnungUbl), &progress)
        .await
        .unwrap();

    assert!(result.outcome.valid);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.invoice.invoice_number, "RE-2026-042");
    assert_eq!(progress.last.load(Ordering::SeqCst), 90);
}

#[tokio::test]
async fn invalid_extraction_retries_until_corrected() {
    let provider = ScriptedProvider::new(
        ProviderCapabilities { with_text: false, with_retry: true },
        vec![bad_fields(), good_fields()],
    );
    let limiter = limiter();

    let result = run_extraction(
        &provider,
        &limiter,
        &input(FormatId::XrechnungUbl),
        &NoProgress,
    )
    .await
    .unwrap();

    assert!(result.outcome.valid);
    assert_eq!(result.attempts, 2);
    assert_eq!(provider.retry_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_final_issue_list() {
    let provider = ScriptedProvider::new(
        ProviderCapabilities { with_text: false, with_retry: true },
        vec![bad_fields(), bad_fields(), bad_fields()],
    );
    let limiter = limiter();

    let result = run_extraction(
        &provider,
        &limiter,
        &input(FormatId::XrechnungUbl),
        &NoProgress,
    )
    .await
    .unwrap();

    // 1 initial + MAX_EXTRACTION_RETRIES corrective attempts
    assert_eq!(result.attempts, 1 + MAX_EXTRACTION_RETRIES);
    assert!(!result.outcome.valid);
    assert!(result
        .outcome
        .issues
        .iter()
        .any(|i| i.field == "totals.total_amount"));
}

#[tokio::test]
async fn provider_without_retry_capability_is_not_retried() {
    let provider = ScriptedProvider::new(
        ProviderCapabilities::default(),
        vec![bad_fields(), good_fields()],
    );
    let limiter = limiter();

    let result = run_extraction(
        &provider,
        &limiter,
        &input(FormatId::XrechnungUbl),
        &NoProgress,
    )
    .await
    .unwrap();

    assert!(!result.outcome.valid);
    assert_eq!(result.attempts, 1);
    assert_eq!(provider.retry_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pre_extracted_text_selects_richer_strategy() {
    let provider = ScriptedProvider::new(
        ProviderCapabilities { with_text: true, with_retry: false },
        vec![good_fields()],
    );
    let limiter = limiter();
    let mut job = input(FormatId::XrechnungUbl);
    job.extracted_text = Some("Rechnung RE-2026-042 ...".into());

    run_extraction(&provider, &limiter, &job, &NoProgress)
        .await
        .unwrap();
    assert_eq!(provider.with_text_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_aggregates_children_and_counts_failures() {
    struct FlakyProvider;

    #[async_trait]
    impl ExtractionProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }
        async fn extract(
            &self,
            file: &[u8],
            _mime_type: &str,
        ) -> Result<RawExtraction, ExtractionError> {
            if file.is_empty() {
                return Err(ExtractionError::Provider("empty file".into()));
            }
            Ok(RawExtraction {
                fields: good_fields(),
                confidence: 0.8,
                processing_time_ms: 3,
            })
        }
    }

    let provider: Arc<dyn ExtractionProvider> = Arc::new(FlakyProvider);
    let limiter = Arc::new(limiter());

    let mut inputs = vec![input(FormatId::XrechnungUbl), input(FormatId::PeppolBis)];
    inputs.push(JobInput {
        file: Vec::new(),
        mime_type: "application/pdf".into(),
        extracted_text: None,
        format: FormatId::Ksef,
    });

    let summary = run_batch(provider, limiter, inputs).await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.results.len(), 3);
    assert!(summary.results[2].is_err());
}

#[cfg(feature = "formats")]
mod conversion {
    use super::*;
    use einvoice::formats::GeneratorRegistry;

    #[tokio::test]
    async fn conversion_generates_output_for_valid_extraction() {
        let mut fields = good_fields();
        fields["buyer_reference"] = json!("04011000-12345-03");
        let provider = ScriptedProvider::new(ProviderCapabilities::default(), vec![fields]);
        let limiter = limiter();
        let registry = GeneratorRegistry::new();

        let (result, document) = run_conversion(
            &provider,
            &limiter,
            &registry,
            &input(FormatId::XrechnungUbl),
            &NoProgress,
        )
        .await
        .unwrap();

        assert!(result.outcome.valid);
        assert!(document.xml.contains("RE-2026-042"));
        assert!(document.pdf.is_none());
    }

    #[tokio::test]
    async fn conversion_fails_with_issue_list_when_invalid() {
        let provider = ScriptedProvider::new(ProviderCapabilities::default(), vec![bad_fields()]);
        let limiter = limiter();
        let registry = GeneratorRegistry::new();

        let err = run_conversion(
            &provider,
            &limiter,
            &registry,
            &input(FormatId::XrechnungUbl),
            &NoProgress,
        )
        .await
        .unwrap_err();

        match err {
            ExtractionError::RetriesExhausted { attempts, issues } => {
                assert_eq!(attempts, 1);
                assert!(!issues.is_empty());
            }
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }
}
