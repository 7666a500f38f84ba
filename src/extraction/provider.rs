//! The AI extraction provider boundary.

use async_trait::async_trait;

use crate::core::ExtractionError;

/// Raw, best-effort field set extracted from a document.
///
/// Fields are loose JSON — providers disagree about types (`"1.234,56"` vs
/// `1234.56` vs `[19, 7]`), and normalization into the canonical model is
/// this crate's job, not the provider's.
#[derive(Debug, Clone)]
pub struct RawExtraction {
    /// Raw field object as returned by the provider.
    pub fields: serde_json::Value,
    /// Provider's own confidence estimate, 0.0–1.0.
    pub confidence: f32,
    /// Wall-clock time the provider spent.
    pub processing_time_ms: u64,
}

/// Extraction strategies a provider adapter supports beyond the baseline
/// [`ExtractionProvider::extract`].
///
/// Adapters declare capabilities explicitly and the orchestrator selects
/// the richest available strategy from these flags — never by probing
/// whether a method "is defined".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Supports [`ExtractionProvider::extract_with_text`]: accepts
    /// pre-extracted document text and skips its own OCR pass.
    pub with_text: bool,
    /// Supports [`ExtractionProvider::extract_with_retry`]: accepts a
    /// corrective instruction referencing a prior attempt.
    pub with_retry: bool,
}

/// An AI extraction provider adapter.
///
/// The default bodies of the optional strategies return
/// [`ExtractionError::Unsupported`]; an adapter that overrides one must
/// also set the matching capability flag.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Provider name for logs and accounting.
    fn name(&self) -> &'static str;

    /// Which optional strategies this adapter implements.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Baseline extraction from raw file bytes.
    async fn extract(
        &self,
        file: &[u8],
        mime_type: &str,
    ) -> Result<RawExtraction, ExtractionError>;

    /// Extraction with pre-supplied document text (skips built-in OCR).
    async fn extract_with_text(
        &self,
        _file: &[u8],
        _mime_type: &str,
        _extracted_text: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        Err(ExtractionError::Unsupported("extract_with_text"))
    }

    /// Re-extraction guided by a corrective retry prompt.
    async fn extract_with_retry(
        &self,
        _file: &[u8],
        _mime_type: &str,
        _retry_prompt: &str,
    ) -> Result<RawExtraction, ExtractionError> {
        Err(ExtractionError::Unsupported("extract_with_retry"))
    }
}
