use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use super::face::{CascadeFaceDetector, FaceDetector, FacePresence};
use super::matcher::{normalize_passport_number, passport_number_matches};
#[cfg(feature = "ocr-tesseract")]
use super::text::TesseractRecognizer;
use super::text::{TextExtractor, TextRecognizer};
use super::{
    BatchError, DocumentBatchReport, DocumentCategory, DocumentError, DocumentSubmission,
    ValidationResult,
};
use crate::config::DocumentConfig;

/// Category dispatcher and batch aggregator for uploaded documents.
pub struct DocumentValidator {
    text: TextExtractor,
    faces: FacePresence,
}

impl DocumentValidator {
    pub fn new(text: TextExtractor, faces: FacePresence) -> Self {
        Self { text, faces }
    }

    pub fn with_backends(
        recognizer: impl TextRecognizer + 'static,
        detector: impl FaceDetector + 'static,
    ) -> Self {
        Self::new(TextExtractor::new(recognizer), FacePresence::new(detector))
    }

    /// Tesseract OCR plus the built-in frontal cascade.
    #[cfg(feature = "ocr-tesseract")]
    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::with_backends(
            TesseractRecognizer::from_config(config),
            CascadeFaceDetector::default(),
        )
    }

    /// Built-in frontal cascade; text recognition fails per document until
    /// the crate is built with `ocr-tesseract`.
    #[cfg(not(feature = "ocr-tesseract"))]
    pub fn from_config(_config: &DocumentConfig) -> Self {
        Self::with_backends(super::text::NoOcrBackend, CascadeFaceDetector::default())
    }

    /// Validates one document. Processing errors are folded into a failed
    /// result, so this always yields a [`ValidationResult`].
    pub fn validate(&self, submission: &DocumentSubmission) -> ValidationResult {
        let category = submission.category;
        let outcome = match category {
            DocumentCategory::Photo => self.check_photo(&submission.bytes),
            DocumentCategory::Passport => self.check_passport(
                &submission.bytes,
                submission.expected_passport_number.as_deref(),
            ),
            DocumentCategory::Supporting => self.check_supporting(&submission.bytes),
        };

        outcome.unwrap_or_else(|err| {
            warn!(key = %submission.key, error = %err, "document processing failed");
            ValidationResult::errored(category, &err)
        })
    }

    /// Validates every submission in order and aggregates the results.
    ///
    /// Only an empty batch or a repeated key is refused outright; individual
    /// document failures are recorded and processing continues.
    pub fn validate_batch(
        &self,
        submissions: Vec<DocumentSubmission>,
    ) -> Result<DocumentBatchReport, BatchError> {
        if submissions.is_empty() {
            return Err(BatchError::NoDocuments);
        }

        let mut keys = HashSet::with_capacity(submissions.len());
        for submission in &submissions {
            if !keys.insert(submission.key.as_str()) {
                return Err(BatchError::DuplicateKey(submission.key.clone()));
            }
        }

        let mut report = DocumentBatchReport {
            documents_processed: 0,
            validation_results: BTreeMap::new(),
            extracted_text: BTreeMap::new(),
        };

        for submission in submissions {
            let result = self.validate(&submission);
            debug!(
                key = %submission.key,
                category = submission.category.label(),
                passed = result.validation_passed,
                "document validated"
            );

            let DocumentSubmission { key, category, .. } = submission;
            if category.extracts_text() {
                report
                    .extracted_text
                    .insert(key.clone(), result.extracted_text.clone());
            }
            report.validation_results.insert(key, result);
            report.documents_processed += 1;
        }

        info!(
            documents = report.documents_processed,
            failed_critical = report.failed_critical_checks().len(),
            "document batch validated"
        );
        Ok(report)
    }

    fn check_photo(&self, bytes: &[u8]) -> Result<ValidationResult, DocumentError> {
        let category = DocumentCategory::Photo;
        if self.faces.contains_face(bytes)? {
            Ok(ValidationResult::passed(
                category,
                String::new(),
                "Face detected in photo",
            ))
        } else {
            Ok(ValidationResult::rejected(
                category,
                String::new(),
                &DocumentError::NoFaceDetected,
            ))
        }
    }

    fn check_passport(
        &self,
        bytes: &[u8],
        expected: Option<&str>,
    ) -> Result<ValidationResult, DocumentError> {
        let category = DocumentCategory::Passport;
        let text = self.text.extract(bytes)?;

        let expected = expected.filter(|value| !normalize_passport_number(value).is_empty());
        match expected {
            Some(number) if passport_number_matches(&text, number) => {
                let message = format!("Passport number {number} matches extracted text");
                Ok(ValidationResult::passed(category, text, message))
            }
            Some(number) => {
                let reason = DocumentError::PassportNumberMismatch {
                    expected: number.to_string(),
                };
                Ok(ValidationResult::rejected(category, text, &reason))
            }
            None => Ok(Self::require_text(category, text)),
        }
    }

    fn check_supporting(&self, bytes: &[u8]) -> Result<ValidationResult, DocumentError> {
        let text = self.text.extract(bytes)?;
        Ok(Self::require_text(DocumentCategory::Supporting, text))
    }

    fn require_text(category: DocumentCategory, text: String) -> ValidationResult {
        if text.is_empty() {
            ValidationResult::rejected(category, text, &DocumentError::EmptyExtractedText)
        } else {
            ValidationResult::passed(category, text, "Text extracted successfully")
        }
    }
}
