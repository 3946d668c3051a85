//! Document validation pipeline for visa uploads.
//!
//! Each uploaded image is decoded and routed by its declared category: photos
//! go through face presence detection, passports and supporting documents go
//! through text extraction (plus a passport number match when one is expected).
//! Per-document failures are folded into [`ValidationResult`]s so one bad
//! upload never prevents the rest of the batch from being checked.

mod cascade;
pub mod face;
pub mod matcher;
pub mod text;
mod validator;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use face::{CascadeFaceDetector, CascadeParams, FaceDetector, FacePresence, FaceRegion};
pub use matcher::{normalize_passport_number, passport_number_matches};
#[cfg(feature = "ocr-tesseract")]
pub use text::TesseractRecognizer;
pub use text::{NoOcrBackend, TextExtractor, TextRecognizer, OCR_BACKEND};
pub use validator::DocumentValidator;

/// Declared purpose of an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Passport,
    Photo,
    Supporting,
}

impl DocumentCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passport => "passport",
            Self::Photo => "photo",
            Self::Supporting => "supporting",
        }
    }

    /// Categories validated through OCR rather than face detection.
    pub const fn extracts_text(self) -> bool {
        !matches!(self, Self::Photo)
    }

    /// Critical check guarding the whole upload, if any.
    pub const fn critical_check(self) -> Option<CriticalCheck> {
        match self {
            Self::Passport => Some(CriticalCheck::Passport),
            Self::Photo => Some(CriticalCheck::Photo),
            Self::Supporting => None,
        }
    }
}

/// One image queued for validation, keyed by its slot in the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSubmission {
    pub key: String,
    pub category: DocumentCategory,
    pub bytes: Vec<u8>,
    pub expected_passport_number: Option<String>,
}

impl DocumentSubmission {
    pub fn passport(bytes: Vec<u8>, expected_passport_number: Option<String>) -> Self {
        Self {
            key: "passport".to_string(),
            category: DocumentCategory::Passport,
            bytes,
            expected_passport_number,
        }
    }

    pub fn photo(bytes: Vec<u8>) -> Self {
        Self {
            key: "photo".to_string(),
            category: DocumentCategory::Photo,
            bytes,
            expected_passport_number: None,
        }
    }

    /// `position` is 1-based, matching the `supporting_doc_N` keys clients see.
    pub fn supporting(position: usize, bytes: Vec<u8>) -> Self {
        Self {
            key: format!("supporting_doc_{position}"),
            category: DocumentCategory::Supporting,
            bytes,
            expected_passport_number: None,
        }
    }
}

/// Raw document upload for one application, already decoded from transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpload {
    pub passport: Option<Vec<u8>>,
    pub photo: Option<Vec<u8>>,
    pub supporting_documents: Vec<Vec<u8>>,
    pub passport_number: Option<String>,
}

impl DocumentUpload {
    pub fn is_empty(&self) -> bool {
        self.passport.is_none() && self.photo.is_none() && self.supporting_documents.is_empty()
    }

    /// Submissions in processing order: passport, photo, then supporting
    /// documents in list order.
    pub fn into_submissions(self) -> Vec<DocumentSubmission> {
        let DocumentUpload {
            passport,
            photo,
            supporting_documents,
            passport_number,
        } = self;

        let mut submissions = Vec::with_capacity(2 + supporting_documents.len());
        if let Some(bytes) = passport {
            submissions.push(DocumentSubmission::passport(bytes, passport_number));
        }
        if let Some(bytes) = photo {
            submissions.push(DocumentSubmission::photo(bytes));
        }
        submissions.extend(
            supporting_documents
                .into_iter()
                .enumerate()
                .map(|(index, bytes)| DocumentSubmission::supporting(index + 1, bytes)),
        );
        submissions
    }
}

/// Outcome of validating a single document. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub category: DocumentCategory,
    pub extracted_text: String,
    pub validation_passed: bool,
    pub validation_message: String,
}

impl ValidationResult {
    pub(crate) fn passed(
        category: DocumentCategory,
        extracted_text: String,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            extracted_text,
            validation_passed: true,
            validation_message: message.into(),
        }
    }

    /// A document that was processed but did not satisfy its check.
    pub(crate) fn rejected(
        category: DocumentCategory,
        extracted_text: String,
        reason: &DocumentError,
    ) -> Self {
        Self {
            category,
            extracted_text,
            validation_passed: false,
            validation_message: reason.to_string(),
        }
    }

    /// A document whose processing itself failed (undecodable image, OCR
    /// backend failure).
    pub(crate) fn errored(category: DocumentCategory, error: &DocumentError) -> Self {
        Self {
            category,
            extracted_text: String::new(),
            validation_passed: false,
            validation_message: format!("Error processing document: {error}"),
        }
    }
}

/// Per-document failure taxonomy. Every variant is recovered into a
/// [`ValidationResult`]; none escapes the batch.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("text recognition failed: {0}")]
    Recognition(String),
    #[error("No face detected in photo")]
    NoFaceDetected,
    #[error("Passport number {expected} not found in extracted text")]
    PassportNumberMismatch { expected: String },
    #[error("No text could be extracted from document")]
    EmptyExtractedText,
}

/// Caller-level errors raised before any document is processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("At least one document must be provided")]
    NoDocuments,
    #[error("document key '{0}' submitted more than once")]
    DuplicateKey(String),
}

/// Validations that reject the whole upload when they fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CriticalCheck {
    #[serde(rename = "passport validation")]
    Passport,
    #[serde(rename = "photo validation")]
    Photo,
}

impl CriticalCheck {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passport => "passport validation",
            Self::Photo => "photo validation",
        }
    }
}

impl fmt::Display for CriticalCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Combined gate over the critical checks of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchVerdict {
    Accepted,
    Rejected { failed: Vec<CriticalCheck> },
}

impl BatchVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn message(&self) -> String {
        match self {
            Self::Accepted => "Documents uploaded and validated successfully".to_string(),
            Self::Rejected { failed } => {
                let names: Vec<&str> = failed.iter().map(|check| check.label()).collect();
                format!("Document validation failed: {}", names.join(", "))
            }
        }
    }
}

/// Results for every document of one upload call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentBatchReport {
    pub documents_processed: usize,
    pub validation_results: BTreeMap<String, ValidationResult>,
    pub extracted_text: BTreeMap<String, String>,
}

impl DocumentBatchReport {
    /// Critical checks that were submitted and failed, passport first.
    pub fn failed_critical_checks(&self) -> Vec<CriticalCheck> {
        let mut failed: Vec<CriticalCheck> = self
            .validation_results
            .values()
            .filter(|result| !result.validation_passed)
            .filter_map(|result| result.category.critical_check())
            .collect();
        failed.sort();
        failed.dedup();
        failed
    }

    pub fn verdict(&self) -> BatchVerdict {
        let failed = self.failed_critical_checks();
        if failed.is_empty() {
            BatchVerdict::Accepted
        } else {
            BatchVerdict::Rejected { failed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(category: DocumentCategory, passed: bool) -> ValidationResult {
        ValidationResult {
            category,
            extracted_text: String::new(),
            validation_passed: passed,
            validation_message: String::new(),
        }
    }

    #[test]
    fn upload_orders_passport_photo_then_supporting() {
        let upload = DocumentUpload {
            passport: Some(vec![1]),
            photo: Some(vec![2]),
            supporting_documents: vec![vec![3], vec![4]],
            passport_number: Some("X1234567".to_string()),
        };

        let keys: Vec<String> = upload
            .into_submissions()
            .into_iter()
            .map(|submission| submission.key)
            .collect();

        assert_eq!(
            keys,
            ["passport", "photo", "supporting_doc_1", "supporting_doc_2"]
        );
    }

    #[test]
    fn supporting_failures_do_not_reject_batch() {
        let mut report = DocumentBatchReport::default();
        report.validation_results.insert(
            "passport".to_string(),
            result(DocumentCategory::Passport, true),
        );
        report.validation_results.insert(
            "supporting_doc_1".to_string(),
            result(DocumentCategory::Supporting, false),
        );

        assert_eq!(report.verdict(), BatchVerdict::Accepted);
    }

    #[test]
    fn rejection_names_passport_before_photo() {
        let mut report = DocumentBatchReport::default();
        report.validation_results.insert(
            "photo".to_string(),
            result(DocumentCategory::Photo, false),
        );
        report.validation_results.insert(
            "passport".to_string(),
            result(DocumentCategory::Passport, false),
        );

        let verdict = report.verdict();
        assert_eq!(
            verdict.message(),
            "Document validation failed: passport validation, photo validation"
        );
    }
}
