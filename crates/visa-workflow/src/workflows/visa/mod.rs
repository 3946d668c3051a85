//! U.S. nonimmigrant visa application workflow.
//!
//! An application is opened by selecting a visa type and then moves through
//! eligibility, document upload, DS-160, fee payment, appointment,
//! biometrics, interview, processing and issuance. Each step is validated by
//! [`rules`] or the [`documents`] pipeline and persisted through an
//! [`ApplicationRepository`].

pub mod documents;
pub mod domain;
pub mod repository;
pub mod router;
pub(crate) mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use documents::{
    BatchVerdict, DocumentBatchReport, DocumentUpload, DocumentValidator, ValidationResult,
};
pub use domain::{
    AppointmentRequest, ApplicationId, BiometricsCapture, ConfirmationId, Ds160Form,
    EligibilityEvidence, FeePayment, InterviewResult, PaymentMethod, ProcessingStatus, VisaNumber,
    VisaType,
};
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationStatusView, DocumentCheck,
    RepositoryError,
};
pub use router::visa_router;
pub use rules::StepViolation;
pub use service::{DocumentUploadOutcome, VisaApplicationService, VisaServiceError};
