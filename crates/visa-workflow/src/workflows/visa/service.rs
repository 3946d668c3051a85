use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::documents::{
    BatchError, BatchVerdict, DocumentBatchReport, DocumentUpload, DocumentValidator,
};
use super::domain::{
    AppointmentRequest, ApplicationId, BiometricsCapture, ConfirmationId, Ds160Form,
    Ds160Submission, EligibilityEvidence, FeePayment, InterviewResult, PaymentReceipt,
    ProcessingStatus, ScheduledAppointment, VisaNumber, VisaType, VisaTypeError,
};
use super::repository::{ApplicationRecord, ApplicationRepository, DocumentCheck, RepositoryError};
use super::rules::{self, StepViolation};

/// Drives an application through the consular workflow, persisting each
/// completed step through the repository.
pub struct VisaApplicationService<R> {
    repository: Arc<R>,
    documents: Arc<DocumentValidator>,
    clock: fn() -> NaiveDate,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Outcome of a document upload. Rejected uploads are still recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUploadOutcome {
    pub report: DocumentBatchReport,
    pub verdict: BatchVerdict,
}

impl<R> VisaApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, documents: DocumentValidator) -> Self {
        Self {
            repository,
            documents: Arc::new(documents),
            clock: utc_today,
        }
    }

    /// Replaces the calendar used for date rules.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    fn load(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, VisaServiceError> {
        let record = self
            .repository
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Parses the requested visa type and opens a new application for it.
    pub fn select_visa_type(&self, raw: &str) -> Result<ApplicationRecord, VisaServiceError> {
        let visa_type: VisaType = raw.parse()?;
        let record = ApplicationRecord::new(next_application_id(), visa_type);
        let stored = self.repository.insert(record)?;
        info!(
            application_id = %stored.application_id.0,
            visa_type = %visa_type,
            "visa type selected"
        );
        Ok(stored)
    }

    /// Merges the supplied evidence and checks it against the visa type.
    /// Nothing is persisted when the check fails.
    pub fn check_eligibility(
        &self,
        application_id: &ApplicationId,
        evidence: EligibilityEvidence,
    ) -> Result<&'static str, VisaServiceError> {
        let mut record = self.load(application_id)?;
        record.eligibility.merge(evidence);

        let message = rules::check_eligibility(record.visa_type, &record.eligibility)?;
        record.eligibility_confirmed = true;
        self.repository.update(record)?;
        Ok(message)
    }

    /// Runs the document pipeline on the upload. Blocking: OCR and face
    /// detection run on the calling thread.
    pub fn upload_documents(
        &self,
        application_id: &ApplicationId,
        upload: DocumentUpload,
    ) -> Result<DocumentUploadOutcome, VisaServiceError> {
        self.load(application_id)?;
        if upload.is_empty() {
            return Err(BatchError::NoDocuments.into());
        }

        let report = self.documents.validate_batch(upload.into_submissions())?;
        let verdict = report.verdict();
        if let BatchVerdict::Rejected { failed } = &verdict {
            warn!(
                application_id = %application_id.0,
                failed = ?failed,
                "document upload rejected"
            );
        }

        // Other steps may land while the pipeline runs; write onto the current record.
        let mut record = self.load(application_id)?;
        record.documents = DocumentCheck::from_report(&report);
        self.repository.update(record)?;
        Ok(DocumentUploadOutcome { report, verdict })
    }

    pub fn submit_ds160(
        &self,
        application_id: &ApplicationId,
        form: Ds160Form,
    ) -> Result<Ds160Submission, VisaServiceError> {
        let mut record = self.load(application_id)?;
        let form = rules::validate_ds160(form, (self.clock)())?;

        let submission = Ds160Submission {
            form,
            confirmation: ConfirmationId::generate("DS160"),
        };
        record.ds160 = Some(submission.clone());
        self.repository.update(record)?;
        Ok(submission)
    }

    pub fn pay_fee(
        &self,
        application_id: &ApplicationId,
        payment: FeePayment,
    ) -> Result<PaymentReceipt, VisaServiceError> {
        let mut record = self.load(application_id)?;
        rules::validate_fee(record.visa_type, &payment)?;

        let receipt = PaymentReceipt {
            amount: rules::required_fee(record.visa_type),
            method: payment.method,
            confirmation: ConfirmationId::generate("PAY"),
        };
        record.payment = Some(receipt.clone());
        self.repository.update(record)?;
        Ok(receipt)
    }

    pub fn schedule_appointment(
        &self,
        application_id: &ApplicationId,
        request: AppointmentRequest,
    ) -> Result<ScheduledAppointment, VisaServiceError> {
        let mut record = self.load(application_id)?;
        rules::validate_appointment(&request, (self.clock)())?;

        let appointment = ScheduledAppointment {
            location: request.location.trim().to_string(),
            date: request.date,
            confirmation: ConfirmationId::generate("APT"),
        };
        record.appointment = Some(appointment.clone());
        self.repository.update(record)?;
        Ok(appointment)
    }

    pub fn collect_biometrics(
        &self,
        application_id: &ApplicationId,
        capture: BiometricsCapture,
    ) -> Result<ConfirmationId, VisaServiceError> {
        let mut record = self.load(application_id)?;
        rules::validate_biometrics(&capture)?;

        let confirmation = ConfirmationId::generate("BIO");
        record.biometrics = Some(confirmation.clone());
        self.repository.update(record)?;
        Ok(confirmation)
    }

    pub fn record_interview(
        &self,
        application_id: &ApplicationId,
        result: InterviewResult,
    ) -> Result<InterviewResult, VisaServiceError> {
        let mut record = self.load(application_id)?;
        record.interview = Some(result);
        self.repository.update(record)?;
        info!(
            application_id = %application_id.0,
            result = result.label(),
            "interview recorded"
        );
        Ok(result)
    }

    /// Derives the post-interview status from the interview result and the
    /// critical document checks on file.
    pub fn process(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ProcessingStatus, VisaServiceError> {
        let mut record = self.load(application_id)?;
        let interview = record.interview.ok_or(VisaServiceError::InterviewRequired)?;

        let status = match interview {
            InterviewResult::Approved if record.critical_documents_passed() => {
                ProcessingStatus::ReadyForIssuance
            }
            InterviewResult::Approved | InterviewResult::AdministrativeProcessing => {
                ProcessingStatus::AdministrativeProcessing
            }
            InterviewResult::Refused => ProcessingStatus::Refused,
        };

        record.processing = Some(status);
        self.repository.update(record)?;
        Ok(status)
    }

    /// Issues the visa for an application ready for issuance. Repeated calls
    /// return the number already issued.
    pub fn issue_visa(
        &self,
        application_id: &ApplicationId,
    ) -> Result<VisaNumber, VisaServiceError> {
        let mut record = self.load(application_id)?;
        if record.processing != Some(ProcessingStatus::ReadyForIssuance) {
            return Err(VisaServiceError::NotReadyForIssuance);
        }
        if let Some(number) = &record.visa_number {
            return Ok(number.clone());
        }

        let number = VisaNumber::generate();
        record.visa_number = Some(number.clone());
        self.repository.update(record)?;
        info!(application_id = %application_id.0, "visa issued");
        Ok(number)
    }

    pub fn get(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, VisaServiceError> {
        self.load(application_id)
    }
}

/// Error raised by the visa application service.
#[derive(Debug, thiserror::Error)]
pub enum VisaServiceError {
    #[error(transparent)]
    VisaType(#[from] VisaTypeError),
    #[error(transparent)]
    Step(#[from] StepViolation),
    #[error(transparent)]
    Documents(#[from] BatchError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("An interview result must be recorded before processing")]
    InterviewRequired,
    #[error("Visa cannot be issued")]
    NotReadyForIssuance,
}
