use serde::{Deserialize, Serialize};

use super::documents::{DocumentBatchReport, DocumentCategory};
use super::domain::{
    ApplicationId, ConfirmationId, Ds160Submission, EligibilityFlags, InterviewResult,
    PaymentReceipt, ProcessingStatus, ScheduledAppointment, VisaNumber, VisaType, WorkflowStep,
};

/// Pass/fail outcome of one uploaded document, kept on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCheck {
    pub key: String,
    pub category: DocumentCategory,
    pub passed: bool,
}

impl DocumentCheck {
    pub fn from_report(report: &DocumentBatchReport) -> Vec<Self> {
        report
            .validation_results
            .iter()
            .map(|(key, result)| Self {
                key: key.clone(),
                category: result.category,
                passed: result.validation_passed,
            })
            .collect()
    }
}

/// Everything recorded for one visa application as it moves through the
/// workflow. Steps are optional because they can be completed in any order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub visa_type: VisaType,
    pub eligibility: EligibilityFlags,
    pub eligibility_confirmed: bool,
    pub documents: Vec<DocumentCheck>,
    pub ds160: Option<Ds160Submission>,
    pub payment: Option<PaymentReceipt>,
    pub appointment: Option<ScheduledAppointment>,
    pub biometrics: Option<ConfirmationId>,
    pub interview: Option<InterviewResult>,
    pub processing: Option<ProcessingStatus>,
    pub visa_number: Option<VisaNumber>,
}

impl ApplicationRecord {
    pub fn new(application_id: ApplicationId, visa_type: VisaType) -> Self {
        Self {
            application_id,
            visa_type,
            eligibility: EligibilityFlags::default(),
            eligibility_confirmed: false,
            documents: Vec::new(),
            ds160: None,
            payment: None,
            appointment: None,
            biometrics: None,
            interview: None,
            processing: None,
            visa_number: None,
        }
    }

    /// True when every uploaded passport and photo passed validation.
    /// Supporting documents do not count.
    pub fn critical_documents_passed(&self) -> bool {
        self.documents
            .iter()
            .filter(|check| check.category.critical_check().is_some())
            .all(|check| check.passed)
    }

    pub fn completed_steps(&self) -> Vec<WorkflowStep> {
        let mut steps = vec![WorkflowStep::VisaTypeSelected];
        let reached = [
            (!self.documents.is_empty(), WorkflowStep::DocumentsUploaded),
            (self.ds160.is_some(), WorkflowStep::Ds160Submitted),
            (self.payment.is_some(), WorkflowStep::FeePaid),
            (self.appointment.is_some(), WorkflowStep::AppointmentScheduled),
            (self.biometrics.is_some(), WorkflowStep::BiometricsCollected),
            (self.interview.is_some(), WorkflowStep::Interviewed),
            (self.processing.is_some(), WorkflowStep::Processed),
            (self.visa_number.is_some(), WorkflowStep::VisaIssued),
        ];
        steps.extend(
            reached
                .into_iter()
                .filter_map(|(done, step)| done.then_some(step)),
        );
        steps
    }

    /// Label of the furthest step reached.
    pub fn stage(&self) -> &'static str {
        self.completed_steps()
            .last()
            .map_or(WorkflowStep::VisaTypeSelected.label(), |step| step.label())
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.application_id.clone(),
            visa_type: self.visa_type,
            stage: self.stage(),
            completed_steps: self.completed_steps(),
            eligibility_confirmed: self.eligibility_confirmed,
            documents: self.documents.clone(),
            interview_result: self.interview.map(InterviewResult::label),
            processing_status: self.processing.map(ProcessingStatus::label),
            visa_number: self.visa_number.clone(),
        }
    }
}

/// Storage abstraction so the service can be exercised without a database.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Public progress summary for an application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub visa_type: VisaType,
    pub stage: &'static str,
    pub completed_steps: Vec<WorkflowStep>,
    pub eligibility_confirmed: bool,
    pub documents: Vec<DocumentCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_result: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visa_number: Option<VisaNumber>,
}
