use super::common::*;
use crate::workflows::visa::documents::{BatchError, DocumentUpload};
use crate::workflows::visa::domain::{
    AppointmentRequest, ApplicationId, BiometricsCapture, EligibilityEvidence, FeePayment,
    InterviewResult, PaymentMethod, ProcessingStatus, VisaTypeError, WorkflowStep,
};
use crate::workflows::visa::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::visa::documents::{DocumentError, TextRecognizer};
use crate::workflows::visa::{
    DocumentValidator, StepViolation, VisaApplicationService, VisaServiceError,
};
use chrono::NaiveDate;
use image::RgbImage;
use std::sync::Arc;

fn accepted_upload() -> DocumentUpload {
    DocumentUpload {
        passport: Some(document_png(PASSPORT_WIDTH)),
        photo: Some(face_png()),
        supporting_documents: vec![document_png(SUPPORTING_WIDTH)],
        passport_number: Some("X1234567".to_string()),
    }
}

fn monday_after_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 20).expect("valid date")
}

#[test]
fn select_creates_sequenced_record() {
    let (service, repository) = build_service();

    let record = service.select_visa_type("F1").expect("visa type accepted");

    assert!(record.application_id.0.starts_with("app-"));
    assert_eq!(record.application_id.0.len(), "app-".len() + 6);
    let stored = repository
        .fetch(&record.application_id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.completed_steps(), vec![WorkflowStep::VisaTypeSelected]);
}

#[test]
fn select_rejects_empty_and_unknown_types() {
    let (service, _) = build_service();

    assert!(matches!(
        service.select_visa_type(""),
        Err(VisaServiceError::VisaType(VisaTypeError::Empty))
    ));
    match service.select_visa_type("b1/b2") {
        Err(VisaServiceError::VisaType(VisaTypeError::Unknown(value))) => {
            assert_eq!(value, "b1/b2")
        }
        other => panic!("expected unknown visa type, got {other:?}"),
    }
}

#[test]
fn eligibility_failure_is_not_persisted() {
    let (service, repository) = build_service();
    let record = service.select_visa_type("H1B").expect("selected");

    let err = service
        .check_eligibility(&record.application_id, EligibilityEvidence::default())
        .expect_err("job offer required");
    assert!(matches!(
        err,
        VisaServiceError::Step(StepViolation::MissingJobOffer)
    ));

    let message = service
        .check_eligibility(
            &record.application_id,
            EligibilityEvidence {
                job_offer: Some(true),
                ..EligibilityEvidence::default()
            },
        )
        .expect("eligible with job offer");
    assert_eq!(message, "Eligibility confirmed for H1B visa with job offer");

    let stored = repository
        .fetch(&record.application_id)
        .expect("fetch succeeds")
        .expect("record present");
    assert!(stored.eligibility_confirmed);
    assert!(stored.eligibility.job_offer);
}

#[test]
fn empty_upload_is_a_caller_error() {
    let (service, _) = build_service();
    let record = service.select_visa_type("B1/B2").expect("selected");

    let err = service
        .upload_documents(&record.application_id, DocumentUpload::default())
        .expect_err("empty upload refused");

    assert!(matches!(
        err,
        VisaServiceError::Documents(BatchError::NoDocuments)
    ));
    assert_eq!(err.to_string(), "At least one document must be provided");
}

#[test]
fn rejected_upload_is_recorded_and_blocks_issuance() {
    let (service, repository) = build_service();
    let record = service.select_visa_type("B1/B2").expect("selected");
    let id = record.application_id;

    let upload = DocumentUpload {
        photo: Some(blank_photo_png()),
        ..accepted_upload()
    };
    let outcome = service.upload_documents(&id, upload).expect("processed");
    assert!(!outcome.verdict.is_accepted());
    assert_eq!(outcome.report.documents_processed, 3);

    let stored = repository.fetch(&id).expect("fetch").expect("present");
    assert!(!stored.critical_documents_passed());

    service
        .record_interview(&id, InterviewResult::Approved)
        .expect("interview recorded");
    assert_eq!(
        service.process(&id).expect("processed"),
        ProcessingStatus::AdministrativeProcessing
    );
    assert!(matches!(
        service.issue_visa(&id),
        Err(VisaServiceError::NotReadyForIssuance)
    ));
}

/// Records an interview on every stored application while "reading" text,
/// standing in for a concurrent request that lands mid-upload.
struct InterviewDuringOcr {
    repository: MemoryRepository,
}

impl TextRecognizer for InterviewDuringOcr {
    fn recognize(&self, _image: &RgbImage) -> Result<String, DocumentError> {
        let mut records = self.repository.records.lock().expect("repository mutex poisoned");
        for record in records.values_mut() {
            record.interview = Some(InterviewResult::Approved);
        }
        Ok("PASSPORT X1234567".to_string())
    }
}

#[test]
fn upload_keeps_steps_recorded_while_pipeline_runs() {
    let repository = Arc::new(MemoryRepository::default());
    let validator = DocumentValidator::with_backends(
        InterviewDuringOcr {
            repository: MemoryRepository::clone(&repository),
        },
        AlwaysFace,
    );
    let service = VisaApplicationService::new(repository.clone(), validator).with_clock(today);
    let id = service.select_visa_type("F1").expect("selected").application_id;

    let outcome = service
        .upload_documents(&id, accepted_upload())
        .expect("processed");
    assert!(outcome.verdict.is_accepted());

    let stored = repository.fetch(&id).expect("fetch").expect("present");
    assert_eq!(stored.interview, Some(InterviewResult::Approved));
    assert_eq!(stored.documents.len(), 3);
}

#[test]
fn full_workflow_issues_visa() {
    let (service, repository) = build_service();
    let id = service
        .select_visa_type("F1")
        .expect("selected")
        .application_id;

    service
        .check_eligibility(
            &id,
            EligibilityEvidence {
                admission_letter: Some(true),
                ..EligibilityEvidence::default()
            },
        )
        .expect("eligible");

    let outcome = service
        .upload_documents(&id, accepted_upload())
        .expect("documents processed");
    assert!(outcome.verdict.is_accepted(), "{}", outcome.verdict.message());

    let ds160 = service.submit_ds160(&id, ds160_form()).expect("ds160");
    assert!(ds160.confirmation.0.starts_with("DS160-"));

    let receipt = service
        .pay_fee(
            &id,
            FeePayment {
                amount: 185.0,
                method: PaymentMethod::BankTransfer,
            },
        )
        .expect("fee paid");
    assert!(receipt.confirmation.0.starts_with("PAY-"));

    let appointment = service
        .schedule_appointment(
            &id,
            AppointmentRequest {
                location: " Guadalajara ".to_string(),
                date: monday_after_today(),
            },
        )
        .expect("appointment");
    assert_eq!(appointment.location, "Guadalajara");
    assert!(appointment.confirmation.0.starts_with("APT-"));

    let biometrics = service
        .collect_biometrics(
            &id,
            BiometricsCapture {
                fingerprints_captured: 10,
                photo_captured: true,
            },
        )
        .expect("biometrics");
    assert!(biometrics.0.starts_with("BIO-"));

    service
        .record_interview(&id, InterviewResult::Approved)
        .expect("interview");
    assert_eq!(
        service.process(&id).expect("processed"),
        ProcessingStatus::ReadyForIssuance
    );

    let number = service.issue_visa(&id).expect("visa issued");
    assert!(number.0.starts_with('V'));
    assert_eq!(service.issue_visa(&id).expect("idempotent"), number);

    let stored = repository.fetch(&id).expect("fetch").expect("present");
    let view = stored.status_view();
    assert_eq!(view.stage, "visa_issued");
    assert_eq!(view.completed_steps.len(), 9);
    assert_eq!(view.processing_status, Some("ready_for_issuance"));
}

#[test]
fn processing_requires_interview() {
    let (service, _) = build_service();
    let id = service.select_visa_type("J1").expect("selected").application_id;

    assert!(matches!(
        service.process(&id),
        Err(VisaServiceError::InterviewRequired)
    ));

    service
        .record_interview(&id, InterviewResult::Refused)
        .expect("interview");
    assert_eq!(service.process(&id).expect("processed"), ProcessingStatus::Refused);
}

#[test]
fn step_validation_errors_surface() {
    let (service, _) = build_service();
    let id = service.select_visa_type("H1B").expect("selected").application_id;

    assert!(matches!(
        service.pay_fee(
            &id,
            FeePayment {
                amount: 185.0,
                method: PaymentMethod::Card,
            }
        ),
        Err(VisaServiceError::Step(StepViolation::IncorrectFee { .. }))
    ));
    assert!(matches!(
        service.schedule_appointment(
            &id,
            AppointmentRequest {
                location: "Monterrey".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 10, 19).expect("sunday"),
            }
        ),
        Err(VisaServiceError::Step(StepViolation::AppointmentOnWeekend { .. }))
    ));
    assert!(matches!(
        service.collect_biometrics(
            &id,
            BiometricsCapture {
                fingerprints_captured: 10,
                photo_captured: false,
            }
        ),
        Err(VisaServiceError::Step(StepViolation::IncompleteBiometrics { .. }))
    ));
}

#[test]
fn unknown_application_is_not_found() {
    let (service, _) = build_service();

    match service.get(&ApplicationId("app-999999".to_string())) {
        Err(VisaServiceError::Repository(RepositoryError::NotFound)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn repository_failures_propagate() {
    let service = VisaApplicationService::new(Arc::new(UnavailableRepository), validator());

    assert!(matches!(
        service.select_visa_type("F1"),
        Err(VisaServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
}
