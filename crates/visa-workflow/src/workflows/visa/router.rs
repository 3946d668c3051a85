use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::documents::{BatchVerdict, DocumentUpload};
use super::domain::{
    AppointmentRequest, ApplicationId, BiometricsCapture, Ds160Form, EligibilityEvidence,
    FeePayment, InterviewResult, VisaType, VisaTypeError,
};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{VisaApplicationService, VisaServiceError};

type SharedService<R> = Arc<VisaApplicationService<R>>;

/// Router exposing every workflow step under `/api/v1`.
pub fn visa_router<R>(service: SharedService<R>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route("/api/v1/visa_types", get(visa_types_handler))
        .route("/api/v1/select_visa_type", post(select_handler::<R>))
        .route("/api/v1/applications/:application_id", get(status_handler::<R>))
        .route(
            "/api/v1/applications/:application_id/eligibility",
            post(eligibility_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            post(documents_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/ds160",
            post(ds160_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/payment",
            post(payment_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/appointment",
            post(appointment_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/biometrics",
            post(biometrics_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/interview",
            post(interview_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/processing",
            post(processing_handler::<R>),
        )
        .route(
            "/api/v1/applications/:application_id/issuance",
            post(issuance_handler::<R>),
        )
        .with_state(service)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "status": "error",
        "message": message.into(),
    });
    (status, Json(payload)).into_response()
}

fn success(message: impl Into<String>, data: Value) -> Response {
    let mut payload = json!({
        "status": "success",
        "message": message.into(),
    });
    if let (Some(target), Value::Object(fields)) = (payload.as_object_mut(), data) {
        target.extend(fields);
    }
    (StatusCode::OK, Json(payload)).into_response()
}

/// Unwraps a JSON body, turning extractor rejections (bad syntax, wrong
/// shape, missing content type) into the error envelope with axum's status.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(rejection.status(), rejection.body_text()))
}

/// Maps service errors onto HTTP statuses.
fn service_error(err: VisaServiceError) -> Response {
    match err {
        VisaServiceError::VisaType(err) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        VisaServiceError::Repository(RepositoryError::NotFound) => {
            error_response(StatusCode::NOT_FOUND, "Application not found")
        }
        VisaServiceError::Repository(RepositoryError::Conflict) => {
            error_response(StatusCode::CONFLICT, "Application already exists")
        }
        VisaServiceError::Repository(err @ RepositoryError::Unavailable(_)) => {
            error!(error = %err, "application repository failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        other => error_response(StatusCode::BAD_REQUEST, other.to_string()),
    }
}

pub(crate) async fn visa_types_handler() -> Response {
    let visa_types: Vec<&str> = VisaType::ordered().iter().map(|t| t.label()).collect();
    let descriptions: BTreeMap<&str, &str> = VisaType::ordered()
        .iter()
        .map(|t| (t.label(), t.description()))
        .collect();
    Json(json!({
        "visa_types": visa_types,
        "descriptions": descriptions,
    }))
    .into_response()
}

/// Selection body. The field is kept loose so missing or non-string values
/// get the same error envelope as unknown visa types.
#[derive(Debug, Default, Deserialize)]
pub struct SelectVisaTypeRequest {
    #[serde(default)]
    pub visa_type: Option<Value>,
}

pub(crate) async fn select_handler<R>(
    State(service): State<SharedService<R>>,
    payload: Result<Json<SelectVisaTypeRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let raw = match request.visa_type {
        Some(Value::String(raw)) => raw,
        _ => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                VisaTypeError::Empty.to_string(),
            )
        }
    };

    match service.select_visa_type(&raw) {
        Ok(record) => success(
            format!("Visa type '{}' selected successfully", record.visa_type),
            json!({
                "application_id": record.application_id,
                "visa_type": record.visa_type,
            }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn eligibility_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<EligibilityEvidence>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let evidence = match json_body(payload) {
        Ok(evidence) => evidence,
        Err(response) => return response,
    };
    match service.check_eligibility(&ApplicationId(application_id), evidence) {
        Ok(message) => success(message, json!({ "eligible": true })),
        Err(err) => service_error(err),
    }
}

/// Upload body; image fields carry base64-encoded bytes.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentUploadRequest {
    #[serde(default)]
    pub passport: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub supporting_documents: Vec<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid base64 data for '{field}'")]
pub struct InvalidEncoding {
    field: String,
}

impl DocumentUploadRequest {
    pub fn decode(self) -> Result<DocumentUpload, InvalidEncoding> {
        fn decode_field(field: String, data: &str) -> Result<Vec<u8>, InvalidEncoding> {
            STANDARD
                .decode(data.trim())
                .map_err(|_| InvalidEncoding { field })
        }

        let passport = self
            .passport
            .map(|data| decode_field("passport".to_string(), &data))
            .transpose()?;
        let photo = self
            .photo
            .map(|data| decode_field("photo".to_string(), &data))
            .transpose()?;
        let supporting_documents = self
            .supporting_documents
            .iter()
            .enumerate()
            .map(|(index, data)| decode_field(format!("supporting_documents[{index}]"), data))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentUpload {
            passport,
            photo,
            supporting_documents,
            passport_number: self.passport_number,
        })
    }
}

pub(crate) async fn documents_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<DocumentUploadRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let upload = match request.decode() {
        Ok(upload) => upload,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let id = ApplicationId(application_id);
    let outcome =
        tokio::task::spawn_blocking(move || service.upload_documents(&id, upload)).await;

    let outcome = match outcome {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => return service_error(err),
        Err(join_error) => {
            error!(error = %join_error, "document validation task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let report = &outcome.report;
    match &outcome.verdict {
        BatchVerdict::Accepted => success(
            outcome.verdict.message(),
            json!({
                "documents_processed": report.documents_processed,
                "validation_results": report.validation_results,
                "extracted_text": report.extracted_text,
            }),
        ),
        BatchVerdict::Rejected { failed } => {
            let payload = json!({
                "status": "error",
                "message": outcome.verdict.message(),
                "failed_validations": failed,
                "documents_processed": report.documents_processed,
                "validation_results": report.validation_results,
                "extracted_text": report.extracted_text,
            });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn ds160_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<Ds160Form>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let form = match json_body(payload) {
        Ok(form) => form,
        Err(response) => return response,
    };
    match service.submit_ds160(&ApplicationId(application_id), form) {
        Ok(submission) => success(
            "DS-160 form submitted successfully",
            json!({ "confirmation_number": submission.confirmation }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn payment_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<FeePayment>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let payment = match json_body(payload) {
        Ok(payment) => payment,
        Err(response) => return response,
    };
    match service.pay_fee(&ApplicationId(application_id), payment) {
        Ok(receipt) => success(
            "Visa fee paid successfully",
            json!({
                "confirmation_number": receipt.confirmation,
                "amount": receipt.amount,
                "method": receipt.method,
            }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn appointment_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<AppointmentRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match service.schedule_appointment(&ApplicationId(application_id), request) {
        Ok(appointment) => success(
            "Appointment scheduled successfully",
            json!({
                "confirmation_number": appointment.confirmation,
                "location": appointment.location,
                "date": appointment.date,
            }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn biometrics_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<BiometricsCapture>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let capture = match json_body(payload) {
        Ok(capture) => capture,
        Err(response) => return response,
    };
    match service.collect_biometrics(&ApplicationId(application_id), capture) {
        Ok(confirmation) => success(
            "Biometrics collected successfully",
            json!({ "confirmation_number": confirmation }),
        ),
        Err(err) => service_error(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct InterviewRequest {
    pub result: InterviewResult,
}

pub(crate) async fn interview_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<InterviewRequest>, JsonRejection>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match service.record_interview(&ApplicationId(application_id), request.result) {
        Ok(result) => success(
            "Interview result recorded",
            json!({ "interview_result": result.label() }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn processing_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.process(&ApplicationId(application_id)) {
        Ok(status) => success(
            "Application processed",
            json!({ "processing_status": status.label() }),
        ),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn issuance_handler<R>(
    State(service): State<SharedService<R>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.issue_visa(&ApplicationId(application_id)) {
        Ok(number) => success("Visa issued successfully", json!({ "visa_number": number })),
        Err(err) => service_error(err),
    }
}
