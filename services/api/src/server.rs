use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryApplicationRepository};
use crate::routes::with_visa_routes;
use axum::extract::DefaultBodyLimit;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use visa_workflow::config::AppConfig;
use visa_workflow::error::AppError;
use visa_workflow::telemetry;
use visa_workflow::workflows::visa::documents::OCR_BACKEND;
use visa_workflow::workflows::visa::{DocumentValidator, VisaApplicationService};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryApplicationRepository::default());
    if !cfg!(feature = "ocr-tesseract") {
        warn!("built without ocr-tesseract; passport and supporting documents will fail validation");
    }
    let validator = DocumentValidator::from_config(&config.documents);
    let visa_service = Arc::new(VisaApplicationService::new(repository, validator));

    let app = with_visa_routes(visa_service)
        .layer(DefaultBodyLimit::max(config.documents.max_upload_bytes))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        ocr = OCR_BACKEND,
        ocr_language = %config.documents.ocr_language,
        max_upload_bytes = config.documents.max_upload_bytes,
        "visa application api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
