use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use serde_json::Value;

use crate::workflows::visa::documents::face::tests::synthetic_face;
use crate::workflows::visa::documents::{
    CascadeFaceDetector, DocumentError, DocumentValidator, FaceDetector, FaceRegion,
    TextRecognizer,
};
use crate::workflows::visa::domain::{ApplicationId, Ds160Form};
use crate::workflows::visa::repository::{
    ApplicationRecord, ApplicationRepository, RepositoryError,
};
use crate::workflows::visa::{visa_router, VisaApplicationService};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 15).expect("valid date")
}

/// Recognizer returning canned text keyed by image width, so each test
/// document can "say" something different.
#[derive(Clone, Default)]
pub(super) struct ScriptedRecognizer {
    by_width: Arc<HashMap<u32, String>>,
}

impl ScriptedRecognizer {
    pub(super) fn new(script: &[(u32, &str)]) -> Self {
        let by_width = script
            .iter()
            .map(|(width, text)| (*width, text.to_string()))
            .collect();
        Self {
            by_width: Arc::new(by_width),
        }
    }
}

impl TextRecognizer for ScriptedRecognizer {
    fn recognize(&self, image: &RgbImage) -> Result<String, DocumentError> {
        Ok(self
            .by_width
            .get(&image.width())
            .cloned()
            .unwrap_or_default())
    }
}

pub(super) struct OfflineRecognizer;

impl TextRecognizer for OfflineRecognizer {
    fn recognize(&self, _image: &RgbImage) -> Result<String, DocumentError> {
        Err(DocumentError::Recognition("ocr engine offline".to_string()))
    }
}

/// Detector reporting one fixed face for every image.
pub(super) struct AlwaysFace;

impl FaceDetector for AlwaysFace {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceRegion> {
        vec![FaceRegion {
            x: 0,
            y: 0,
            width: gray.width(),
            height: gray.height(),
            neighbors: 6,
        }]
    }
}

pub(super) const PASSPORT_WIDTH: u32 = 40;
pub(super) const SUPPORTING_WIDTH: u32 = 36;
pub(super) const BLANK_WIDTH: u32 = 32;

pub(super) fn png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub(super) fn document_png(width: u32) -> Vec<u8> {
    png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        20,
        Luma([230]),
    )))
}

pub(super) fn face_png() -> Vec<u8> {
    png(DynamicImage::ImageLuma8(synthetic_face(128, 64, (32, 32))))
}

pub(super) fn blank_photo_png() -> Vec<u8> {
    png(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        128,
        128,
        Luma([140]),
    )))
}

pub(super) fn scripted_recognizer() -> ScriptedRecognizer {
    ScriptedRecognizer::new(&[
        (
            PASSPORT_WIDTH,
            "UNITED MEXICAN STATES\nPASSPORT No. X12 34567\nGARCIA LOPEZ",
        ),
        (SUPPORTING_WIDTH, "Certificate of Eligibility I-20"),
        (BLANK_WIDTH, "   \n"),
    ])
}

/// Scripted OCR plus the real cascade detector.
pub(super) fn validator() -> DocumentValidator {
    DocumentValidator::with_backends(scripted_recognizer(), CascadeFaceDetector::default())
}

pub(super) fn ds160_form() -> Ds160Form {
    Ds160Form {
        full_name: "Lucia Garcia Lopez".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 12).expect("valid date"),
        passport_number: "X1234567".to_string(),
        nationality: "Mexico".to_string(),
        email: "lucia@example.com".to_string(),
    }
}

pub(super) fn build_service() -> (VisaApplicationService<MemoryRepository>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = VisaApplicationService::new(repository.clone(), validator()).with_clock(today);
    (service, repository)
}

pub(super) fn router_with_service<R>(service: VisaApplicationService<R>) -> axum::Router
where
    R: ApplicationRepository + 'static,
{
    visa_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.application_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
