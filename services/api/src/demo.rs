use crate::infra::{parse_date, InMemoryApplicationRepository};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use clap::Args;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use visa_workflow::error::AppError;
use visa_workflow::workflows::visa::documents::{
    CascadeFaceDetector, DocumentError, TextRecognizer,
};
use visa_workflow::workflows::visa::{
    AppointmentRequest, ApplicationRepository, BiometricsCapture, DocumentUpload,
    DocumentValidator, Ds160Form, EligibilityEvidence, FeePayment, InterviewResult,
    PaymentMethod, VisaApplicationService, VisaType,
};

const DEMO_PASSPORT_NUMBER: &str = "X1234567";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Visa type to apply for (B1/B2, F1, H1B, J1)
    #[arg(long, default_value = "F1")]
    pub(crate) visa_type: String,
    /// Interview outcome to record (approved, refused, administrative_processing)
    #[arg(long, default_value = "approved", value_parser = parse_interview_result)]
    pub(crate) interview: InterviewResult,
    /// Submit a photo without a face so the upload is rejected
    #[arg(long)]
    pub(crate) faceless_photo: bool,
    /// Consulate appointment date (YYYY-MM-DD); defaults to the next weekday
    #[arg(long, value_parser = parse_date)]
    pub(crate) appointment_date: Option<NaiveDate>,
}

fn parse_interview_result(raw: &str) -> Result<InterviewResult, String> {
    match raw.trim() {
        "approved" => Ok(InterviewResult::Approved),
        "refused" => Ok(InterviewResult::Refused),
        "administrative_processing" => Ok(InterviewResult::AdministrativeProcessing),
        other => Err(format!(
            "unknown interview result '{other}' (expected approved, refused or administrative_processing)"
        )),
    }
}

/// Stand-in OCR engine so the demo runs without tesseract installed.
struct DemoScanner;

impl TextRecognizer for DemoScanner {
    fn recognize(&self, image: &RgbImage) -> Result<String, DocumentError> {
        if image.width() > image.height() {
            Ok(format!(
                "PASSPORT\nUNITED MEXICAN STATES\nNo. {DEMO_PASSPORT_NUMBER}\nGARCIA LOPEZ LUCIA"
            ))
        } else {
            Ok("FORM I-20 CERTIFICATE OF ELIGIBILITY".to_string())
        }
    }
}

fn encode(image: GrayImage) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?;
    Ok(bytes)
}

/// Passport-style portrait: light face with dark eyes and mouth on a
/// mid-gray backdrop, laid out on a 24-unit grid.
fn portrait(faceless: bool) -> GrayImage {
    let (canvas, side, origin) = (128u32, 64u32, 32u32);
    let unit = side as f32 / 24.0;
    GrayImage::from_fn(canvas, canvas, |x, y| {
        if faceless || x < origin || y < origin || x >= origin + side || y >= origin + side {
            return Luma([90]);
        }
        let ux = (x - origin) as f32 / unit;
        let uy = (y - origin) as f32 / unit;
        let eyes = (7.0..11.0).contains(&uy)
            && ((4.0..10.0).contains(&ux) || (14.0..20.0).contains(&ux));
        let mouth = (18.0..21.0).contains(&uy) && (8.0..16.0).contains(&ux);
        if eyes {
            Luma([30])
        } else if mouth {
            Luma([60])
        } else {
            Luma([200])
        }
    })
}

fn next_weekday_after(today: NaiveDate) -> NaiveDate {
    let mut date = today + Duration::days(1);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date
}

fn evidence_for(visa_type: VisaType) -> EligibilityEvidence {
    EligibilityEvidence {
        admission_letter: Some(visa_type == VisaType::F1),
        job_offer: Some(visa_type == VisaType::H1B),
        sponsor_letter: Some(visa_type == VisaType::J1),
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        visa_type,
        interview,
        faceless_photo,
        appointment_date,
    } = args;

    println!("Visa application workflow demo");
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let validator = DocumentValidator::with_backends(DemoScanner, CascadeFaceDetector::default());
    let service = VisaApplicationService::new(repository.clone(), validator);

    let record = match service.select_visa_type(&visa_type) {
        Ok(record) => record,
        Err(err) => {
            println!("  Visa type rejected: {}", err);
            return Ok(());
        }
    };
    let id = record.application_id.clone();
    println!(
        "1. Visa type '{}' selected -> application {}",
        record.visa_type, id.0
    );
    println!("   {}", record.visa_type.description());

    let message = service.check_eligibility(&id, evidence_for(record.visa_type))?;
    println!("2. {}", message);

    let upload = DocumentUpload {
        passport: Some(encode(GrayImage::from_pixel(240, 160, Luma([235])))?),
        photo: Some(encode(portrait(faceless_photo))?),
        supporting_documents: vec![encode(GrayImage::from_pixel(120, 170, Luma([240])))?],
        passport_number: Some(DEMO_PASSPORT_NUMBER.to_string()),
    };
    let outcome = service.upload_documents(&id, upload)?;
    println!(
        "3. {} ({} documents processed)",
        outcome.verdict.message(),
        outcome.report.documents_processed
    );
    for (key, result) in &outcome.report.validation_results {
        let mark = if result.validation_passed { "ok" } else { "FAILED" };
        println!("   - {key}: {mark} ({})", result.validation_message);
    }

    let ds160 = service.submit_ds160(
        &id,
        Ds160Form {
            full_name: "Lucia Garcia Lopez".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 12).unwrap_or_default(),
            passport_number: DEMO_PASSPORT_NUMBER.to_string(),
            nationality: "Mexico".to_string(),
            email: "lucia.garcia@example.com".to_string(),
        },
    )?;
    println!("4. DS-160 submitted -> {}", ds160.confirmation);

    let receipt = service.pay_fee(
        &id,
        FeePayment {
            amount: record.visa_type.fee_cents() as f64 / 100.0,
            method: PaymentMethod::Card,
        },
    )?;
    println!(
        "5. Fee of USD {:.2} paid by {:?} -> {}",
        receipt.amount, receipt.method, receipt.confirmation
    );

    let appointment = service.schedule_appointment(
        &id,
        AppointmentRequest {
            location: "U.S. Consulate General Guadalajara".to_string(),
            date: appointment_date.unwrap_or_else(|| next_weekday_after(Utc::now().date_naive())),
        },
    )?;
    println!(
        "6. Appointment at {} on {} -> {}",
        appointment.location, appointment.date, appointment.confirmation
    );

    let biometrics = service.collect_biometrics(
        &id,
        BiometricsCapture {
            fingerprints_captured: 10,
            photo_captured: true,
        },
    )?;
    println!("7. Biometrics collected -> {}", biometrics);

    service.record_interview(&id, interview)?;
    println!("8. Interview result: {}", interview.label());

    let status = service.process(&id)?;
    println!("9. Processing status: {}", status.label());

    match service.issue_visa(&id) {
        Ok(number) => println!("10. Visa issued: {}", number),
        Err(err) => println!("10. {}", err),
    }

    let stored_view = match repository.fetch(&id) {
        Ok(Some(record)) => record.status_view(),
        Ok(None) => {
            println!("  Repository lookup returned no record");
            return Ok(());
        }
        Err(err) => {
            println!("  Repository unavailable: {}", err);
            return Ok(());
        }
    };
    match serde_json::to_string_pretty(&stored_view) {
        Ok(json) => println!("Public status payload:\n{}", json),
        Err(err) => println!("Public status payload unavailable: {}", err),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use visa_workflow::workflows::visa::documents::FaceDetector;

    #[test]
    fn next_weekday_skips_weekends() {
        let friday = NaiveDate::from_ymd_opt(2025, 10, 17).expect("valid");
        assert_eq!(
            next_weekday_after(friday),
            NaiveDate::from_ymd_opt(2025, 10, 20).expect("valid")
        );
    }

    #[test]
    fn demo_portrait_contains_a_face() {
        let detector = CascadeFaceDetector::default();
        assert!(!detector.detect(&portrait(false)).is_empty());
        assert!(detector.detect(&portrait(true)).is_empty());
    }

    #[test]
    fn interview_results_parse_from_labels() {
        assert_eq!(
            parse_interview_result("administrative_processing"),
            Ok(InterviewResult::AdministrativeProcessing)
        );
        assert!(parse_interview_result("maybe").is_err());
    }

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            visa_type: "H1B".to_string(),
            interview: InterviewResult::Approved,
            faceless_photo: false,
            appointment_date: None,
        })
        .expect("demo completes");
    }
}
