use std::sync::OnceLock;

use chrono::{Datelike, Months, NaiveDate, Weekday};
use regex::Regex;

use super::domain::{
    AppointmentRequest, BiometricsCapture, Ds160Form, EligibilityFlags, FeePayment, VisaType,
};
use super::documents::normalize_passport_number;

const MAX_APPLICANT_AGE_YEARS: u32 = 130;
const REQUIRED_FINGERPRINTS: u8 = 10;
const FEE_TOLERANCE_USD: f64 = 0.005;

/// Input rule violations raised by the workflow steps.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepViolation {
    #[error("F1 visa requires an admission letter from a U.S. educational institution")]
    MissingAdmissionLetter,
    #[error("H1B visa requires a job offer from a U.S. employer")]
    MissingJobOffer,
    #[error("J1 visa requires a sponsor letter from an approved program sponsor")]
    MissingSponsorLetter,
    #[error("invalid DS-160 field '{field}': {reason}")]
    InvalidDs160Field { field: &'static str, reason: String },
    #[error("fee payment must be USD {expected:.2} for {visa_type} visas (received {received:.2})")]
    IncorrectFee {
        visa_type: VisaType,
        expected: f64,
        received: f64,
    },
    #[error("appointment location must not be empty")]
    MissingAppointmentLocation,
    #[error("appointment date {date} must be after {today}")]
    AppointmentNotInFuture { date: NaiveDate, today: NaiveDate },
    #[error("appointments are only available Monday through Friday ({date} is a {weekday})")]
    AppointmentOnWeekend { date: NaiveDate, weekday: Weekday },
    #[error("biometrics require {required} fingerprints and a photo (captured {fingerprints} fingerprints, photo: {photo})")]
    IncompleteBiometrics {
        required: u8,
        fingerprints: u8,
        photo: bool,
    },
}

/// Checks the evidence on file against the selected visa type, returning the
/// confirmation message on success.
pub fn check_eligibility(
    visa_type: VisaType,
    evidence: &EligibilityFlags,
) -> Result<&'static str, StepViolation> {
    match visa_type {
        VisaType::B1B2 => Ok("Eligibility confirmed for B1/B2 visa"),
        VisaType::F1 if evidence.admission_letter => {
            Ok("Eligibility confirmed for F1 visa with admission letter")
        }
        VisaType::F1 => Err(StepViolation::MissingAdmissionLetter),
        VisaType::H1B if evidence.job_offer => Ok("Eligibility confirmed for H1B visa with job offer"),
        VisaType::H1B => Err(StepViolation::MissingJobOffer),
        VisaType::J1 if evidence.sponsor_letter => {
            Ok("Eligibility confirmed for J1 visa with sponsor letter")
        }
        VisaType::J1 => Err(StepViolation::MissingSponsorLetter),
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[\p{L}][\p{L} .'\-]*$").expect("full name pattern compiles")
    })
}

fn passport_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{6,9}$").expect("passport pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
    })
}

fn invalid(field: &'static str, reason: impl Into<String>) -> StepViolation {
    StepViolation::InvalidDs160Field {
        field,
        reason: reason.into(),
    }
}

/// Validates a DS-160 form, returning it with the passport number normalized.
pub fn validate_ds160(form: Ds160Form, today: NaiveDate) -> Result<Ds160Form, StepViolation> {
    let full_name = form.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(invalid("full_name", "must not be empty"));
    }
    if !name_pattern().is_match(&full_name) {
        return Err(invalid(
            "full_name",
            "may only contain letters, spaces, hyphens, apostrophes and periods",
        ));
    }

    if form.date_of_birth >= today {
        return Err(invalid("date_of_birth", "must be in the past"));
    }
    let earliest_birth = today.checked_sub_months(Months::new(MAX_APPLICANT_AGE_YEARS * 12));
    if earliest_birth.is_some_and(|earliest| form.date_of_birth < earliest) {
        return Err(invalid(
            "date_of_birth",
            format!("must be within the last {MAX_APPLICANT_AGE_YEARS} years"),
        ));
    }

    let passport_number = normalize_passport_number(&form.passport_number);
    if !passport_pattern().is_match(&passport_number) {
        return Err(invalid(
            "passport_number",
            "must be 6 to 9 letters or digits",
        ));
    }

    let nationality = form.nationality.trim().to_string();
    if nationality.is_empty() {
        return Err(invalid("nationality", "must not be empty"));
    }

    let email = form.email.trim().to_string();
    if !email_pattern().is_match(&email) {
        return Err(invalid("email", "must be a valid e-mail address"));
    }

    Ok(Ds160Form {
        full_name,
        date_of_birth: form.date_of_birth,
        passport_number,
        nationality,
        email,
    })
}

/// Required fee for a visa type, in US dollars.
pub fn required_fee(visa_type: VisaType) -> f64 {
    visa_type.fee_cents() as f64 / 100.0
}

pub fn validate_fee(visa_type: VisaType, payment: &FeePayment) -> Result<(), StepViolation> {
    let expected = required_fee(visa_type);
    let received = payment.amount;
    if !received.is_finite() || received <= 0.0 || (received - expected).abs() > FEE_TOLERANCE_USD
    {
        return Err(StepViolation::IncorrectFee {
            visa_type,
            expected,
            received,
        });
    }
    Ok(())
}

pub fn validate_appointment(
    request: &AppointmentRequest,
    today: NaiveDate,
) -> Result<(), StepViolation> {
    if request.location.trim().is_empty() {
        return Err(StepViolation::MissingAppointmentLocation);
    }
    if request.date <= today {
        return Err(StepViolation::AppointmentNotInFuture {
            date: request.date,
            today,
        });
    }
    let weekday = request.date.weekday();
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return Err(StepViolation::AppointmentOnWeekend {
            date: request.date,
            weekday,
        });
    }
    Ok(())
}

pub fn validate_biometrics(capture: &BiometricsCapture) -> Result<(), StepViolation> {
    if capture.fingerprints_captured != REQUIRED_FINGERPRINTS || !capture.photo_captured {
        return Err(StepViolation::IncompleteBiometrics {
            required: REQUIRED_FINGERPRINTS,
            fingerprints: capture.fingerprints_captured,
            photo: capture.photo_captured,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::visa::domain::PaymentMethod;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).expect("valid date")
    }

    fn form() -> Ds160Form {
        Ds160Form {
            full_name: " Maria-José O'Neil ".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2).expect("valid date"),
            passport_number: "x12 34567".to_string(),
            nationality: "Mexico".to_string(),
            email: "maria@example.com".to_string(),
        }
    }

    #[test]
    fn eligibility_follows_visa_specific_evidence() {
        let none = EligibilityFlags::default();
        assert!(check_eligibility(VisaType::B1B2, &none).is_ok());
        assert_eq!(
            check_eligibility(VisaType::F1, &none),
            Err(StepViolation::MissingAdmissionLetter)
        );
        assert_eq!(
            check_eligibility(VisaType::H1B, &none),
            Err(StepViolation::MissingJobOffer)
        );
        assert_eq!(
            check_eligibility(VisaType::J1, &none),
            Err(StepViolation::MissingSponsorLetter)
        );

        let offer = EligibilityFlags {
            job_offer: true,
            ..EligibilityFlags::default()
        };
        assert_eq!(
            check_eligibility(VisaType::H1B, &offer),
            Ok("Eligibility confirmed for H1B visa with job offer")
        );
    }

    #[test]
    fn ds160_normalizes_fields() {
        let form = validate_ds160(form(), today()).expect("form accepted");
        assert_eq!(form.full_name, "Maria-José O'Neil");
        assert_eq!(form.passport_number, "X1234567");
    }

    #[test]
    fn ds160_rejects_future_birth_date_and_bad_email() {
        let mut future = form();
        future.date_of_birth = today();
        assert!(matches!(
            validate_ds160(future, today()),
            Err(StepViolation::InvalidDs160Field {
                field: "date_of_birth",
                ..
            })
        ));

        let mut email = form();
        email.email = "maria.example.com".to_string();
        assert!(matches!(
            validate_ds160(email, today()),
            Err(StepViolation::InvalidDs160Field { field: "email", .. })
        ));

        let mut passport = form();
        passport.passport_number = "X1-23".to_string();
        assert!(matches!(
            validate_ds160(passport, today()),
            Err(StepViolation::InvalidDs160Field {
                field: "passport_number",
                ..
            })
        ));
    }

    #[test]
    fn birth_date_limit_counts_whole_calendar_span() {
        let mut oldest = form();
        oldest.date_of_birth = NaiveDate::from_ymd_opt(1895, 10, 15).expect("valid date");
        assert!(validate_ds160(oldest, today()).is_ok());

        let mut too_old = form();
        too_old.date_of_birth = NaiveDate::from_ymd_opt(1895, 1, 1).expect("valid date");
        assert!(matches!(
            validate_ds160(too_old, today()),
            Err(StepViolation::InvalidDs160Field {
                field: "date_of_birth",
                ..
            })
        ));
    }

    #[test]
    fn fee_must_match_visa_type() {
        let payment = FeePayment {
            amount: 185.0,
            method: PaymentMethod::Card,
        };
        assert!(validate_fee(VisaType::F1, &payment).is_ok());
        assert!(matches!(
            validate_fee(VisaType::H1B, &payment),
            Err(StepViolation::IncorrectFee { expected, .. }) if (expected - 205.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn appointment_must_be_future_weekday() {
        let weekday = AppointmentRequest {
            location: "Mexico City".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 20).expect("valid"),
        };
        assert!(validate_appointment(&weekday, today()).is_ok());

        let saturday = AppointmentRequest {
            date: NaiveDate::from_ymd_opt(2025, 10, 18).expect("valid"),
            ..weekday.clone()
        };
        assert!(matches!(
            validate_appointment(&saturday, today()),
            Err(StepViolation::AppointmentOnWeekend { .. })
        ));

        let past = AppointmentRequest {
            date: today(),
            ..weekday
        };
        assert!(matches!(
            validate_appointment(&past, today()),
            Err(StepViolation::AppointmentNotInFuture { .. })
        ));
    }

    #[test]
    fn biometrics_need_all_fingerprints_and_photo() {
        assert!(validate_biometrics(&BiometricsCapture {
            fingerprints_captured: 10,
            photo_captured: true,
        })
        .is_ok());
        assert!(validate_biometrics(&BiometricsCapture {
            fingerprints_captured: 8,
            photo_captured: true,
        })
        .is_err());
    }
}
