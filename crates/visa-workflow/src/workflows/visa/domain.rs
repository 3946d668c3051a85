use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for visa applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Step confirmation handed back to the applicant, e.g. `DS160-3F9A0C12BE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationId(pub String);

impl ConfirmationId {
    pub fn generate(prefix: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("{prefix}-{}", &token[..10]))
    }
}

impl fmt::Display for ConfirmationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Nonimmigrant visa categories supported by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisaType {
    #[serde(rename = "B1/B2")]
    B1B2,
    #[serde(rename = "F1")]
    F1,
    #[serde(rename = "H1B")]
    H1B,
    #[serde(rename = "J1")]
    J1,
}

impl VisaType {
    pub const fn ordered() -> [Self; 4] {
        [Self::B1B2, Self::F1, Self::H1B, Self::J1]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::B1B2 => "B1/B2",
            Self::F1 => "F1",
            Self::H1B => "H1B",
            Self::J1 => "J1",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::B1B2 => "Business/Tourism visa",
            Self::F1 => "Student visa",
            Self::H1B => "Specialty occupation worker visa",
            Self::J1 => "Exchange visitor visa",
        }
    }

    /// Machine-readable visa fee in US cents.
    pub const fn fee_cents(self) -> u64 {
        match self {
            Self::H1B => 20_500,
            Self::B1B2 | Self::F1 | Self::J1 => 18_500,
        }
    }
}

impl fmt::Display for VisaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VisaTypeError {
    #[error("Visa type must be a non-empty string")]
    Empty,
    #[error("Invalid visa type '{0}'. Valid types are: B1/B2, F1, H1B, J1")]
    Unknown(String),
}

impl FromStr for VisaType {
    type Err = VisaTypeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(VisaTypeError::Empty);
        }

        Self::ordered()
            .into_iter()
            .find(|visa_type| visa_type.label() == raw)
            .ok_or_else(|| VisaTypeError::Unknown(raw.to_string()))
    }
}

/// Supporting evidence flags collected during the eligibility step. Absent
/// fields leave the previously recorded value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityEvidence {
    #[serde(default)]
    pub admission_letter: Option<bool>,
    #[serde(default)]
    pub job_offer: Option<bool>,
    #[serde(default)]
    pub sponsor_letter: Option<bool>,
}

/// Evidence currently on file for an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityFlags {
    pub admission_letter: bool,
    pub job_offer: bool,
    pub sponsor_letter: bool,
}

impl EligibilityFlags {
    pub fn merge(&mut self, evidence: EligibilityEvidence) {
        if let Some(value) = evidence.admission_letter {
            self.admission_letter = value;
        }
        if let Some(value) = evidence.job_offer {
            self.job_offer = value;
        }
        if let Some(value) = evidence.sponsor_letter {
            self.sponsor_letter = value;
        }
    }
}

/// DS-160 online nonimmigrant application form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ds160Form {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub passport_number: String,
    pub nationality: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Cash,
}

/// Fee payment instruction; `amount` is in US dollars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeePayment {
    pub amount: f64,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub location: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricsCapture {
    pub fingerprints_captured: u8,
    pub photo_captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewResult {
    Approved,
    Refused,
    AdministrativeProcessing,
}

impl InterviewResult {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Refused => "refused",
            Self::AdministrativeProcessing => "administrative_processing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    ReadyForIssuance,
    AdministrativeProcessing,
    Refused,
}

impl ProcessingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadyForIssuance => "ready_for_issuance",
            Self::AdministrativeProcessing => "administrative_processing",
            Self::Refused => "refused",
        }
    }
}

/// Ordered workflow steps, used to report progress on the status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    VisaTypeSelected,
    DocumentsUploaded,
    Ds160Submitted,
    FeePaid,
    AppointmentScheduled,
    BiometricsCollected,
    Interviewed,
    Processed,
    VisaIssued,
}

impl WorkflowStep {
    pub const fn label(self) -> &'static str {
        match self {
            Self::VisaTypeSelected => "visa_type_selected",
            Self::DocumentsUploaded => "documents_uploaded",
            Self::Ds160Submitted => "ds160_submitted",
            Self::FeePaid => "fee_paid",
            Self::AppointmentScheduled => "appointment_scheduled",
            Self::BiometricsCollected => "biometrics_collected",
            Self::Interviewed => "interviewed",
            Self::Processed => "processed",
            Self::VisaIssued => "visa_issued",
        }
    }
}

/// Accepted DS-160 form with its confirmation number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ds160Submission {
    pub form: Ds160Form,
    pub confirmation: ConfirmationId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub amount: f64,
    pub method: PaymentMethod,
    pub confirmation: ConfirmationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAppointment {
    pub location: String,
    pub date: NaiveDate,
    pub confirmation: ConfirmationId,
}

/// Issued visa foil number, `V` followed by eight digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaNumber(pub String);

impl VisaNumber {
    pub fn generate() -> Self {
        let digits = Uuid::new_v4().as_u128() % 100_000_000;
        Self(format!("V{digits:08}"))
    }
}

impl fmt::Display for VisaNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
