use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use visa_workflow::config::AppConfig;
use visa_workflow::error::AppError;
use visa_workflow::workflows::visa::{DocumentBatchReport, DocumentUpload, DocumentValidator};

#[derive(Args, Debug, Default)]
pub(crate) struct ValidateArgs {
    /// Passport image
    #[arg(long)]
    pub(crate) passport: Option<PathBuf>,
    /// Applicant photo
    #[arg(long)]
    pub(crate) photo: Option<PathBuf>,
    /// Supporting document image; repeat for several documents
    #[arg(long = "supporting")]
    pub(crate) supporting: Vec<PathBuf>,
    /// Passport number expected on the passport image
    #[arg(long)]
    pub(crate) passport_number: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidationOutput<'a> {
    accepted: bool,
    message: String,
    #[serde(flatten)]
    report: &'a DocumentBatchReport,
}

fn read(path: Option<PathBuf>) -> Result<Option<Vec<u8>>, AppError> {
    path.map(std::fs::read).transpose().map_err(AppError::from)
}

pub(crate) fn load_upload(args: ValidateArgs) -> Result<DocumentUpload, AppError> {
    let ValidateArgs {
        passport,
        photo,
        supporting,
        passport_number,
    } = args;

    Ok(DocumentUpload {
        passport: read(passport)?,
        photo: read(photo)?,
        supporting_documents: supporting
            .into_iter()
            .map(std::fs::read)
            .collect::<Result<_, _>>()?,
        passport_number,
    })
}

pub(crate) fn run_validate(args: ValidateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let upload = load_upload(args)?;

    let validator = DocumentValidator::from_config(&config.documents);
    let report = validator.validate_batch(upload.into_submissions())?;
    let verdict = report.verdict();

    let output = ValidationOutput {
        accepted: verdict.is_accepted(),
        message: verdict.message(),
        report: &report,
    };
    let json = serde_json::to_string_pretty(&output).map_err(std::io::Error::from)?;
    println!("{json}");
    Ok(())
}
