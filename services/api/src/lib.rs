mod cli;
mod demo;
mod documents;
mod infra;
mod routes;
mod server;

use visa_workflow::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
