use crate::demo::{run_demo, DemoArgs};
use crate::documents::{run_validate, ValidateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use visa_workflow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Visa Application Workflow",
    about = "Run the U.S. visa application API or exercise its workflow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk an application through every workflow step with in-memory storage
    Demo(DemoArgs),
    /// Run the document pipeline on local image files
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DocumentsCommand {
    /// Validate passport, photo and supporting document images and print the report
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Documents {
            command: DocumentsCommand::Validate(args),
        } => run_validate(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve() {
        let cli = Cli::try_parse_from(["visa-workflow-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_repeated_supporting_documents() {
        let cli = Cli::try_parse_from([
            "visa-workflow-api",
            "documents",
            "validate",
            "--passport",
            "passport.png",
            "--supporting",
            "i20.png",
            "--supporting",
            "bank.png",
            "--passport-number",
            "X1234567",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Documents {
                command: DocumentsCommand::Validate(args),
            }) => {
                assert_eq!(args.supporting.len(), 2);
                assert_eq!(args.passport_number.as_deref(), Some("X1234567"));
                assert!(args.photo.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn demo_appointment_date_is_parsed() {
        let cli = Cli::try_parse_from([
            "visa-workflow-api",
            "demo",
            "--appointment-date",
            "2025-10-20",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Demo(args)) => assert_eq!(
                args.appointment_date,
                chrono::NaiveDate::from_ymd_opt(2025, 10, 20)
            ),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "visa-workflow-api",
            "demo",
            "--appointment-date",
            "20/10/2025",
        ])
        .is_err());
    }
}
