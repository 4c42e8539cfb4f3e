//! s3blob -- command-line blobstore adapter for S3-compatible object stores.
//!
//! Each invocation loads a configuration file, performs exactly one
//! operation, and exits. Exit status is 0 on success, 3 when `exists`
//! finds no object, and 1 on any error.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use s3blob::blobstore::{Blobstore, STATUS_TARGET};
use s3blob::errors::BlobstoreError;

/// Exit status of `exists` when the object is absent.
const EXIT_NOT_FOUND: u8 = 3;

/// Filter used when `RUST_LOG` is not set. SDK internals stay quiet.
/// Status lines under [`STATUS_TARGET`] are enabled on top of either.
const DEFAULT_LOG_FILTER: &str =
    "info,aws_config=warn,aws_sdk_s3=warn,aws_smithy_runtime=warn,aws_smithy_http_client=warn";

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "s3blob",
    version,
    about = "Blobstore adapter for S3-compatible object stores"
)]
struct Cli {
    /// Path to the JSON or YAML configuration file.
    config: PathBuf,

    #[command(subcommand)]
    command: Command,

    /// Abort the operation after this many seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download object SRC into local file DEST (overwritten).
    Get { src: String, dest: PathBuf },
    /// Upload local file SRC as object DEST.
    Put { src: PathBuf, dest: String },
    /// Delete object DEST; succeeds if it is already absent.
    Delete { dest: String },
    /// Check whether object DEST exists (exit 3 if not).
    Exists { dest: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Result of a successful invocation.
enum Outcome {
    Done,
    Missing,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.log_format) {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Missing) => ExitCode::from(EXIT_NOT_FOUND),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing on stderr; stdout stays free for callers.
fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
        .add_directive(format!("{STATUS_TARGET}=info").parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal());

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    debug!("Loading configuration from {}", cli.config.display());
    let settings = s3blob::config::load_config(&cli.config)?;
    let blobstore = Blobstore::connect(settings).await?;

    let operation = execute(&blobstore, cli.command);
    let outcome = match cli.timeout {
        Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), operation)
            .await
            .map_err(|_| BlobstoreError::Timeout { seconds })??,
        None => operation.await?,
    };
    Ok(outcome)
}

async fn execute(blobstore: &Blobstore, command: Command) -> Result<Outcome, BlobstoreError> {
    match command {
        Command::Get { src, dest } => {
            blobstore.get_file(&src, &dest).await?;
            Ok(Outcome::Done)
        }
        Command::Put { src, dest } => {
            blobstore.put_file(&src, &dest).await?;
            Ok(Outcome::Done)
        }
        Command::Delete { dest } => {
            blobstore.delete(&dest).await?;
            Ok(Outcome::Done)
        }
        Command::Exists { dest } => {
            if blobstore.exists(&dest).await? {
                Ok(Outcome::Done)
            } else {
                Ok(Outcome::Missing)
            }
        }
    }
}
