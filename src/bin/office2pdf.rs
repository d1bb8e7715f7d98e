//! Lambda binary for office2pdf-lambda.
//!
//! A thin shim over the library crate: maps flags (or their environment
//! variables) to `HandlerConfig`, builds the S3 client once, and serves
//! events through the Lambda runtime. `--local FILE` converts a file on disk
//! instead, which is the quickest way to check a layer or container image.

use anyhow::{anyhow, Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use clap::{Parser, ValueEnum};
use lambda_runtime::{service_fn, LambdaEvent};
use office2pdf_lambda::{
    BlobStore, Engine, EventHandler, HandlerConfig, HandlerResponse, S3BlobStore, S3Event,
    DEFAULT_EXPORT_FILTER,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve S3 events (the Lambda bootstrap runs this with no arguments)
  office2pdf

  # Convert a local file with the packaged LibreOffice
  office2pdf --local ./report.docx --log-format text -v

  # Container image layout instead of the /opt layer
  office2pdf --archive /var/task/lo.tar.gz --scratch-dir /tmp

ENVIRONMENT VARIABLES:
  OFFICE2PDF_ARCHIVE            Compressed LibreOffice archive (default /opt/lo.tar.br)
  OFFICE2PDF_SCRATCH_DIR        Writable scratch root (default /tmp)
  OFFICE2PDF_ENGINE_PATH        soffice.bin relative to the scratch root
  OFFICE2PDF_HOME_DIR           HOME for soffice (default: scratch root)
  OFFICE2PDF_EXPORT_FILTER      --convert-to token (default pdf:writer_pdf_Export)
  OFFICE2PDF_TIMEOUT_SECS       Per-run engine timeout
  OFFICE2PDF_MAX_RETRIES        Retries after a transient engine failure
  OFFICE2PDF_RETRY_BACKOFF_MS   Delay before such a retry
  OFFICE2PDF_LOG_FORMAT         json (default) or text
  AWS_REGION                    S3 region (set by Lambda)
  RUST_LOG                      Log filter, e.g. office2pdf_lambda=debug
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(
    name = "office2pdf",
    version,
    about = "Convert office documents uploaded to S3 into PDF with headless LibreOffice",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Compressed LibreOffice installation (.tar.br, .tar.gz, .tgz or .tar).
    #[arg(long, env = "OFFICE2PDF_ARCHIVE", default_value = lo_unpack::DEFAULT_ARCHIVE_PATH)]
    archive: PathBuf,

    /// Writable directory for the engine install and staged files.
    #[arg(long, env = "OFFICE2PDF_SCRATCH_DIR", default_value = lo_unpack::DEFAULT_TARGET_DIR)]
    scratch_dir: PathBuf,

    /// Engine executable, relative to the scratch directory.
    #[arg(long, env = "OFFICE2PDF_ENGINE_PATH", default_value = lo_unpack::DEFAULT_ENGINE_PATH)]
    engine_path: PathBuf,

    /// HOME for the engine process. Defaults to the scratch directory.
    #[arg(long, env = "OFFICE2PDF_HOME_DIR")]
    home_dir: Option<PathBuf>,

    /// LibreOffice `--convert-to` token.
    #[arg(long, env = "OFFICE2PDF_EXPORT_FILTER", default_value = DEFAULT_EXPORT_FILTER)]
    export_filter: String,

    /// Kill the engine after this many seconds.
    #[arg(long, env = "OFFICE2PDF_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Retries after a transient engine failure (first-start restart).
    #[arg(long, env = "OFFICE2PDF_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// Delay before a retry, in milliseconds.
    #[arg(long, env = "OFFICE2PDF_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// S3 region. Falls back to the SDK's default provider chain.
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Log output format.
    #[arg(long, env = "OFFICE2PDF_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Debug-level logs, including scratch directory listings.
    #[arg(short, long)]
    verbose: bool,

    /// Convert this local file and exit instead of serving events.
    #[arg(long, value_name = "FILE")]
    local: Option<PathBuf>,
}

impl Cli {
    fn handler_config(&self) -> Result<HandlerConfig> {
        let mut builder = HandlerConfig::builder()
            .archive_path(&self.archive)
            .scratch_dir(&self.scratch_dir)
            .engine_relative_path(&self.engine_path)
            .export_filter(&self.export_filter)
            .conversion_timeout_secs(self.timeout_secs)
            .max_conversion_retries(self.max_retries)
            .retry_backoff_ms(self.retry_backoff_ms);
        if let Some(ref home) = self.home_dir {
            builder = builder.home_dir(home);
        }
        builder.build().context("Invalid configuration")
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    match cli.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.handler_config()?;

    // ── Local one-shot mode ──────────────────────────────────────────────
    if let Some(ref input) = cli.local {
        let engine = Engine::from_config(&config);
        let pdf = engine
            .convert_file(input)
            .await
            .with_context(|| format!("Converting {}", input.display()))?;
        println!("{}", pdf.display());
        return Ok(());
    }

    // ── Lambda mode ──────────────────────────────────────────────────────
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(ref region) = cli.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;
    let store: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(aws_sdk_s3::Client::new(&sdk_config)));
    let handler = Arc::new(EventHandler::new(&config, store));

    info!(
        scratch_dir = %config.scratch_dir.display(),
        engine_ready = handler.engine().is_ready(),
        "Waiting for S3 events"
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<S3Event>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<HandlerResponse, lambda_runtime::Error>(handler.handle(&event.payload).await) }
    }))
    .await
    .map_err(|e| anyhow!(e))
}
