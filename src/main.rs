mod commands;
mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use cloudiot::gcp::auth::validate_project_id;
use cloudiot::gcp::error::error_hint;
use cloudiot::{CallOptions, ClientOptions, CredentialSource, DeviceManagerClient, LocationName};
use commands::{Command, OutputFormat, Session};
use config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Manage Cloud IoT device registries and devices
#[derive(Parser, Debug)]
#[command(name = "cloudiot", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Cloud region of the registry [default: us-central1]
    #[arg(short, long, global = true)]
    location: Option<String>,

    /// Registry ID for device, gateway and IAM commands
    #[arg(short, long, global = true)]
    registry: Option<String>,

    /// API endpoint, as a host name or a full base URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Use this OAuth2 access token instead of Application Default Credentials
    #[arg(long, global = true, conflicts_with = "key_file")]
    access_token: Option<String>,

    /// Authenticate with a service account key file
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "json")]
    output: OutputFormat,

    /// Per-attempt timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Make a single attempt per call
    #[arg(long, global = true)]
    no_retry: bool,

    /// Log level for debugging (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(level: LogLevel, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| level.directive().map(EnvFilter::new));
    let Some(filter) = filter else {
        return Ok(None);
    };

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {:?}", path))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudiot {} started", env!("CARGO_PKG_VERSION"));
    if let Some(path) = log_file {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

fn credential_source(args: &Args) -> CredentialSource {
    if let Some(token) = &args.access_token {
        return CredentialSource::AccessToken(token.clone());
    }
    if let Some(path) = &args.key_file {
        return CredentialSource::ServiceAccountKey(path.clone());
    }
    CredentialSource::ApplicationDefault
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    if let Command::Config(command) = &args.command {
        let flags = Config {
            project_id: args.project.clone(),
            location: args.location.clone(),
            registry: args.registry.clone(),
        };
        return commands::configure(command, &mut config, flags, args.output);
    }

    let project = config
        .effective_project(args.project.as_deref())
        .context("no project configured; pass --project or run 'cloudiot config set --project <id>'")?;
    if !validate_project_id(&project) {
        bail!("invalid project ID '{}'", project);
    }
    let location = config.effective_location(args.location.as_deref());
    let registry = config.effective_registry(args.registry.as_deref());

    let mut options = ClientOptions::default().with_credentials(credential_source(&args));
    if let Some(endpoint) = &args.endpoint {
        options = options.with_endpoint(endpoint.clone());
    }
    let client = DeviceManagerClient::new(options)
        .await
        .context("creating device manager client")?;

    let mut call = CallOptions::new();
    if let Some(seconds) = args.timeout {
        call = call.with_timeout(Duration::from_secs(seconds));
    }
    if args.no_retry {
        call = call.without_retry();
    }

    let session = Session {
        client,
        location: LocationName::new(project, location),
        registry,
        output: args.output,
        call,
    };

    commands::run(&session, args.command).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = match setup_logging(args.log_level, args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args).await {
        tracing::error!("{err:#}");
        eprintln!("error: {err:#}");
        if let Some(hint) = err.downcast_ref::<cloudiot::Error>().and_then(error_hint) {
            eprintln!("hint: {hint}");
        }
        // Flush buffered log lines before exiting
        drop(log_guard);
        std::process::exit(1);
    }
}
