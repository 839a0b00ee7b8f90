//! KeyCourier - keystroke and serial payload courier
//!
//! Entry point for the CLI binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keycourier::channel::{KeystrokeChannel, OutputChannel, SerialChannel};
use keycourier::config::Config;
use keycourier::portal::PortalSession;
use keycourier::transfer::{
    EventFocusGuard, FocusMonitor, Payload, SecurityLevel, TransferOperation, TransferState,
};
use keycourier::utils::{format_duration, format_user_error};

/// Command-line arguments for keycourier
#[derive(Parser, Debug)]
#[command(name = "keycourier")]
#[command(version, about = "Types clipboard-sized payloads into the focused window", long_about = None)]
pub struct Args {
    /// What to transfer
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path
    #[arg(short, long, env = "KEYCOURIER_CONFIG")]
    pub config: Option<String>,

    /// Security level (pacing) override
    #[arg(short, long, value_enum, env = "KEYCOURIER_LEVEL")]
    pub level: Option<SecurityLevel>,

    /// Chunk size override in bytes (multiple of 3)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Send over the serial link instead of synthetic keystrokes
    #[arg(long)]
    pub serial: bool,

    /// Serial port override
    #[arg(long, env = "KEYCOURIER_SERIAL_PORT")]
    pub serial_port: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Payload source
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Type a text payload into the focused window
    Text {
        /// Literal text; omitted, the payload is read from stdin
        text: Option<String>,
    },
    /// Package files into an archive and send its reconstruction script
    Files {
        /// Files or directories to package
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let config = load_config(&args)?;
    let config = config.with_overrides(args.level, args.chunk_size, args.serial_port.clone());
    config.validate()?;

    let _log_guard = init_logging(&args, &config)?;
    info!("keycourier v{}", env!("CARGO_PKG_VERSION"));

    let payload = build_payload(&args.command)?;
    if payload.is_empty() {
        anyhow::bail!("Payload is empty, nothing to transfer");
    }

    // The event guard is tripped by SIGINT/SIGTERM: on the portal backend
    // the compositor offers no focus query, so the operator is the
    // context-change notifier
    let (guard, monitor) = EventFocusGuard::new();
    spawn_signal_monitor(monitor);

    let channel: Box<dyn OutputChannel> = if args.serial {
        Box::new(SerialChannel::new(config.serial.clone()))
    } else {
        let session = PortalSession::connect().await?;
        Box::new(KeystrokeChannel::new(session.into_keyboard()))
    };

    let mut operation = TransferOperation::new(payload, channel, guard, &config.transfer);
    println!(
        "Estimated runtime: {} (level: {:?})",
        format_duration(operation.estimated_runtime()),
        config.transfer.security_level,
    );

    if !args.yes && !confirm()? {
        println!("Transfer cancelled");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Focus the destination window now; press Ctrl-C to abort.");

    let state = operation.send().await.clone();
    match state {
        TransferState::Completed => {
            let progress = operation.progress();
            println!(
                "Transfer complete: {} fragments, {} units in {}",
                progress.fragments_sent,
                progress.units_sent,
                format_duration(progress.elapsed),
            );
            Ok(ExitCode::SUCCESS)
        }
        TransferState::Aborted(reason) => {
            eprintln!("Transfer aborted: {reason}");
            Ok(ExitCode::FAILURE)
        }
        state => {
            // send() only ever returns a terminal state
            eprintln!("Transfer ended in unexpected state: {state:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_payload(command: &Command) -> Result<Payload> {
    match command {
        Command::Text { text } => {
            let content = match text {
                Some(text) => text.clone(),
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read payload from stdin")?;
                    buf
                }
            };
            Ok(Payload::text(&content))
        }
        Command::Files { paths } => {
            Payload::archive(paths).context("Failed to stage archive payload")
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return Config::load(path);
    }
    if let Some(default) = Config::default_path() {
        if default.exists() {
            return Config::load(&default.to_string_lossy());
        }
    }
    Ok(Config::default())
}

fn confirm() -> Result<bool> {
    print!("Proceed? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn spawn_signal_monitor(monitor: FocusMonitor) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        warn!("Abort signal received, stopping after the current fragment");
        monitor.focus_changed();
    });
}

fn init_logging(
    args: &Args,
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "keycourier={level},ashpd=info,zbus=warn,warn",
            level = log_level
        ))
    });

    let log_format = args
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());
    let log_file = args.log_file.clone().or_else(|| config.logging.file.clone());

    // If a log file is specified, write to both stderr and the file
    if let Some(log_file_path) = &log_file {
        let file = std::fs::File::create(log_file_path)
            .context(format!("Failed to create log file: {}", log_file_path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);

        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        info!("Logging to file: {}", log_file_path.display());
        Ok(Some(guard))
    } else {
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
        Ok(None)
    }
}
