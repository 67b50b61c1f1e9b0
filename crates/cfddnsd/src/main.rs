// # cfddnsd - Cloudflare dynamic DNS daemon
//
// Thin integration layer: parses the command line, loads the configuration,
// sets up logging and the runtime, wires the HTTP IP source and the
// Cloudflare provider into the reconciler, and runs it until SIGINT/SIGTERM.
// All reconciliation logic lives in cfddns-core.
//
// ## Configuration
//
// - `-config <path>` / `--config <path>`: JSON config file (default `config.json`)
// - `CF_API_TOKEN`: overrides the file's `ApiToken` when set and non-empty
// - `--log-level`: trace, debug, info, warn, error (default info)
// - `--dry-run`: look up records but never modify them
//
// ## Example
//
// ```bash
// export CF_API_TOKEN=your_token
// cfddnsd -config /etc/cfddns/config.json
// ```

use anyhow::{Context, Result};
use cfddns_core::{CREDENTIAL_ENV_VAR, Configuration, DEFAULT_CONFIG_PATH, EngineEvent, Reconciler};
use cfddns_ip_http::HttpIpSource;
use cfddns_provider_cloudflare::CloudflareProvider;
use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown, or a missing/invalid configuration file
/// - 1: Startup error (logging setup)
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonExitCode {
    /// Clean shutdown; also used when the configuration cannot be loaded
    CleanShutdown = 0,
    /// Startup failure outside configuration loading
    StartupError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep Cloudflare A records in sync with this host's public IPv4 address
#[derive(Parser, Debug)]
#[command(name = "cfddnsd", version)]
struct Args {
    /// Path to the JSON configuration file (also accepted as `-config`)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, default_value = "info", value_parser = parse_log_level)]
    log_level: Level,

    /// Look up records but do not modify them
    #[arg(long)]
    dry_run: bool,
}

fn parse_log_level(value: &str) -> std::result::Result<Level, String> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(format!(
            "'{}' is not valid. Valid levels: trace, debug, info, warn, error",
            value
        )),
    }
}

/// Accept the single-dash `-config` spelling (any case) as `--config`
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            if arg
                .to_str()
                .is_some_and(|s| s.eq_ignore_ascii_case("-config"))
            {
                OsString::from("--config")
            } else {
                arg
            }
        })
        .collect()
}

/// Load the configuration file, logging every problem found
fn load_config(path: &Path) -> Option<Configuration> {
    match Configuration::load(path) {
        Ok(config) => Some(config),
        Err(cfddns_core::Error::ConfigInvalid(problems)) => {
            for problem in &problems {
                error!("{}", problem);
            }
            None
        }
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Load the configuration and apply the `CF_API_TOKEN` override
///
/// Configuration failures end the process before the loop with a
/// success exit.
fn prepare_config(
    path: &Path,
    env_token: Option<String>,
) -> std::result::Result<Configuration, DaemonExitCode> {
    let Some(mut config) = load_config(path) else {
        error!("Configuration is missing or invalid. Exiting application.");
        return Err(DaemonExitCode::CleanShutdown);
    };

    if config.apply_credential_override(env_token) {
        info!("ApiToken loaded from environment variable {}.", CREDENTIAL_ENV_VAR);
    }

    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse_from(normalize_args(env::args_os()));

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::StartupError.into();
    }

    info!("Starting cfddnsd");

    let config = match prepare_config(&args.config, env::var(CREDENTIAL_ENV_VAR).ok()) {
        Ok(config) => config,
        Err(code) => return code.into(),
    };

    info!(
        "Configuration loaded from {}: {} domain(s)",
        args.config.display(),
        config.domains.len()
    );

    // Single thread shared by the reconciler and the event drain
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, args.dry_run).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Configuration, dry_run: bool) -> Result<()> {
    let shutdown = shutdown_signal()?;

    let ip_source = HttpIpSource::with_timeout(config.ip_echo_url.clone(), config.request_timeout())
        .context("Failed to create IP source")?;

    let provider = CloudflareProvider::new(
        config.api_token.clone(),
        config.zone_id.clone(),
        config.request_timeout(),
        dry_run,
    )
    .context("Failed to create Cloudflare provider")?;

    if dry_run {
        warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
    }

    info!("IP source: {}", ip_source.url());
    for domain in &config.domains {
        info!("Managing record: {}", domain);
    }

    let (mut engine, events) = Reconciler::new(Box::new(ip_source), Box::new(provider), &config)?;
    tokio::spawn(log_events(events));

    engine.run_until(shutdown).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Drain engine events into the debug log so the channel never fills
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "Engine event");
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Handlers are installed before returning so a setup failure is reported
/// at startup rather than swallowed inside the loop.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
