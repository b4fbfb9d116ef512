//! Entry point for the waitline queue service and its command line client
//!
//! `waitline serve` runs the authoritative HTTP binding. Every other
//! sub-command performs one queue operation against that service and falls
//! back to the local mirror file when it cannot be reached.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use waitline::config::AppConfig;
use waitline::replica::{AccessPolicy, ReplicaSync, Synced};
use waitline::service::{AppState, HttpServer};
use waitline::store::{RemoteQueueStore, SnapshotQueueStore};
use waitline::types::{Ack, CreateQueueRequest, JoinResponse, DEFAULT_QUEUE_ID};
use waitline::wait_time::format_wait;

/// Waitline - virtual waiting lines with wait-time estimates
#[derive(Parser)]
#[command(
    name = "waitline",
    version,
    about = "Virtual waiting lines with wait-time estimation",
    long_about = "Waitline keeps ordered waiting lines, estimates the wait from recently \
                 observed service durations, and keeps working from a local mirror file \
                 while the queue service is unreachable."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Queue service URL override
    #[arg(long, global = true, value_name = "URL", help = "Override the queue service URL")]
    api_base: Option<String>,

    /// Mirror file override
    #[arg(long, global = true, value_name = "FILE", help = "Override the local mirror file")]
    snapshot: Option<PathBuf>,

    /// Handle of the person issuing the command
    #[arg(
        long = "as",
        global = true,
        value_name = "HANDLE",
        help = "Act as this handle (privileged handles may clear and delete)"
    )]
    as_handle: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue service
    Serve {
        #[arg(long, value_name = "HOST")]
        host: Option<String>,
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
        /// Validate configuration and exit without starting the service
        #[arg(long)]
        dry_run: bool,
    },
    /// List all queues
    List,
    /// Create a queue
    Create {
        name: String,
        #[arg(long)]
        id: Option<String>,
    },
    /// Show the queue list and one queue in detail
    Show { queue_id: Option<String> },
    /// Join a queue
    Join {
        queue_id: String,
        member_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Leave a queue
    Leave { queue_id: String, member_id: String },
    /// Remove everyone from a queue
    Clear { queue_id: String },
    /// Delete a queue
    Delete { queue_id: String },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration from file or environment and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => AppConfig::from_file(config_path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if let Some(api_base) = &args.api_base {
        config.replica.api_base = api_base.clone();
    }
    if let Some(snapshot) = &args.snapshot {
        config.replica.snapshot_path = snapshot.clone();
    }
    if let Command::Serve { host, port, .. } = &args.command {
        if let Some(host) = host {
            config.service.http_host = host.clone();
        }
        if let Some(port) = port {
            config.service.http_port = *port;
        }
    }

    waitline::config::validate_config(&config)?;
    Ok(config)
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Waitline queue service v{}", waitline::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Listen: {}", config.bind_address());
    info!("   Sample capacity: {}", config.estimator.sample_capacity);
}

async fn run_server(config: AppConfig) -> Result<()> {
    display_startup_banner(&config);

    let state = Arc::new(AppState::new(config.clone())?);
    let server = HttpServer::new(state);
    let listener = server.bind().await?;
    let mut handle = server.spawn(listener);

    info!("Press Ctrl+C to shutdown gracefully...");

    tokio::select! {
        _ = wait_for_shutdown_signal() => {},
        result = &mut handle => {
            return result?;
        }
    }

    server.stop();
    match tokio::time::timeout(config.shutdown_timeout(), handle).await {
        Ok(Ok(Ok(()))) => info!("Graceful shutdown completed"),
        Ok(Ok(Err(e))) => error!("HTTP server failed during shutdown: {}", e),
        Ok(Err(e)) => error!("HTTP server task panicked: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}

/// Print the value on stdout and the degraded-mode advisory on stderr
fn emit<T: Serialize>(synced: &Synced<T>) -> Result<()> {
    if let Some(advisory) = &synced.advisory {
        eprintln!("{}", advisory);
    }
    println!("{}", serde_json::to_string_pretty(&synced.value)?);
    Ok(())
}

async fn run_client(config: AppConfig, handle: Option<String>, command: Command) -> Result<()> {
    let authoritative =
        RemoteQueueStore::new(&config.replica.api_base, config.request_timeout())?;
    let mirror = SnapshotQueueStore::open(
        &config.replica.snapshot_path,
        config.estimator.sample_capacity,
    )?;
    let replica = ReplicaSync::new(authoritative, mirror, config.request_timeout());
    let policy = AccessPolicy::new(&config.replica.privileged_handles);
    let operator = || {
        let member_id = handle.clone().unwrap_or_else(|| "cli".to_string());
        policy.caller(member_id, None, handle.clone())
    };

    match command {
        Command::Serve { .. } => Err(anyhow::anyhow!("serve is not a client command")),
        Command::List => emit(&replica.list().await?),
        Command::Create { name, id } => {
            let mut request = CreateQueueRequest::new(name);
            request.id = id;
            emit(&replica.create(request).await?)
        }
        Command::Show { queue_id } => {
            let queue_id = queue_id.unwrap_or_else(|| DEFAULT_QUEUE_ID.to_string());
            let view = replica.select(&queue_id).await?;
            if let Some(member_id) = &handle {
                if let Some(eta) = view.value.selected.eta_for(member_id) {
                    eprintln!(
                        "Position {} in '{}', estimated wait {}",
                        view.value.selected.position_of(member_id),
                        view.value.selected.name,
                        format_wait(eta)
                    );
                }
            }
            emit(&view)
        }
        Command::Join {
            queue_id,
            member_id,
            name,
        } => {
            let caller = policy.caller(member_id, name, handle.clone());
            let joined = replica.join_as(&caller, &queue_id).await?;
            emit(&joined.map(|position| JoinResponse { ok: true, position }))
        }
        Command::Leave {
            queue_id,
            member_id,
        } => {
            let caller = policy.caller(member_id, None, handle.clone());
            emit(&replica.leave_as(&caller, &queue_id).await?.map(|_| Ack::ok()))
        }
        Command::Clear { queue_id } => {
            emit(&replica.clear(&operator(), &queue_id).await?.map(|_| Ack::ok()))
        }
        Command::Delete { queue_id } => {
            emit(&replica.delete(&operator(), &queue_id).await?.map(|_| Ack::ok()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match args.command {
        Command::Serve { dry_run: true, .. } => {
            display_startup_banner(&config);
            info!("Dry run completed - exiting without starting service");
            Ok(())
        }
        Command::Serve { .. } => run_server(config).await,
        command => run_client(config, args.as_handle, command).await,
    }
}
