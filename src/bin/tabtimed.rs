//! tabtime daemon - active-tab time accounting
//!
//! This binary runs as a background daemon. The browser extension shim
//! forwards tab and focus events over a Unix socket; the daemon times the
//! active site, keeps a durable ledger and periodically syncs it to the
//! backend.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! tabtimed start
//!
//! # Start the daemon (background/daemonized)
//! tabtimed start -d
//!
//! # Stop the daemon
//! tabtimed stop
//!
//! # Show daemon status and the unsynced ledger
//! tabtimed status
//!
//! # Sync now instead of waiting for the next tick
//! tabtimed sync
//!
//! # Point at a different backend
//! TABTIME_BACKEND_URL=https://tabtime.example.com tabtimed start
//!
//! # Enable debug logging
//! RUST_LOG=tabtimed=debug tabtimed start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown, committing in-flight time

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tabtime_core::{format_duration, SystemClock};
use tabtime_protocol::{ClientMessage, DaemonMessage};
use tabtimed::backend::HttpBackend;
use tabtimed::client::DaemonClient;
use tabtimed::config::Config;
use tabtimed::directory::ContextDirectory;
use tabtimed::gateway::AuthGateway;
use tabtimed::scheduler::SyncScheduler;
use tabtimed::server::{DaemonServer, DaemonServices};
use tabtimed::store::{LedgerStore, SessionStore};
use tabtimed::tracker::spawn_tracker;

/// tabtime daemon - active time per website
#[derive(Parser, Debug)]
#[command(name = "tabtimed", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
    /// Run a sync round now
    Sync,
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file(path: &Path) {
    let _ = fs::remove_file(path);
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running(pid_path: &Path) -> Option<u32> {
    if let Some(pid) = read_pid(pid_path) {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file
        remove_pid_file(pid_path);
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;
    let pid_path = config.pid_path();

    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running(&pid_path) {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'tabtimed stop' to stop it first.");
                process::exit(1);
            }

            if daemon {
                daemonize(&config.log_path())?;
            }

            write_pid(&pid_path)?;
            let result = run_daemon(config);
            remove_pid_file(&pid_path);

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running(&pid_path) {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            let Some(pid) = is_daemon_running(&pid_path) else {
                println!("Daemon is not running.");
                process::exit(1);
            };
            println!("Daemon is running (PID {pid})");
            println!("Socket: {}", config.socket_path.display());
            println!("Backend: {}", config.backend_url);

            match query_daemon(&config.socket_path, ClientMessage::get_status())? {
                DaemonMessage::Status { status } => {
                    match &status.username {
                        Some(user) => println!("Signed in as {user}"),
                        None => println!("Not signed in"),
                    }
                    if let Some(timing) = &status.timing {
                        println!(
                            "Timing context {} for {}",
                            timing.context_id,
                            format_duration(timing.elapsed_seconds.max(0) as u64)
                        );
                    }
                    println!(
                        "Unsynced: {} across {} site(s)",
                        format_duration(status.pending_seconds()),
                        status.ledger.len()
                    );
                    for line in &status.ledger {
                        println!("  {:<32} {:>8}  {}", line.site, format_duration(line.seconds), line.title);
                    }
                    Ok(())
                }
                other => bail!("Unexpected reply from daemon: {other:?}"),
            }
        }
        Command::Sync => match query_daemon(&config.socket_path, ClientMessage::sync_now())? {
            DaemonMessage::SyncReport {
                attempted,
                synced,
                failed,
                skipped,
            } => {
                match skipped {
                    Some(reason) => println!("Sync skipped: {reason}"),
                    None => println!("Synced {synced}/{attempted} site(s), {failed} failed"),
                }
                Ok(())
            }
            other => bail!("Unexpected reply from daemon: {other:?}"),
        },
    }
}

fn daemonize(log_path: &Path) -> Result<()> {
    use daemonize::Daemonize;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(log_path).context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn query_daemon(socket_path: &Path, message: ClientMessage) -> Result<DaemonMessage> {
    let mut client = DaemonClient::connect(socket_path, Some("tabtimed-cli".to_string()))
        .await
        .with_context(|| format!("Is the daemon listening on {}?", socket_path.display()))?;
    let reply = client.request(&message).await?;
    client.disconnect().await?;
    Ok(reply)
}

#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tabtimed=info".parse()?)
                .add_directive("tabtime_core=info".parse()?)
                .add_directive("tabtime_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        backend = %config.backend_url,
        "tabtime daemon starting"
    );

    fs::create_dir_all(&config.state_dir).with_context(|| {
        format!("Failed to create state directory {}", config.state_dir.display())
    })?;

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let ledger = Arc::new(LedgerStore::open(config.ledger_path()));
    let sessions = Arc::new(SessionStore::open(config.session_path()));
    let directory = ContextDirectory::new();

    let tracker = spawn_tracker(
        Arc::new(directory.clone()),
        Arc::clone(&ledger),
        Arc::new(SystemClock),
    );
    info!("Tab tracker started");

    let backend = Arc::new(
        HttpBackend::new(&config.backend_url, config.request_timeout())
            .context("Failed to build HTTP client")?,
    );
    let gateway = AuthGateway::new(backend.clone(), Arc::clone(&sessions));

    let scheduler = Arc::new(SyncScheduler::new(
        tracker.clone(),
        Arc::clone(&ledger),
        Arc::clone(&sessions),
        backend,
    ));
    let sync_task = Arc::clone(&scheduler).spawn(config.sync_interval(), cancel_token.clone());
    info!(interval_secs = config.sync_interval().as_secs(), "Sync scheduler started");

    let services = DaemonServices {
        directory,
        tracker: tracker.clone(),
        gateway,
        scheduler,
        ledger,
    };
    let server = DaemonServer::new(&config.socket_path, services, cancel_token.clone());

    let result = server.run().await;
    cancel_token.cancel();

    if let Err(e) = sync_task.await {
        warn!(error = %e, "Sync scheduler task ended abnormally");
    }

    // Commit whatever the open interval holds before exiting
    match tracker.flush().await {
        Ok(transition) => {
            let seconds = transition.committed_seconds();
            if seconds > 0 {
                info!(seconds, "Committed in-flight time on shutdown");
            }
        }
        Err(e) => warn!(error = %e, "Could not flush tracker on shutdown"),
    }

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("tabtime daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
