//! OAR-HTR worker and CLI
//!
//! A binary that runs the background worker and a few maintenance commands over the
//! shared document database.
//!
//! # Usage
//!
//! ```bash
//! oar-htr submit --file registo_1901.jpg
//! oar-htr worker --recognizer-url http://127.0.0.1:8000/recognize
//! oar-htr show --document 1 --output pretty
//! oar-htr correct --segment 4 --text "Aos dez dias do mez de Março"
//! oar-htr evaluate --document 1
//! oar-htr segment --file registo_1901.jpg --out crops/
//! ```

mod cli;
mod config;

use clap::{Args, Parser, Subcommand};
use oar_htr::core::BoxError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "oar-htr")]
#[command(author = "OAR-HTR Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Handwritten document segmentation and recognition worker", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "OAR_HTR_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, env = "OAR_HTR_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the commands that recognize documents.
#[derive(Args)]
struct RecognitionArgs {
    /// Endpoint of the line recognition service
    #[arg(long = "recognizer-url", env = "OAR_HTR_RECOGNIZER_URL")]
    recognizer_url: Option<String>,

    /// Directory receiving the line crops
    #[arg(long = "segments-dir", env = "OAR_HTR_SEGMENTS_DIR")]
    segments_dir: Option<PathBuf>,

    /// Number of threads for the image kernels (defaults to number of CPUs)
    #[arg(long, env = "OAR_HTR_THREADS")]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process uploaded documents until interrupted
    Worker {
        #[command(flatten)]
        recognition: RecognitionArgs,
    },
    /// Process one uploaded document in the foreground
    Process {
        /// Document id
        #[arg(long)]
        document: i64,

        #[command(flatten)]
        recognition: RecognitionArgs,
    },
    /// Register a document for processing
    Submit {
        /// Image or PDF to submit
        #[arg(long)]
        file: PathBuf,

        /// Directory receiving the submitted files
        #[arg(long = "uploads-dir", env = "OAR_HTR_UPLOADS_DIR")]
        uploads_dir: Option<PathBuf>,
    },
    /// Normalize and segment a page without recognizing it
    Segment {
        /// Image or PDF to segment
        #[arg(long)]
        file: PathBuf,

        /// Directory receiving the line crops
        #[arg(long)]
        out: PathBuf,
    },
    /// Print a document with its results
    Show {
        /// Document id
        #[arg(long)]
        document: i64,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,
    },
    /// Record the corrected text of a line
    Correct {
        /// Segment id
        #[arg(long)]
        segment: i64,

        /// Corrected text
        #[arg(long)]
        text: String,
    },
    /// Print the word error rate of a document against its corrections
    Evaluate {
        /// Document id
        #[arg(long)]
        document: i64,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize tracing
    oar_htr::utils::init_tracing();

    let cli = Cli::parse();
    let mut overrides = config::Overrides {
        database: cli.database,
        ..Default::default()
    };
    if let Commands::Worker { recognition } | Commands::Process { recognition, .. } =
        &cli.command
    {
        overrides.recognizer_url = recognition.recognizer_url.clone();
        overrides.segments_dir = recognition.segments_dir.clone();
        overrides.threads = recognition.threads;
    }
    if let Commands::Submit { uploads_dir, .. } = &cli.command {
        overrides.uploads_dir = uploads_dir.clone();
    }
    let config = config::load(cli.config.as_deref(), overrides)?;

    if config.parallel.install_global_thread_pool()? {
        info!(threads = ?config.parallel.max_threads, "Configured image thread pool");
    }

    match cli.command {
        Commands::Worker { .. } => run_worker(config).await,
        Commands::Process { document, .. } => {
            off_runtime(move || cli::process(&config, document)).await
        }
        Commands::Submit { file, .. } => off_runtime(move || cli::submit(&config, &file)).await,
        Commands::Segment { file, out } => {
            off_runtime(move || cli::segment(&config, &file, &out)).await
        }
        Commands::Show { document, output } => {
            off_runtime(move || cli::show(&config, document, &output)).await
        }
        Commands::Correct { segment, text } => {
            off_runtime(move || cli::correct(&config, segment, &text)).await
        }
        Commands::Evaluate { document, output } => {
            off_runtime(move || cli::evaluate(&config, document, &output)).await
        }
    }
}

/// Runs the coordinator on its own thread until Ctrl+C or SIGTERM.
///
/// The blocking HTTP client must not live on a runtime thread, so the coordinator gets
/// a plain OS thread and the runtime only waits for signals.
async fn run_worker(config: oar_htr::core::AppConfig) -> Result<(), BoxError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let worker = std::thread::spawn(move || cli::run_worker(&config, &flag));
    let mut joined = tokio::task::spawn_blocking(move || worker.join());

    tokio::select! {
        result = &mut joined => {
            // The worker stopped on its own, which only happens on a startup error.
            let stats = flatten(result)?;
            info!(?stats, "Worker exited");
            return Ok(());
        }
        _ = shutdown_signal() => {
            shutdown.store(true, Ordering::SeqCst);
        }
    }

    let stats = flatten(joined.await)?;
    info!(
        completed = stats.completed,
        failed = stats.failed,
        "Shutdown complete"
    );
    Ok(())
}

/// Runs a blocking command on a plain OS thread.
async fn off_runtime<T: Send + 'static>(
    f: impl FnOnce() -> Result<T, BoxError> + Send + 'static,
) -> Result<T, BoxError> {
    let thread = std::thread::spawn(f);
    flatten(tokio::task::spawn_blocking(move || thread.join()).await)
}

fn flatten<T>(
    joined: Result<std::thread::Result<Result<T, BoxError>>, tokio::task::JoinError>,
) -> Result<T, BoxError> {
    joined?.map_err(|_| BoxError::from("command thread panicked"))?
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing the current document...");
        }
        _ = terminate => {
            info!("Received SIGTERM, finishing the current document...");
        }
    }
}
