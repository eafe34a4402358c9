use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use nimbus::logging::init_logging;
use nimbus::{
    move_object, MoveConfig, NoopObserver, ProgressBarObserver, TransferObserver, EXIT_SUCCESS,
};

#[derive(Parser)]
#[command(
    name = "nimbus",
    version,
    about = "Move objects between cloud storage providers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move an object from one cloud location to another, deleting the
    /// source on success
    Move {
        /// Source locator (s3://bucket/key, gs://bucket/key,
        /// azure://[account@]container/key)
        source: String,

        /// Destination locator
        destination: String,

        /// Number of concurrent transfer workers
        #[arg(long, default_value_t = 4)]
        threads: usize,

        /// Chunk size in MiB
        #[arg(long, default_value_t = 64)]
        chunk_size_mb: u64,

        /// Attempts per chunk, including the first
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Base retry delay in seconds; doubles per retry
        #[arg(long, default_value_t = 1)]
        retry_delay: u64,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Move {
            source,
            destination,
            threads,
            chunk_size_mb,
            max_retries,
            retry_delay,
            no_progress,
            verbose,
        } => {
            init_logging(verbose);

            let config = MoveConfig {
                threads,
                chunk_size: chunk_size_mb * 1024 * 1024,
                max_retries,
                retry_delay_secs: retry_delay,
                show_progress: !no_progress,
                verbose,
            };
            let observer: Arc<dyn TransferObserver> = if config.show_progress {
                Arc::new(ProgressBarObserver::new())
            } else {
                Arc::new(NoopObserver)
            };

            match move_object(&source, &destination, &config, observer).await {
                Ok(outcome) => {
                    if let Some(warning) = &outcome.warning {
                        eprintln!("warning: {warning}");
                    }
                    println!(
                        "Moved {} bytes in {} chunks: {} -> {}",
                        outcome.bytes_moved, outcome.chunks, source, destination
                    );
                    std::process::exit(EXIT_SUCCESS);
                }
                Err(err) => {
                    error!(error = %err, "move failed");
                    eprintln!("error: {err}");
                    std::process::exit(err.exit_code());
                }
            }
        }
    }
}
