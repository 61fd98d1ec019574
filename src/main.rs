//! CLI for collection-fetch
//!
//! - save: fetch a collection into a JSON file
//! - print: fetch a collection and print it page by page

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use collection_fetch::{
    Config, DEFAULT_PAGE_SIZE, Error, FetchConfig, FetchMode, OutputTarget, ServiceConfig,
    cancel_on_shutdown, fetch_remote,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "collection-fetch")]
#[command(about = "Fetch every document of a paginated collection", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the collection to a file as one JSON array
    Save(SaveArgs),

    /// Print the collection to stdout
    Print(PrintArgs),
}

#[derive(Args)]
struct SaveArgs {
    /// Output file, overwritten if it exists
    #[arg(
        short = 'f',
        long = "file",
        visible_alias = "output",
        visible_short_alias = 'o'
    )]
    file: PathBuf,

    /// Write to `<file>.part` and rename once the fetch succeeds
    #[arg(long)]
    atomic: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct PrintArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Collection name, e.g. movies
    #[arg(short, long, env = "COLLECTION_FETCH_COLLECTION")]
    collection: String,

    /// Access token
    #[arg(short, long, env = "COLLECTION_FETCH_TOKEN", hide_env_values = true)]
    token: String,

    /// Data service URL, e.g. https://db-myproject.example.io
    #[arg(short, long, env = "COLLECTION_FETCH_URL")]
    url: String,

    /// Fetch pages one at a time, streaming each to the output
    #[arg(short, long)]
    sequential: bool,

    /// Records per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u64,

    /// Cap on simultaneous page requests in parallel mode
    #[arg(long)]
    max_concurrent_pages: Option<usize>,

    /// Field the collection is sorted by
    #[arg(long, default_value = "id")]
    sort_field: String,

    /// Timeout for each page request, in seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl CommonArgs {
    fn into_config(self, output: OutputTarget) -> Config {
        let mode = if self.sequential {
            FetchMode::Sequential
        } else {
            FetchMode::Parallel
        };

        Config {
            service: ServiceConfig {
                base_url: self.url,
                collection: self.collection,
                token: self.token,
                sort_field: self.sort_field,
                request_timeout: Duration::from_secs(self.timeout_secs),
            },
            fetch: FetchConfig {
                page_size: self.page_size,
                mode,
                max_concurrent_pages: self.max_concurrent_pages,
            },
            output,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (verbose, config) = match cli.command {
        Commands::Save(args) => {
            let output = OutputTarget::File {
                path: args.file,
                atomic_write: args.atomic,
            };
            (args.common.verbose, args.common.into_config(output))
        }
        Commands::Print(args) => (
            args.common.verbose,
            args.common.into_config(OutputTarget::Console),
        ),
    };
    init_tracing(verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let result = fetch_remote(&config, &cancel).await;
    cancel.cancel();

    match result {
        Ok(summary) => {
            println!("{}", summary.line(config.output.verb()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(code = e.error_code(), error = ?e, "fetch failed");
            // Printed directly so no log filter can hide it
            eprintln!("{}", error_line(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

fn error_line(e: &Error) -> String {
    format!("ERROR [{}] {e}", e.error_code())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
