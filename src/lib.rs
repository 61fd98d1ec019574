//! # collection-fetch
//!
//! Fetches every document of a remote collection that only exposes a
//! paginated search endpoint, and writes the result as one JSON array.
//!
//! ## How a fetch runs
//!
//! 1. The first page (offset 0) is requested on its own; its response carries
//!    the collection's total.
//! 2. The [`planner`] tiles the rest of the collection into page descriptors.
//! 3. An aggregator retrieves those pages:
//!    - **parallel** (default): all remaining pages in flight at once, or up to
//!      a configured cap, reassembled in offset order before anything is written
//!    - **sequential**: one page at a time, each streamed into the output as
//!      it arrives
//! 4. A [`DocumentSink`] receives the documents: a file, or the console.
//!
//! ## Quick Start
//!
//! ```no_run
//! use collection_fetch::{Config, OutputTarget, ServiceConfig, fetch_remote};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         service: ServiceConfig {
//!             base_url: "https://data.example.com".to_string(),
//!             collection: "movies".to_string(),
//!             token: "secret".to_string(),
//!             ..Default::default()
//!         },
//!         fetch: Default::default(),
//!         output: OutputTarget::File {
//!             path: "movies.json".into(),
//!             atomic_write: false,
//!         },
//!     };
//!
//!     let summary = fetch_remote(&config, &CancellationToken::new()).await?;
//!     println!("{}", summary.line(config.output.verb()));
//!     Ok(())
//! }
//! ```
//!
//! Any [`PageQuery`] can stand in for the HTTP transport, which is how the
//! aggregators are exercised without a network.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Whole-collection fetching (decomposed into focused submodules)
pub mod aggregator;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Page boundary planning
pub mod planner;
/// The page query seam
pub mod query;
/// Output sinks
pub mod sink;
/// HTTP transport for the search endpoint
pub mod transport;
/// Core data types
pub mod types;

// Re-export commonly used types
pub use aggregator::{
    fetch_all_parallel, fetch_all_sequential, fetch_collection, fetch_into, fetch_remote,
};
pub use config::{Config, DEFAULT_PAGE_SIZE, FetchConfig, FetchMode, OutputTarget, ServiceConfig};
pub use error::{Error, PlanningError, Result, SinkError, TransportError};
pub use query::{PageQuery, QueryFn, query_fn};
pub use sink::{ConsoleSink, DocumentSink, FileSink, JsonArraySink, open_sink};
pub use transport::HttpPageQuery;
pub use types::{Document, FetchSummary, PageDescriptor, PageResult};

/// Cancel `cancel` once the process receives a termination signal
///
/// In-flight page requests observe the token and the fetch returns
/// [`Error::Cancelled`]; an atomic file sink then removes its staging file.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use collection_fetch::cancel_on_shutdown;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() {
/// let cancel = CancellationToken::new();
/// tokio::spawn(cancel_on_shutdown(cancel.clone()));
/// # }
/// ```
pub async fn cancel_on_shutdown(cancel: tokio_util::sync::CancellationToken) {
    tokio::select! {
        () = wait_for_signal() => cancel.cancel(),
        () = cancel.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    fn register(kind: SignalKind, name: &str) -> Option<Signal> {
        signal(kind)
            .map_err(|e| tracing::warn!(error = %e, signal = name, "could not register signal handler"))
            .ok()
    }

    async fn received(signal: Option<Signal>) {
        match signal {
            Some(mut signal) => {
                signal.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let sigterm = register(SignalKind::terminate(), "SIGTERM");
    let sigint = register(SignalKind::interrupt(), "SIGINT");
    if sigterm.is_none() && sigint.is_none() {
        tracing::error!("no signal handlers registered, falling back to ctrl_c");
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("received Ctrl+C, cancelling fetch");
        return;
    }

    let name = tokio::select! {
        () = received(sigterm) => "SIGTERM",
        () = received(sigint) => "SIGINT",
    };
    tracing::info!(signal = name, "cancelling fetch");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C, cancelling fetch");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
        }
    }
}
