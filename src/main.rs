//! pagepack - pack a rendered web page into a single HTML file.

use pagepack::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "pagepack=info"
    } else {
        "pagepack=warn"
    };

    // stdout carries the HTML, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = cli::run().await {
        eprintln!("FATAL ERROR: {:#}", e);
        std::process::exit(1);
    }
}
