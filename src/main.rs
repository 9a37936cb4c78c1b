mod cli;
mod config;
mod error;
mod graph;
mod model;
mod providers;
mod store;
mod tracker;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .compact()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("status") => cli::handle_status().await,
        Some("log") => cli::handle_log(&args[1..]).await,
        Some("config") => cli::handle_config(&args[1..]).await,
        Some("help" | "--help" | "-h") => {
            cli::print_usage();
            Ok(())
        }
        Some(other) => {
            cli::print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}
