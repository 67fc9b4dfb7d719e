//! pacstream server — entry point.
//!
//! ```text
//! pacstream-server                   Run until Ctrl-C
//! pacstream-server --config <path>   Load a custom config TOML
//! pacstream-server --gen-config      Write default config to stdout
//! pacstream-server --gen-config <p>  Write default config to a file
//! pacstream-server --best            Print the best player and exit
//! pacstream-server --reset-results   Empty the results file and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pacstream_core::ResultsStore;
use pacstream_server::config::ServerConfig;
use pacstream_server::service::GameServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pacstream-server", about = "Pac-Man multiplayer session server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pacstream.toml")]
    config: PathBuf,

    /// Write the default configuration (to stdout, or to the given
    /// path) and exit.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    gen_config: Option<Option<PathBuf>>,

    /// Print the best player and results summary, then exit.
    #[arg(long)]
    best: bool,

    /// Truncate the results file, then exit.
    #[arg(long)]
    reset_results: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    match cli.gen_config {
        Some(Some(path)) => {
            ServerConfig::write_default(&path)?;
            println!("Default config written to {}.", path.display());
            return Ok(());
        }
        Some(None) => {
            let text = toml::to_string_pretty(&ServerConfig::default())?;
            println!("{text}");
            return Ok(());
        }
        None => {}
    }

    // Load config.
    let config = ServerConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --best / --reset-results: maintenance on the results file.
    if cli.best || cli.reset_results {
        let store = ResultsStore::open(&config.results.path)?;
        if cli.reset_results {
            store.truncate()?;
            println!("Results file {} reset.", store.path().display());
        }
        if cli.best {
            print_best(&store)?;
        }
        return Ok(());
    }

    info!("pacstream-server v{}", env!("CARGO_PKG_VERSION"));
    info!("port: {}", config.network.port);
    info!(
        "streaming: {} fps, quality {}",
        config.streaming.fps, config.streaming.jpeg_quality
    );
    info!("results file: {}", config.results.path.display());

    let server = GameServer::from_config(&config).await?;
    let store = server.store();
    let shutdown = CancellationToken::new();

    // Ctrl-C handler.
    let stop = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    server.run(shutdown).await?;

    match tokio::task::spawn_blocking(move || store.best_player()).await? {
        Ok(Some(best)) => info!("best player: {best}"),
        Ok(None) => info!("no games recorded yet"),
        Err(e) => warn!("could not read results: {e}"),
    }

    Ok(())
}

fn print_best(store: &ResultsStore) -> Result<(), pacstream_core::StoreError> {
    match store.best_player()? {
        Some(best) => println!("Best player: {best}"),
        None => println!("No games recorded."),
    }
    if let Some(summary) = store.summary()? {
        println!(
            "{} games, mean score {:.1}, mean time {:.1} s",
            summary.count, summary.mean_score, summary.mean_elapsed_secs
        );
    }
    Ok(())
}
