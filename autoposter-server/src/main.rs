//! autoposter-server - HTTP API for publishing and blog housekeeping
//!
//! Loads the account configuration once, authenticates every usable account
//! and serves the publish, listing, statistics and cleanup endpoints.

use anyhow::{Context, Result};
use autoposter_server::{router, AppState};
use clap::Parser;
use libautoposter::config::expand_tilde;
use libautoposter::logging::LoggingConfig;
use libautoposter::{AutoPosterService, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "autoposter-server")]
#[command(version)]
#[command(about = "HTTP API for publishing to blogs and microblogs")]
#[command(long_about = "\
autoposter-server - HTTP API for publishing to blogs and microblogs

DESCRIPTION:
    autoposter-server accepts publish requests for WordPress.com, Mastodon,
    Twitter and note.com accounts, and exposes listing, statistics and
    cleanup endpoints for WordPress.com blogs.

    Accounts are read from the configuration file at startup. Accounts with
    missing or placeholder credentials are reported as misconfigured and
    never contacted.

ENDPOINTS:
    GET    /                              Health check
    POST   /{platform}/post               Publish (wordpress|mastodon|twitter|note)
    POST   /note/draft                    Save a note.com draft without a browser
    GET    /wordpress/posts               List posts
    DELETE /wordpress/posts?ids=1,2       Move posts to the trash
    GET    /wordpress/stats/views         Views of one post
    GET    /wordpress/stats/search-terms  Search terms
    POST   /wordpress/cleanup             Keep the newest N posts per account

USAGE:
    # Serve on the configured address
    autoposter-server

    # Bind elsewhere and watch the browser work
    autoposter-server --host 0.0.0.0 --port 9000 --show-browser

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes in-flight requests)

CONFIGURATION:
    Configuration file: ~/.config/autoposter/config.json
    Override with --config or AUTOPOSTER_CONFIG.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime or configuration error
")]
struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Run the browser with a visible window
    #[arg(long)]
    show_browser: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    let config_path = cli
        .config
        .as_ref()
        .map(|p| PathBuf::from(expand_tilde(&p.to_string_lossy())));
    let config = Config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let headless = !(cli.show_browser || config.server.show_browser);

    info!("autoposter-server starting");
    let service = AutoPosterService::from_config(&config, headless).await;
    info!(accounts = service.registry().client_count(), "Accounts ready");

    let addr: SocketAddr = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
    .parse()
    .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let shutdown = setup_signal_handlers()?;
    axum::serve(listener, router(AppState::new(service)))
        .with_graceful_shutdown(async {
            // A dropped sender also means shut down
            let _ = shutdown.await;
        })
        .await
        .context("Server error")?;

    info!("autoposter-server stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;
    let (tx, rx) = oneshot::channel();

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "Received shutdown signal, stopping gracefully...");
            let _ = tx.send(());
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping gracefully...");
        }
        let _ = tx.send(());
    });
    Ok(rx)
}
