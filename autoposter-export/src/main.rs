//! autoposter-export - Export WordPress page views to CSV
//!
//! Writes one `wp_pv_<site>_<YYYYMMDD>.csv` file per account with a column
//! per day, and prints one JSON line per account describing the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use libautoposter::accounts::AccountRegistry;
use libautoposter::config::{expand_tilde, Config};
use libautoposter::logging::LoggingConfig;
use libautoposter::service::stats::{validate_days, ExportOutcome, StatsService, MAX_DAYS};
use libautoposter::PlatformKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "autoposter-export")]
#[command(version)]
#[command(about = "Export per-post page views of WordPress blogs to CSV", long_about = None)]
struct Cli {
    /// Days of history per post (1-30)
    #[arg(short, long, default_value_t = MAX_DAYS)]
    days: u32,

    /// Directory receiving the CSV files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Account to export (repeatable, defaults to every WordPress account)
    #[arg(long = "account", value_name = "ID")]
    accounts: Vec<String>,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = validate_days(cli.days) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }

    let config_path = cli
        .config
        .as_ref()
        .map(|p| PathBuf::from(expand_tilde(&p.to_string_lossy())));
    let config =
        Config::load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    let out_dir = PathBuf::from(expand_tilde(&cli.out_dir.to_string_lossy()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let accounts: Vec<String> = if cli.accounts.is_empty() {
        config.wordpress.accounts.keys().cloned().collect()
    } else {
        cli.accounts
    };
    if accounts.is_empty() {
        anyhow::bail!("No WordPress accounts configured");
    }

    let registry = AccountRegistry::build_for(&config, &[PlatformKind::Wordpress]).await;
    let stats = StatsService::new(Arc::new(registry));

    let mut failed = 0;
    for account in &accounts {
        let outcome = stats.export_views(account, cli.days, &out_dir).await;
        match &outcome {
            ExportOutcome::Written { csv, posts, .. } => {
                info!("{}: {} post(s) written to {}", account, posts, csv.display());
            }
            ExportOutcome::Failed { error, .. } => {
                error!("{}: export failed: {}", account, error);
                failed += 1;
            }
        }
        println!(
            "{}",
            serde_json::to_string(&outcome).context("Failed to encode export outcome")?
        );
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
