//! autoposter-cleanup - Trim WordPress blogs down to their newest posts
//!
//! Unix-style tool running the same cleanup as `POST /wordpress/cleanup`.

use clap::Parser;
use libautoposter::accounts::{AccountRegistry, GENERAL_ERROR_KEY};
use libautoposter::config::expand_tilde;
use libautoposter::error::ConfigError;
use libautoposter::logging::LoggingConfig;
use libautoposter::service::cleanup::{CleanupItem, CleanupOutcome, CleanupService};
use libautoposter::{AutoPosterError, Config, PlatformKind, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "autoposter-cleanup")]
#[command(version)]
#[command(about = "Keep the newest posts of WordPress blogs and delete the rest")]
#[command(long_about = "\
autoposter-cleanup - Keep the newest posts of WordPress blogs and delete the rest

DESCRIPTION:
    For each account, autoposter-cleanup deletes every post except the
    newest N, empties the trash, then deletes unattached media that is not
    used as the site icon or logo.

    Nothing is deleted for an account that already has N posts or fewer.

USAGE EXAMPLES:
    # Keep the 20 newest posts on every configured blog
    autoposter-cleanup --keep 20

    # Only two accounts, machine-readable report
    autoposter-cleanup --keep 5 --account blog --account diary --format json

CONFIGURATION:
    Configuration file: ~/.config/autoposter/config.json
    Override with --config or AUTOPOSTER_CONFIG.

EXIT CODES:
    0 - Every account cleaned without errors
    1 - At least one account or item failed
    2 - Authentication error
    3 - Invalid input (bad format)
")]
struct Cli {
    /// Number of newest posts to keep per account
    #[arg(long, value_name = "N")]
    keep: usize,

    /// Account to clean (repeatable, defaults to every WordPress account)
    #[arg(long = "account", value_name = "ID")]
    accounts: Vec<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Returns whether every account was cleaned without errors
async fn run(cli: Cli) -> Result<bool> {
    if cli.format != "text" && cli.format != "json" {
        return Err(AutoPosterError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let config_path = cli
        .config
        .as_ref()
        .map(|p| PathBuf::from(expand_tilde(&p.to_string_lossy())));
    let config = Config::load_or_default(config_path.as_deref())?;

    let registry = AccountRegistry::build_for(&config, &[PlatformKind::Wordpress]).await;
    if registry
        .errors(PlatformKind::Wordpress)
        .contains_key(GENERAL_ERROR_KEY)
    {
        return Err(ConfigError::MissingField("wordpress.accounts".to_string()).into());
    }

    let accounts = if cli.accounts.is_empty() {
        config.wordpress.accounts.keys().cloned().collect()
    } else {
        cli.accounts
    };
    let items: Vec<CleanupItem> = accounts
        .into_iter()
        .map(|identifier| CleanupItem {
            identifier,
            keep_latest: cli.keep,
        })
        .collect();

    let service = CleanupService::new(Arc::new(registry));
    let results = service.cleanup_batch(&items).await;

    if cli.format == "json" {
        output_json(&results);
    } else {
        output_text(&results);
    }

    Ok(results.iter().all(|outcome| match outcome {
        CleanupOutcome::Completed(report) => report.errors.is_empty(),
        CleanupOutcome::Failed { .. } => false,
    }))
}

/// Output the results as JSON
fn output_json(results: &[CleanupOutcome]) {
    let json = serde_json::json!({ "results": results });
    match serde_json::to_string_pretty(&json) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode results: {}", e),
    }
}

/// Output the results as human-readable text
fn output_text(results: &[CleanupOutcome]) {
    for outcome in results {
        match outcome {
            CleanupOutcome::Completed(report) => {
                println!(
                    "{}: deleted {} post(s), emptied {} from trash, deleted {} media",
                    report.account,
                    report.deleted_posts.len(),
                    report.trash_emptied,
                    report.deleted_media
                );
                for (item, error) in &report.errors {
                    println!("  {}: {}", item, error);
                }
            }
            CleanupOutcome::Failed { account, error } => {
                println!("{}: error: {}", account, error);
            }
        }
    }
}
