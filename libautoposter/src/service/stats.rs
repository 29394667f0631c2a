//! Post listing, deletion and statistics for blog accounts
//!
//! Includes the page-view CSV export used by the `autoposter-export` tool.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::AccountRegistry;
use crate::error::{AutoPosterError, Result};
use crate::platforms::Platform;
use crate::service::cleanup::collect_posts;
use crate::types::{PlatformKind, PostSummary, SearchTerm};

/// Largest statistics window accepted by the API
pub const MAX_DAYS: u32 = 30;

/// Largest page size accepted by the listing endpoint
pub const MAX_PAGE_SIZE: u32 = 100;

/// Reject statistics windows outside `1..=30`
pub fn validate_days(days: u32) -> Result<u32> {
    if (1..=MAX_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(AutoPosterError::InvalidInput(format!(
            "days must be between 1 and {}, got {}",
            MAX_DAYS, days
        )))
    }
}

/// Reject pages below 1 and page sizes outside `1..=100`
pub fn validate_paging(page: u32, number: u32) -> Result<()> {
    if page < 1 {
        return Err(AutoPosterError::InvalidInput(
            "page must be at least 1".to_string(),
        ));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&number) {
        return Err(AutoPosterError::InvalidInput(format!(
            "number must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, number
        )));
    }
    Ok(())
}

/// Result of a batch post deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: Vec<u64>,
    pub errors: BTreeMap<String, String>,
    pub success: usize,
    pub failed: usize,
}

/// Result of exporting one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExportOutcome {
    Written {
        account: String,
        csv: PathBuf,
        posts: usize,
    },
    Failed {
        account: String,
        error: String,
    },
}

/// Stats service
#[derive(Clone)]
pub struct StatsService {
    registry: Arc<AccountRegistry>,
}

impl StatsService {
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        Self { registry }
    }

    /// One page of an account's posts
    pub async fn list_posts(&self, account: &str, page: u32, number: u32) -> Result<Vec<PostSummary>> {
        validate_paging(page, number)?;
        let client = self.registry.resolve(PlatformKind::Wordpress, account)?;
        let client = client.lock().await;
        client.list_posts(page, number, None).await
    }

    /// Move the given posts to the trash, one at a time
    pub async fn delete_posts(&self, account: &str, ids: &[u64]) -> Result<DeleteReport> {
        let client = self.registry.resolve(PlatformKind::Wordpress, account)?;
        let client = client.lock().await;
        Ok(delete_posts_with(client.as_ref(), ids).await)
    }

    /// Total views of one post over the last `days` days
    pub async fn post_views(&self, account: &str, post_id: u64, days: u32) -> Result<serde_json::Value> {
        let days = validate_days(days)?;
        let client = self.registry.resolve(PlatformKind::Wordpress, account)?;
        let client = client.lock().await;
        Ok(client.post_views(post_id, days).await?.views)
    }

    pub async fn search_terms(&self, account: &str, days: u32) -> Result<Vec<SearchTerm>> {
        let days = validate_days(days)?;
        let client = self.registry.resolve(PlatformKind::Wordpress, account)?;
        let client = client.lock().await;
        client.search_terms(days).await
    }

    /// Write the page-view CSV for one account, dated today
    pub async fn export_views(&self, account: &str, days: u32, out_dir: &Path) -> ExportOutcome {
        self.export_views_on(account, days, out_dir, Local::now().date_naive())
            .await
    }

    pub async fn export_views_on(
        &self,
        account: &str,
        days: u32,
        out_dir: &Path,
        date: NaiveDate,
    ) -> ExportOutcome {
        match self.try_export(account, days, out_dir, date).await {
            Ok((csv, posts)) => ExportOutcome::Written {
                account: account.to_string(),
                csv,
                posts,
            },
            Err(e) => {
                warn!("export for {} failed: {}", account, e);
                ExportOutcome::Failed {
                    account: account.to_string(),
                    error: e.public_message(),
                }
            }
        }
    }

    async fn try_export(
        &self,
        account: &str,
        days: u32,
        out_dir: &Path,
        date: NaiveDate,
    ) -> Result<(PathBuf, usize)> {
        let days = validate_days(days)?;
        let client = self.registry.resolve(PlatformKind::Wordpress, account)?;
        let client = client.lock().await;
        export_views_with(client.as_ref(), account, days, out_dir, date).await
    }
}

/// Delete posts sequentially, collecting per-id failures
pub async fn delete_posts_with(client: &dyn Platform, ids: &[u64]) -> DeleteReport {
    let mut deleted = Vec::new();
    let mut errors = BTreeMap::new();
    let mut failed = 0;

    for &id in ids {
        match client.delete_post(id, false).await {
            Ok(()) => deleted.push(id),
            Err(e) => {
                failed += 1;
                errors.insert(id.to_string(), e.public_message());
            }
        }
    }

    DeleteReport {
        success: deleted.len(),
        failed,
        deleted,
        errors,
    }
}

/// File name for an export: `wp_pv_<site>_<YYYYMMDD>.csv`
pub fn export_file_name(site: &str, date: NaiveDate) -> String {
    format!("wp_pv_{}_{}.csv", sanitize_site(site), date.format("%Y%m%d"))
}

fn sanitize_site(site: &str) -> String {
    site.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
        .collect()
}

/// Header row: `site,post_id,title,pv_day1..pv_dayN`, oldest day first
pub fn csv_header(days: u32) -> Vec<String> {
    let mut header = vec!["site".to_string(), "post_id".to_string(), "title".to_string()];
    header.extend((1..=days).map(|i| format!("pv_day{}", i)));
    header
}

/// The last `days` counts of a chronological series, oldest first
///
/// `pv_dayN` is always the most recent day; a short series is padded with
/// `0` on the old side.
pub fn day_columns(daily: &[u64], days: usize) -> Vec<String> {
    let recent = &daily[daily.len().saturating_sub(days)..];
    std::iter::repeat("0".to_string())
        .take(days - recent.len())
        .chain(recent.iter().map(u64::to_string))
        .collect()
}

/// Export against an already resolved client
///
/// # Returns
///
/// The written path and the number of post rows.
pub async fn export_views_with(
    client: &dyn Platform,
    account: &str,
    days: u32,
    out_dir: &Path,
    date: NaiveDate,
) -> Result<(PathBuf, usize)> {
    let posts = collect_posts(client, None).await?;
    let site = client.site().unwrap_or(account).to_string();

    std::fs::create_dir_all(out_dir).map_err(csv::Error::from)?;
    let path = out_dir.join(export_file_name(&site, date));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(csv_header(days))?;

    for post in &posts {
        let mut row = vec![site.clone(), post.id.to_string(), post.title.clone()];
        match client.post_views(post.id, days).await {
            Ok(views) => row.extend(day_columns(&views.daily, days as usize)),
            Err(e) => {
                warn!("views for post {} unavailable: {}", post.id, e);
                row.push(format!("error: {}", e.public_message()));
                row.extend(std::iter::repeat(String::new()).take(days as usize - 1));
            }
        }
        writer.write_record(&row)?;
    }

    writer.flush().map_err(csv::Error::from)?;
    info!("wrote {} rows to {}", posts.len(), path.display());
    Ok((path, posts.len()))
}
