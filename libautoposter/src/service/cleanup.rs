//! Cleanup service
//!
//! Trims a blog down to its newest posts, empties the trash and removes
//! unattached media that is not part of the site branding.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accounts::AccountRegistry;
use crate::error::Result;
use crate::platforms::Platform;
use crate::types::{sort_oldest_first, MediaSummary, PlatformKind, PostSummary};

/// Page size used when walking posts and media
pub const PAGE_SIZE: u32 = 100;

/// Maximum number of delete calls in flight per account
pub const DELETE_CONCURRENCY: usize = 5;

/// One entry of a batch cleanup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupItem {
    pub identifier: String,
    pub keep_latest: usize,
}

/// Summary of one completed account cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub account: String,
    pub deleted_posts: Vec<u64>,
    pub trash_emptied: usize,
    pub deleted_media: usize,
    /// Post id (or `media:<id>`) -> failure message
    pub errors: BTreeMap<String, String>,
}

impl CleanupReport {
    fn empty(account: &str) -> Self {
        Self {
            account: account.to_string(),
            deleted_posts: Vec::new(),
            trash_emptied: 0,
            deleted_media: 0,
            errors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CleanupOutcome {
    Completed(CleanupReport),
    Failed { account: String, error: String },
}

impl CleanupOutcome {
    pub fn account(&self) -> &str {
        match self {
            CleanupOutcome::Completed(report) => &report.account,
            CleanupOutcome::Failed { account, .. } => account,
        }
    }
}

/// Cleanup service
#[derive(Clone)]
pub struct CleanupService {
    registry: Arc<AccountRegistry>,
}

impl CleanupService {
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        Self { registry }
    }

    /// Clean one WordPress account, keeping its `keep_latest` newest posts
    pub async fn cleanup_account(&self, account: &str, keep_latest: usize) -> CleanupOutcome {
        let client = match self.registry.resolve(PlatformKind::Wordpress, account) {
            Ok(client) => client,
            Err(e) => {
                return CleanupOutcome::Failed {
                    account: account.to_string(),
                    error: e.public_message(),
                }
            }
        };

        let client = client.lock().await;
        match cleanup_client(client.as_ref(), account, keep_latest).await {
            Ok(report) => CleanupOutcome::Completed(report),
            Err(e) => {
                warn!("cleanup of {} failed: {}", account, e);
                CleanupOutcome::Failed {
                    account: account.to_string(),
                    error: e.public_message(),
                }
            }
        }
    }

    /// Run each item in order and collect the outcomes
    pub async fn cleanup_batch(&self, items: &[CleanupItem]) -> Vec<CleanupOutcome> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.cleanup_account(&item.identifier, item.keep_latest).await);
        }
        results
    }
}

/// Every post of the given status, walking pages until a short one
pub async fn collect_posts(client: &dyn Platform, status: Option<&str>) -> Result<Vec<PostSummary>> {
    let mut posts = Vec::new();
    let mut page = 1;
    loop {
        let items = client.list_posts(page, PAGE_SIZE, status).await?;
        let count = items.len();
        posts.extend(items);
        if count < PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }
    Ok(posts)
}

/// Every media item not attached to a post
pub async fn collect_unattached_media(client: &dyn Platform) -> Result<Vec<MediaSummary>> {
    let mut media = Vec::new();
    let mut page = 1;
    loop {
        let items = client.list_media(Some(0), page, PAGE_SIZE).await?;
        let count = items.len();
        media.extend(items);
        if count < PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }
    Ok(media)
}

/// Run the full cleanup against an already resolved client
///
/// # Errors
///
/// Only a failure to list posts aborts the run; individual deletions are
/// recorded in the report's `errors`.
pub async fn cleanup_client(
    client: &dyn Platform,
    account: &str,
    keep_latest: usize,
) -> Result<CleanupReport> {
    let mut posts = collect_posts(client, None).await?;
    sort_oldest_first(&mut posts);
    info!("[cleanup] {}: fetched {} posts", account, posts.len());

    let mut report = CleanupReport::empty(account);
    let excess = posts.len().saturating_sub(keep_latest);
    if excess == 0 {
        info!("[cleanup] {}: nothing to delete", account);
        return Ok(report);
    }

    info!("[cleanup] {}: deleting {} posts", account, excess);
    let doomed_posts: Vec<u64> = posts.iter().take(excess).map(|p| p.id).collect();
    let outcomes: Vec<(u64, Result<()>)> = stream::iter(doomed_posts)
        .map(|id| async move { (id, client.delete_post(id, false).await) })
        .buffer_unordered(DELETE_CONCURRENCY)
        .collect()
        .await;

    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.deleted_posts.push(id),
            Err(e) => {
                report.errors.insert(id.to_string(), e.public_message());
            }
        }
    }
    report.deleted_posts.sort_unstable();
    info!("[cleanup] {}: deleted {} posts", account, report.deleted_posts.len());

    match client.empty_trash().await {
        Ok(purged) => report.trash_emptied = purged.len(),
        Err(e) => {
            warn!("[cleanup] {}: emptying trash failed: {}", account, e);
            report.errors.insert("trash".to_string(), e.public_message());
        }
    }
    info!("[cleanup] {}: trash emptied {}", account, report.trash_emptied);

    let protected = match client.protected_media_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("[cleanup] {}: skipping media cleanup: {}", account, e);
            report.errors.insert("media".to_string(), e.public_message());
            return Ok(report);
        }
    };

    let media = match collect_unattached_media(client).await {
        Ok(media) => media,
        Err(e) => {
            report.errors.insert("media".to_string(), e.public_message());
            return Ok(report);
        }
    };

    let doomed = deletable_media(media, &protected);
    debug!("[cleanup] {}: {} unattached media to remove", account, doomed.len());

    let outcomes: Vec<(u64, Result<()>)> = stream::iter(doomed)
        .map(|id| async move { (id, client.delete_media(id).await) })
        .buffer_unordered(DELETE_CONCURRENCY)
        .collect()
        .await;

    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.deleted_media += 1,
            Err(e) => {
                report.errors.insert(format!("media:{}", id), e.public_message());
            }
        }
    }
    info!("[cleanup] {}: removed {} media items", account, report.deleted_media);

    Ok(report)
}

/// Ids of the media items whose URL is not protected
fn deletable_media(media: Vec<MediaSummary>, protected: &HashSet<String>) -> Vec<u64> {
    media
        .into_iter()
        .filter(|m| match &m.url {
            Some(url) => !protected.contains(url),
            None => true,
        })
        .map(|m| m.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(id: u64, url: &str) -> MediaSummary {
        MediaSummary {
            id,
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_deletable_media_skips_protected() {
        let protected: HashSet<String> = ["https://x/logo.png".to_string()].into_iter().collect();
        let ids = deletable_media(
            vec![
                media(1, "https://x/logo.png"),
                media(2, "https://x/old.png"),
                MediaSummary { id: 3, url: None },
            ],
            &protected,
        );
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_outcome_shapes() {
        let failed = CleanupOutcome::Failed {
            account: "blog".to_string(),
            error: "Account not configured".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"account": "blog", "error": "Account not configured"})
        );

        let done = CleanupOutcome::Completed(CleanupReport::empty("blog"));
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            serde_json::json!({
                "account": "blog",
                "deleted_posts": [],
                "trash_emptied": 0,
                "deleted_media": 0,
                "errors": {}
            })
        );
        assert_eq!(done.account(), "blog");
    }

    #[test]
    fn test_cleanup_item_parses() {
        let item: CleanupItem =
            serde_json::from_str(r#"{"identifier": "blog", "keep_latest": 3}"#).unwrap();
        assert_eq!(item.keep_latest, 3);
    }
}
