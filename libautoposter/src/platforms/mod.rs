//! Platform abstraction and implementations
//!
//! This module provides a unified trait for talking to the REST-backed
//! publishing platforms. Blog hosts implement the whole surface (posting,
//! listing, cleanup and statistics); microblog clients implement only the
//! publishing subset and inherit `NotImplemented` defaults for the rest.
//!
//! # Examples
//!
//! ```no_run
//! use libautoposter::platforms::{Platform, mastodon::MastodonClient};
//! use libautoposter::types::PostDraft;
//!
//! # async fn example() -> libautoposter::error::Result<()> {
//! let mut platform = MastodonClient::new(
//!     "https://mastodon.social".to_string(),
//!     "access-token".to_string(),
//! )?;
//!
//! platform.authenticate().await?;
//!
//! let draft = PostDraft {
//!     body: "Hello from autoPoster".to_string(),
//!     ..Default::default()
//! };
//! let created = platform.create_post(&draft).await?;
//! println!("Posted: {}", created.id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{PlatformError, Result};
use crate::types::{
    CreatedPost, MediaItem, MediaSummary, PostDraft, PostSummary, PostViews, RemoteId,
    SearchTerm, UploadedMedia,
};

pub mod mastodon;
pub mod note;
pub mod twitter;
pub mod wordpress;

// Mock platform is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Site-info fields holding the site's branding images
pub const PROTECTED_MEDIA_FIELDS: &str = "icon,logo";

/// Platform trait for unified publishing platform interactions
///
/// One value of this trait is scoped to exactly one configured account.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Get the platform name
    ///
    /// Returns the lowercase platform key (e.g., "wordpress", "mastodon")
    fn name(&self) -> &str;

    /// Site identifier for blog hosts, used in export file names
    fn site(&self) -> Option<&str> {
        None
    }

    /// Authenticate with the platform
    ///
    /// Called once when the account registry builds the client. The session
    /// is reused for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected
    /// or the token response is unusable.
    async fn authenticate(&mut self) -> Result<()>;

    /// Upload one media item
    ///
    /// # Returns
    ///
    /// The platform's media id and, where the platform hands one out, a
    /// public URL for embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails or the response carries no id
    /// (or, for blog hosts, no recognizable URL).
    async fn upload_media(&self, media: &MediaItem) -> Result<UploadedMedia>;

    /// Set the alt text of previously uploaded media
    async fn update_media_alt_text(&self, _id: &RemoteId, _alt: &str) -> Result<()> {
        Err(not_supported(self.name(), "media alt text"))
    }

    /// Create and publish a post
    ///
    /// Blog hosts receive an HTML body plus title and taxonomy; microblogs
    /// receive plain text and the ids returned by [`Platform::upload_media`].
    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost>;

    /// List one page of posts
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `number` - page size
    /// * `status` - optional status filter such as `"trash"`
    async fn list_posts(
        &self,
        _page: u32,
        _number: u32,
        _status: Option<&str>,
    ) -> Result<Vec<PostSummary>> {
        Err(not_supported(self.name(), "post listing"))
    }

    /// Delete a post, moving it to the trash unless `permanent`
    async fn delete_post(&self, _id: u64, _permanent: bool) -> Result<()> {
        Err(not_supported(self.name(), "post deletion"))
    }

    /// Permanently delete everything in the trash
    ///
    /// # Returns
    ///
    /// Ids of the posts that were removed. Individual failures are skipped.
    async fn empty_trash(&self) -> Result<Vec<u64>> {
        Err(not_supported(self.name(), "trash"))
    }

    /// Fetch site metadata restricted to a comma-separated `fields` list
    async fn site_info(&self, _fields: &str) -> Result<serde_json::Value> {
        Err(not_supported(self.name(), "site info"))
    }

    /// URLs that cleanup must never delete
    ///
    /// Every string value under the site's `icon` and `logo` objects.
    async fn protected_media_urls(&self) -> Result<HashSet<String>> {
        let info = self.site_info(PROTECTED_MEDIA_FIELDS).await?;
        Ok(protected_urls(&info))
    }

    /// List one page of the media library
    ///
    /// `post_id` filters by parent post; `Some(0)` selects unattached media.
    async fn list_media(
        &self,
        _post_id: Option<u64>,
        _page: u32,
        _number: u32,
    ) -> Result<Vec<MediaSummary>> {
        Err(not_supported(self.name(), "media listing"))
    }

    async fn delete_media(&self, _id: u64) -> Result<()> {
        Err(not_supported(self.name(), "media deletion"))
    }

    /// Daily view statistics for one post over the last `days` days
    async fn post_views(&self, _post_id: u64, _days: u32) -> Result<PostViews> {
        Err(not_supported(self.name(), "post statistics"))
    }

    /// Search terms that led visitors to the site over the last `days` days
    async fn search_terms(&self, _days: u32) -> Result<Vec<SearchTerm>> {
        Err(not_supported(self.name(), "search terms"))
    }
}

fn not_supported(platform: &str, feature: &str) -> crate::error::AutoPosterError {
    PlatformError::NotImplemented(format!("{} does not support {}", platform, feature)).into()
}

/// Collect the string values of the `icon` and `logo` objects
pub fn protected_urls(site_info: &serde_json::Value) -> HashSet<String> {
    PROTECTED_MEDIA_FIELDS
        .split(',')
        .filter_map(|key| site_info.get(key).and_then(|v| v.as_object()))
        .flat_map(|obj| obj.values())
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect()
}
