//! Mock platform implementation for testing
//!
//! This module provides a configurable in-memory platform that can simulate
//! successes, failures and latency across the whole [`Platform`] surface. The
//! backing state is shared through an `Arc`, so a test can keep a handle after
//! the mock has been boxed into an account registry and inspect every call.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{
    CreatedPost, MediaItem, MediaSummary, PostDraft, PostSummary, PostViews, RemoteId,
    SearchTerm, UploadedMedia,
};

/// Remote state and call log of a mock platform
#[derive(Debug, Default)]
pub struct MockState {
    pub posts: Vec<PostSummary>,
    pub trash: Vec<PostSummary>,
    /// Unattached media library
    pub media: Vec<MediaSummary>,
    pub site_info: Value,
    pub daily_views: HashMap<u64, Vec<u64>>,
    pub search_terms: Vec<SearchTerm>,

    /// Every call, in order, as `"<operation>[ <arg>]"`
    pub calls: Vec<String>,
    pub auth_calls: usize,
    pub uploads: Vec<MediaItem>,
    pub drafts: Vec<PostDraft>,
    pub alt_texts: Vec<(RemoteId, String)>,
    pub deleted_posts: Vec<u64>,
    pub deleted_media: Vec<u64>,
    /// Pages requested from `list_posts` as `(page, status)`
    pub post_pages: Vec<(u32, Option<String>)>,
    pub media_pages: Vec<u32>,

    in_flight: usize,
    /// Highest number of concurrent delete calls observed
    pub max_in_flight: usize,
}

impl MockState {
    /// Number of calls whose operation name is `operation`
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    /// Calls that reach the remote platform (everything but authentication)
    pub fn remote_calls(&self) -> usize {
        self.calls.len()
    }
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform key reported by `name()` (e.g., "wordpress", "mastodon")
    pub name: String,

    /// Site for blog hosts; `None` behaves like a microblog
    pub site: Option<String>,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Error to return on authentication failure
    pub auth_error: Option<String>,

    /// 0-based upload call that fails
    pub fail_upload_at: Option<usize>,

    /// Error to return from `create_post`
    pub post_error: Option<String>,

    /// Error to return from `update_media_alt_text`
    pub alt_text_error: Option<String>,

    /// Error to return from `list_posts`
    pub list_error: Option<String>,

    /// Error to return from `post_views` for these post ids
    pub failing_views: HashSet<u64>,

    pub failing_post_deletes: HashSet<u64>,
    pub failing_media_deletes: HashSet<u64>,

    /// Delay before completing delete operations (simulates network latency)
    pub delay: Duration,

    pub state: Arc<Mutex<MockState>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            site: None,
            auth_succeeds: true,
            auth_error: None,
            fail_upload_at: None,
            post_error: None,
            alt_text_error: None,
            list_error: None,
            failing_views: HashSet::new(),
            failing_post_deletes: HashSet::new(),
            failing_media_deletes: HashSet::new(),
            delay: Duration::from_millis(0),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }
}

/// Mock platform for testing
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    /// Create a new mock platform with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A blog host mock supporting the full surface
    pub fn wordpress(site: &str) -> Self {
        Self::new(MockConfig {
            name: "wordpress".to_string(),
            site: Some(site.to_string()),
            ..Default::default()
        })
    }

    /// A microblog mock with only the publishing subset
    pub fn microblog(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock platform that fails authentication
    pub fn auth_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            auth_succeeds: false,
            auth_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn with_posts(self, posts: Vec<PostSummary>) -> Self {
        self.lock().posts = posts;
        self
    }

    pub fn with_trash(self, trash: Vec<PostSummary>) -> Self {
        self.lock().trash = trash;
        self
    }

    pub fn with_media(self, media: Vec<MediaSummary>) -> Self {
        self.lock().media = media;
        self
    }

    pub fn with_site_info(self, info: Value) -> Self {
        self.lock().site_info = info;
        self
    }

    pub fn with_daily_views(self, post_id: u64, daily: Vec<u64>) -> Self {
        self.lock().daily_views.insert(post_id, daily);
        self
    }

    pub fn with_search_terms(self, terms: Vec<SearchTerm>) -> Self {
        self.lock().search_terms = terms;
        self
    }

    pub fn config_mut(&mut self) -> &mut MockConfig {
        &mut self.config
    }

    /// Shared handle on the mock's state
    pub fn state(&self) -> Arc<Mutex<MockState>> {
        Arc::clone(&self.config.state)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.config
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }

    fn require_blog(&self, feature: &str) -> Result<()> {
        if self.config.site.is_none() {
            return Err(PlatformError::NotImplemented(format!(
                "{} does not support {}",
                self.config.name, feature
            ))
            .into());
        }
        Ok(())
    }

    async fn enter_delete(&self) {
        {
            let mut state = self.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }

    fn exit_delete(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

fn page_of<T: Clone>(items: &[T], page: u32, number: u32) -> Vec<T> {
    let start = (page.saturating_sub(1) as usize).saturating_mul(number as usize);
    items
        .iter()
        .skip(start)
        .take(number as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn site(&self) -> Option<&str> {
        self.config.site.as_deref()
    }

    async fn authenticate(&mut self) -> Result<()> {
        self.lock().auth_calls += 1;

        if self.config.auth_succeeds {
            Ok(())
        } else {
            let error_msg = self
                .config
                .auth_error
                .clone()
                .unwrap_or_else(|| "Mock authentication failed".to_string());
            Err(PlatformError::Authentication(error_msg).into())
        }
    }

    async fn upload_media(&self, media: &MediaItem) -> Result<UploadedMedia> {
        let index = {
            let mut state = self.lock();
            state.calls.push(format!("upload_media {}", media.filename));
            state.count("upload_media") - 1
        };

        if self.config.fail_upload_at == Some(index) {
            return Err(PlatformError::Api {
                operation: "upload media".to_string(),
                status: 500,
                body: format!("mock upload {} rejected", index),
            }
            .into());
        }

        self.lock().uploads.push(media.clone());
        let n = index as u64 + 1;
        Ok(match &self.config.site {
            Some(site) => UploadedMedia {
                id: RemoteId::Number(100 + n),
                url: Some(format!("https://{}/media/{}", site, media.filename)),
            },
            None => UploadedMedia {
                id: RemoteId::Text(format!("{}-media-{}", self.config.name, n)),
                url: None,
            },
        })
    }

    async fn update_media_alt_text(&self, id: &RemoteId, alt: &str) -> Result<()> {
        self.record(format!("update_media_alt_text {}", id));
        if let Some(error) = &self.config.alt_text_error {
            return Err(PlatformError::network("update media alt text", error).into());
        }
        self.lock().alt_texts.push((id.clone(), alt.to_string()));
        Ok(())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost> {
        self.record("create_post".to_string());
        if let Some(error) = &self.config.post_error {
            return Err(PlatformError::Api {
                operation: "create post".to_string(),
                status: 400,
                body: error.clone(),
            }
            .into());
        }

        let n = {
            let mut state = self.lock();
            state.drafts.push(draft.clone());
            state.drafts.len() as u64
        };
        Ok(match &self.config.site {
            Some(site) => CreatedPost {
                id: RemoteId::Number(1000 + n),
                link: Some(format!("https://{}/?p={}", site, 1000 + n)),
            },
            None => CreatedPost {
                id: RemoteId::Text(format!("{}", 9000 + n)),
                link: Some(format!("https://{}.example/status/{}", self.config.name, 9000 + n)),
            },
        })
    }

    async fn list_posts(
        &self,
        page: u32,
        number: u32,
        status: Option<&str>,
    ) -> Result<Vec<PostSummary>> {
        self.require_blog("post listing")?;
        let mut state = self.lock();
        state.calls.push(format!("list_posts {}", page));
        state.post_pages.push((page, status.map(str::to_string)));

        if let Some(error) = &self.config.list_error {
            return Err(PlatformError::network("list posts", error).into());
        }

        Ok(match status {
            Some("trash") => page_of(&state.trash, page, number),
            _ => page_of(&state.posts, page, number),
        })
    }

    async fn delete_post(&self, id: u64, permanent: bool) -> Result<()> {
        self.require_blog("post deletion")?;
        self.record(format!("delete_post {}", id));
        self.enter_delete().await;

        let result = if self.config.failing_post_deletes.contains(&id) {
            Err(PlatformError::Api {
                operation: "delete post".to_string(),
                status: 403,
                body: format!("post {} is locked", id),
            }
            .into())
        } else {
            let mut state = self.lock();
            if permanent {
                state.trash.retain(|p| p.id != id);
            } else if let Some(pos) = state.posts.iter().position(|p| p.id == id) {
                let post = state.posts.remove(pos);
                state.trash.push(post);
            }
            state.deleted_posts.push(id);
            Ok(())
        };

        self.exit_delete();
        result
    }

    async fn empty_trash(&self) -> Result<Vec<u64>> {
        self.require_blog("trash")?;
        let mut state = self.lock();
        state.calls.push("empty_trash".to_string());
        let purged: Vec<u64> = state.trash.drain(..).map(|p| p.id).collect();
        Ok(purged)
    }

    async fn site_info(&self, fields: &str) -> Result<Value> {
        self.require_blog("site info")?;
        let mut state = self.lock();
        state.calls.push(format!("site_info {}", fields));
        Ok(state.site_info.clone())
    }

    async fn list_media(
        &self,
        _post_id: Option<u64>,
        page: u32,
        number: u32,
    ) -> Result<Vec<MediaSummary>> {
        self.require_blog("media listing")?;
        let mut state = self.lock();
        state.calls.push(format!("list_media {}", page));
        state.media_pages.push(page);
        Ok(page_of(&state.media, page, number))
    }

    async fn delete_media(&self, id: u64) -> Result<()> {
        self.require_blog("media deletion")?;
        self.record(format!("delete_media {}", id));
        self.enter_delete().await;

        let result = if self.config.failing_media_deletes.contains(&id) {
            Err(PlatformError::Api {
                operation: "delete media".to_string(),
                status: 404,
                body: format!("media {} not found", id),
            }
            .into())
        } else {
            let mut state = self.lock();
            state.media.retain(|m| m.id != id);
            state.deleted_media.push(id);
            Ok(())
        };

        self.exit_delete();
        result
    }

    async fn post_views(&self, post_id: u64, _days: u32) -> Result<PostViews> {
        self.require_blog("post statistics")?;
        self.record(format!("post_views {}", post_id));
        if self.config.failing_views.contains(&post_id) {
            return Err(PlatformError::Api {
                operation: "fetch post views".to_string(),
                status: 500,
                body: "stats unavailable".to_string(),
            }
            .into());
        }

        let state = self.lock();
        let daily: Vec<u64> = state
            .daily_views
            .get(&post_id)
            .cloned()
            .unwrap_or_default();
        Ok(PostViews {
            views: Value::from(daily.iter().sum::<u64>()),
            daily,
        })
    }

    async fn search_terms(&self, _days: u32) -> Result<Vec<SearchTerm>> {
        self.require_blog("search terms")?;
        let mut state = self.lock();
        state.calls.push("search_terms".to_string());
        Ok(state.search_terms.clone())
    }
}
