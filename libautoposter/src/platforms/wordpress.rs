//! WordPress.com platform implementation
//!
//! Talks to the WordPress.com REST API v1.1. Authentication uses the OAuth2
//! password grant once per process; the bearer token is reused for every
//! later call. This is the only client that implements the full
//! listing/cleanup/statistics surface of [`Platform`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::{HttpConfig, WordpressAccount, WordpressConfig};
use crate::error::{AccountError, PlatformError, Result};
use crate::media::mime_for;
use crate::platforms::Platform;
use crate::types::{
    CreatedPost, MediaItem, MediaSummary, PostDraft, PostSummary, PostViews, RemoteId,
    SearchTerm, UploadedMedia,
};

pub const DEFAULT_TOKEN_URL: &str = "https://public-api.wordpress.com/oauth2/token";
pub const DEFAULT_API_BASE: &str = "https://public-api.wordpress.com/rest/v1.1/sites/{site}";

/// Page size used when walking the trash
const TRASH_PAGE_SIZE: u32 = 100;

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY: usize = 500;

/// OAuth2 password-grant credentials
pub struct WordpressCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
}

/// WordPress.com client scoped to one site
pub struct WordpressClient {
    http: Client,
    site: String,
    api_base: String,
    token_url: String,
    credentials: WordpressCredentials,
    token: Option<SecretString>,
}

impl WordpressClient {
    /// Create an unauthenticated client
    ///
    /// # Arguments
    ///
    /// * `site` - site domain or numeric id (e.g., "myblog.wordpress.com")
    /// * `credentials` - OAuth2 application and user credentials
    /// * `timeout` - client-side timeout applied to every request
    pub fn new(site: String, credentials: WordpressCredentials, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::network("build HTTP client", e))?;

        Ok(Self {
            api_base: DEFAULT_API_BASE.replace("{site}", &site),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http,
            site,
            credentials,
            token: None,
        })
    }

    /// Point the client at different endpoints; `{site}` in `api_base` is substituted
    pub fn with_endpoints(mut self, api_base: Option<&str>, token_url: Option<&str>) -> Self {
        if let Some(base) = api_base {
            self.api_base = base.replace("{site}", &self.site);
        }
        if let Some(url) = token_url {
            self.token_url = url.to_string();
        }
        self
    }

    /// Create a client from a validated account entry
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Misconfigured` if a required field is missing.
    pub fn from_account(
        account: &WordpressAccount,
        platform: &WordpressConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let field = |value: &Option<String>| value.clone().ok_or(AccountError::Misconfigured);

        let credentials = WordpressCredentials {
            client_id: field(&account.client_id)?,
            client_secret: SecretString::from(field(&account.client_secret)?),
            username: field(&account.username)?,
            password: SecretString::from(field(&account.password)?),
        };

        let client = Self::new(
            field(&account.site)?,
            credentials,
            Duration::from_secs(http.timeout_secs),
        )?;
        Ok(client.with_endpoints(platform.api_base.as_deref(), platform.token_url.as_deref()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or_else(|| {
            PlatformError::Authentication("WordPress client is not authenticated".to_string())
        })?;
        Ok(request.bearer_auth(token.expose_secret()))
    }

    /// Send an authorized request and return the JSON body
    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Value> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;

        if !status.is_success() {
            tracing::debug!("{} failed with HTTP {}", operation, status.as_u16());
            return Err(PlatformError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            }
            .into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::parse(operation, e.to_string()).into())
    }
}

impl WordpressClient {
    /// Every post id currently in the trash
    ///
    /// The whole trash is listed before anything is purged, so deletions
    /// cannot shift later pages. Listing stops at the first short page or at
    /// a page that brings no new ids.
    async fn trashed_post_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1;
        loop {
            let items = self
                .list_posts(page, TRASH_PAGE_SIZE, Some("trash"))
                .await?;
            let full = items.len() >= TRASH_PAGE_SIZE as usize;
            let before = ids.len();
            ids.extend(items.into_iter().map(|p| p.id).filter(|id| seen.insert(*id)));
            if !full || ids.len() == before {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// One media object as returned by `media/new`
#[derive(Debug, Default, Deserialize)]
struct RawMedia {
    #[serde(default)]
    id: Option<RemoteId>,
    #[serde(default, rename = "ID")]
    id_upper: Option<RemoteId>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default, rename = "URL")]
    url_upper: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// `media/new` answers either with a `media` array or a flat object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Batch { media: Vec<RawMedia> },
    Flat(RawMedia),
}

/// Parse an upload response, failing closed
///
/// The first item of a `media` array is preferred over the flat shape; the
/// URL is taken from `source_url`, then `URL`, then `link`.
pub fn parse_upload_response(body: Value) -> std::result::Result<UploadedMedia, PlatformError> {
    const OP: &str = "upload media";

    let response: UploadResponse =
        serde_json::from_value(body).map_err(|e| PlatformError::parse(OP, e.to_string()))?;

    let item = match response {
        UploadResponse::Batch { media } => media
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::parse(OP, "empty media list"))?,
        UploadResponse::Flat(item) => item,
    };

    let id = item
        .id
        .or(item.id_upper)
        .ok_or_else(|| PlatformError::parse(OP, "no media id in response"))?;
    let url = item
        .source_url
        .or(item.url_upper)
        .or(item.link)
        .ok_or_else(|| PlatformError::parse(OP, "no URL field recognized"))?;

    Ok(UploadedMedia { id, url: Some(url) })
}

/// Parse `search_terms: [[term, views], ...]`, skipping entries that are not pairs
pub fn parse_search_terms(body: &Value) -> Vec<SearchTerm> {
    body.get("search_terms")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let pair = item.as_array().filter(|a| a.len() >= 2)?;
                    let term = match &pair[0] {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some(SearchTerm {
                        term,
                        views: count_value(&pair[1]),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a post stats response into the raw `views` value plus per-day counts
pub fn parse_post_views(body: &Value) -> PostViews {
    let daily = body
        .get("data")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.as_array().filter(|r| r.len() >= 2))
                .map(|row| count_value(&row[1]))
                .collect()
        })
        .unwrap_or_default();

    PostViews {
        views: body.get("views").cloned().unwrap_or(Value::Null),
        daily,
    }
}

fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug, Deserialize)]
struct RawPost {
    #[serde(rename = "ID")]
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostList {
    #[serde(default)]
    posts: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawMediaSummary {
    #[serde(rename = "ID")]
    id: u64,
    #[serde(default, rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaList {
    #[serde(default)]
    media: Vec<RawMediaSummary>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[async_trait]
impl Platform for WordpressClient {
    fn name(&self) -> &str {
        "wordpress"
    }

    fn site(&self) -> Option<&str> {
        Some(&self.site)
    }

    async fn authenticate(&mut self) -> Result<()> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.expose_secret()),
            ("scope", "global"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| PlatformError::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        tracing::debug!("Auth response status: {}, body: [redacted]", status.as_u16());
        if !status.is_success() {
            return Err(PlatformError::Authentication(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            ))
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            PlatformError::Authentication(format!("unreadable token response: {}", e))
        })?;
        let token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PlatformError::Authentication("No access_token in response".to_string())
            })?;

        self.token = Some(SecretString::from(token));
        tracing::info!("authenticated with WordPress site {}", self.site);
        Ok(())
    }

    async fn upload_media(&self, media: &MediaItem) -> Result<UploadedMedia> {
        const OP: &str = "upload media";

        let part = Part::bytes(media.data.clone())
            .file_name(media.filename.clone())
            .mime_str(mime_for(media))
            .map_err(|e| PlatformError::network(OP, e))?;
        let form = Form::new().part("media[]", part);

        tracing::debug!(
            "uploading {} ({} bytes) to {}",
            media.filename,
            media.data.len(),
            self.site
        );
        let body = self
            .send(OP, self.http.post(self.url("/media/new")).multipart(form))
            .await?;
        Ok(parse_upload_response(body)?)
    }

    async fn update_media_alt_text(&self, id: &RemoteId, alt: &str) -> Result<()> {
        let url = self.url(&format!("/media/{}", id));
        self.send(
            "update media alt text",
            self.http.post(url).json(&json!({ "alt_text": alt })),
        )
        .await?;
        Ok(())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost> {
        const OP: &str = "create post";

        let mut payload = json!({
            "title": draft.title.as_deref().unwrap_or_default(),
            "content": draft.body,
            "status": "publish",
        });
        if let Some(featured) = &draft.featured_media {
            payload["featured_image"] = json!(featured);
        }
        if !draft.categories.is_empty() {
            payload["categories"] = json!(draft.categories.join(","));
        }
        if !draft.tags.is_empty() {
            payload["tags"] = json!(draft.tags.join(","));
        }

        let body = self
            .send(OP, self.http.post(self.url("/posts/new")).json(&payload))
            .await?;

        let id = body
            .get("ID")
            .or_else(|| body.get("id"))
            .and_then(|v| serde_json::from_value::<RemoteId>(v.clone()).ok())
            .ok_or_else(|| PlatformError::parse(OP, "no post id in response"))?;
        let link = body
            .get("URL")
            .or_else(|| body.get("link"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(CreatedPost { id, link })
    }

    async fn list_posts(
        &self,
        page: u32,
        number: u32,
        status: Option<&str>,
    ) -> Result<Vec<PostSummary>> {
        const OP: &str = "list posts";

        let mut request = self
            .http
            .get(self.url("/posts"))
            .query(&[("page", page), ("number", number)]);
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }

        let body = self.send(OP, request).await?;
        let list: PostList =
            serde_json::from_value(body).map_err(|e| PlatformError::parse(OP, e.to_string()))?;

        Ok(list
            .posts
            .into_iter()
            .map(|p| PostSummary {
                id: p.id,
                title: p.title.unwrap_or_default(),
                date: p.date.unwrap_or_default(),
                url: p.url,
            })
            .collect())
    }

    async fn delete_post(&self, id: u64, permanent: bool) -> Result<()> {
        let mut request = self.http.post(self.url(&format!("/posts/{}/delete", id)));
        if permanent {
            request = request.query(&[("force", 1)]);
        }
        self.send("delete post", request).await?;
        Ok(())
    }

    async fn empty_trash(&self) -> Result<Vec<u64>> {
        let trashed = self.trashed_post_ids().await?;
        let mut deleted = Vec::with_capacity(trashed.len());
        for id in trashed {
            match self.delete_post(id, true).await {
                Ok(()) => deleted.push(id),
                Err(e) => tracing::warn!("failed to purge trashed post {}: {}", id, e),
            }
        }
        Ok(deleted)
    }

    async fn site_info(&self, fields: &str) -> Result<Value> {
        let mut request = self.http.get(self.url(""));
        if !fields.is_empty() {
            request = request.query(&[("fields", fields)]);
        }
        self.send("fetch site info", request).await
    }

    async fn list_media(
        &self,
        post_id: Option<u64>,
        page: u32,
        number: u32,
    ) -> Result<Vec<MediaSummary>> {
        const OP: &str = "list media";

        let mut request = self
            .http
            .get(self.url("/media"))
            .query(&[("page", page), ("number", number)]);
        if let Some(post_id) = post_id {
            request = request.query(&[("post_ID", post_id)]);
        }

        let body = self.send(OP, request).await?;
        let list: MediaList =
            serde_json::from_value(body).map_err(|e| PlatformError::parse(OP, e.to_string()))?;

        Ok(list
            .media
            .into_iter()
            .map(|m| MediaSummary { id: m.id, url: m.url })
            .collect())
    }

    async fn delete_media(&self, id: u64) -> Result<()> {
        let url = self.url(&format!("/media/{}/delete", id));
        self.send("delete media", self.http.post(url)).await?;
        Ok(())
    }

    async fn post_views(&self, post_id: u64, days: u32) -> Result<PostViews> {
        let request = self
            .http
            .get(self.url(&format!("/stats/post/{}", post_id)))
            .query(&[("unit", "day")])
            .query(&[("quantity", days)]);
        let body = self.send("fetch post views", request).await?;
        Ok(parse_post_views(&body))
    }

    async fn search_terms(&self, days: u32) -> Result<Vec<SearchTerm>> {
        let request = self
            .http
            .get(self.url("/stats/search-terms"))
            .query(&[("days", days)]);
        let body = self.send("fetch search terms", request).await?;
        Ok(parse_search_terms(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_prefers_media_array() {
        let uploaded = parse_upload_response(json!({
            "media": [
                {"ID": 11, "URL": "https://x/a.png", "link": "https://x/?p=11"},
                {"ID": 12, "URL": "https://x/b.png"}
            ],
            "id": 99,
            "source_url": "https://x/ignored.png"
        }))
        .unwrap();
        assert_eq!(uploaded.id, RemoteId::Number(11));
        assert_eq!(uploaded.url.as_deref(), Some("https://x/a.png"));
    }

    #[test]
    fn test_parse_upload_flat_object_url_precedence() {
        let uploaded = parse_upload_response(json!({
            "id": 5,
            "URL": "https://x/upper.png",
            "source_url": "https://x/source.png",
            "link": "https://x/link"
        }))
        .unwrap();
        assert_eq!(uploaded.id, RemoteId::Number(5));
        assert_eq!(uploaded.url.as_deref(), Some("https://x/source.png"));

        let uploaded =
            parse_upload_response(json!({"ID": 6, "link": "https://x/link"})).unwrap();
        assert_eq!(uploaded.url.as_deref(), Some("https://x/link"));
    }

    #[test]
    fn test_parse_upload_fails_closed() {
        let err = parse_upload_response(json!({"id": 5})).unwrap_err();
        assert!(err.to_string().contains("no URL field recognized"));

        let err = parse_upload_response(json!({"URL": "https://x/a.png"})).unwrap_err();
        assert!(err.to_string().contains("no media id"));

        let err = parse_upload_response(json!({"media": []})).unwrap_err();
        assert!(err.to_string().contains("empty media list"));
    }

    #[test]
    fn test_parse_search_terms_skips_non_pairs() {
        let terms = parse_search_terms(&json!({
            "search_terms": [["rust", 10], ["tokio", "4"], "broken", [42], ["axum", 3, "extra"]]
        }));
        assert_eq!(
            terms,
            vec![
                SearchTerm { term: "rust".to_string(), views: 10 },
                SearchTerm { term: "tokio".to_string(), views: 4 },
                SearchTerm { term: "axum".to_string(), views: 3 },
            ]
        );
        assert!(parse_search_terms(&json!({})).is_empty());
    }

    #[test]
    fn test_parse_post_views() {
        let views = parse_post_views(&json!({
            "views": 12,
            "data": [["2024-01-01", 5], ["2024-01-02", 7], ["bad"]]
        }));
        assert_eq!(views.views, json!(12));
        assert_eq!(views.daily, vec![5, 7]);

        let views = parse_post_views(&json!({}));
        assert_eq!(views.views, Value::Null);
        assert!(views.daily.is_empty());
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_endpoint_override_substitutes_site() {
        let credentials = WordpressCredentials {
            client_id: "id".to_string(),
            client_secret: SecretString::from("secret".to_string()),
            username: "user".to_string(),
            password: SecretString::from("pass".to_string()),
        };
        let client = WordpressClient::new(
            "blog.example.com".to_string(),
            credentials,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url("/posts"),
            "https://public-api.wordpress.com/rest/v1.1/sites/blog.example.com/posts"
        );

        let client = client.with_endpoints(Some("http://127.0.0.1:9/sites/{site}"), None);
        assert_eq!(client.url("/media"), "http://127.0.0.1:9/sites/blog.example.com/media");
        assert!(!client.is_authenticated());
        assert_eq!(client.site(), Some("blog.example.com"));
    }
}
