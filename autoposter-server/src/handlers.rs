//! Request handlers
//!
//! Domain failures come back as HTTP 200 with an `error` field. Only requests
//! that cannot be interpreted (bad JSON, bad query values, missing text or
//! ids) are answered with 422.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use libautoposter::config::PlanId;
use libautoposter::media::MediaPayload;
use libautoposter::service::cleanup::CleanupItem;
use libautoposter::service::draft::DraftRequest;
use libautoposter::types::{DraftResult, PaidContent, PlatformKind, PostRequest};
use libautoposter::AutoPosterError;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::AppState;

/// Account used when a request does not name one
pub const DEFAULT_ACCOUNT: &str = "default";

/// A request the server refuses to interpret, answered with 422
#[derive(Debug)]
pub struct ApiError(String);

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        debug!(error = %self.0, "Rejecting request");
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": self.0 }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(rejection.body_text())
    }
}

/// Wrap a service result as `{key: value}` or `{error}`
///
/// Input validation errors raised by the service still become 422.
fn reply<T: Serialize>(key: &str, result: libautoposter::Result<T>) -> Result<Json<Value>, ApiError> {
    match result {
        Ok(value) => {
            let value = serde_json::to_value(value).map_err(|e| ApiError::new(e.to_string()))?;
            let mut body = Map::new();
            body.insert(key.to_string(), value);
            Ok(Json(Value::Object(body)))
        }
        Err(AutoPosterError::InvalidInput(message)) => Err(ApiError(message)),
        Err(e) => Ok(Json(json!({ "error": e.public_message() }))),
    }
}

fn default_account() -> String {
    DEFAULT_ACCOUNT.to_string()
}

pub async fn root() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Publish request body shared by every platform
///
/// Browser-only fields (`thumbnail`, `paid`) are ignored by the REST
/// platforms, and the paid block fields are ignored by the browser platform.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublishBody {
    pub account: Option<String>,
    pub text: Option<String>,
    /// Accepted as an alias for `text`
    pub content: Option<String>,
    pub title: Option<String>,
    pub media: Option<Vec<MediaPayload>>,
    pub thumbnail: Option<MediaPayload>,
    pub paid: bool,
    pub paid_content: Option<String>,
    pub paid_title: Option<String>,
    pub paid_message: Option<String>,
    pub plan_id: Option<PlanId>,
    pub categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

impl PublishBody {
    pub fn into_request(self) -> Result<PostRequest, ApiError> {
        let text = self
            .text
            .or(self.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::new("text is required"))?;

        let paid_content = self
            .paid_content
            .filter(|body| !body.trim().is_empty())
            .map(|body| PaidContent {
                body,
                title: self.paid_title,
                message: self.paid_message,
                plan_id: self.plan_id,
            });

        Ok(PostRequest {
            account: self.account.unwrap_or_else(default_account),
            title: self.title,
            text,
            media: self.media.unwrap_or_default(),
            thumbnail: self.thumbnail,
            paid: self.paid,
            paid_content,
            categories: self.categories.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
        })
    }
}

pub async fn publish(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let kind = match platform.parse::<PlatformKind>() {
        Ok(kind) => kind,
        Err(message) => {
            return Ok((StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response());
        }
    };

    let Json(body) = body?;
    let request = body.into_request()?;
    info!(
        platform = %kind,
        account = %request.account,
        media = request.media.len(),
        "Publish request"
    );

    let result = state.service.publish().publish(kind, &request).await;
    Ok(Json(result).into_response())
}

/// `POST /note/draft` body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DraftBody {
    pub account: Option<String>,
    pub content: Option<String>,
    /// Accepted as an alias for `content`
    pub text: Option<String>,
    pub title: Option<String>,
    pub images: Option<Vec<MediaPayload>>,
}

impl DraftBody {
    pub fn into_request(self) -> Result<DraftRequest, ApiError> {
        let content = self
            .content
            .or(self.text)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ApiError::new("content is required"))?;

        Ok(DraftRequest {
            account: self.account.unwrap_or_else(default_account),
            content,
            title: self.title,
            images: self.images.unwrap_or_default(),
        })
    }
}

pub async fn note_draft(
    State(state): State<AppState>,
    body: Result<Json<DraftBody>, JsonRejection>,
) -> Result<Json<DraftResult>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request()?;
    info!(
        account = %request.account,
        images = request.images.len(),
        "Draft request"
    );

    Ok(Json(state.service.draft().create_note_draft(&request).await))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_number")]
    pub number: u32,
}

fn default_page() -> u32 {
    1
}

fn default_number() -> u32 {
    10
}

pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let result = state
        .service
        .stats()
        .list_posts(&query.account, query.page, query.number)
        .await;
    reply("posts", result)
}

/// Split a raw query string into decoded key/value pairs
///
/// Kept by hand so that repeated keys (`ids=1&ids=2`) survive.
fn query_pairs(raw: &str) -> Vec<(String, String)> {
    fn decode(s: &str) -> String {
        let s = s.replace('+', " ");
        percent_decode_str(&s).decode_utf8_lossy().into_owned()
    }

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// Post ids from repeated and/or comma separated `ids` parameters
fn parse_ids(pairs: &[(String, String)]) -> Result<Vec<u64>, ApiError> {
    let mut ids = Vec::new();
    for (_, value) in pairs.iter().filter(|(key, _)| key == "ids") {
        for raw in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let id = raw
                .parse::<u64>()
                .map_err(|_| ApiError::new(format!("invalid post id: {}", raw)))?;
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ApiError::new("ids is required"));
    }
    Ok(ids)
}

pub async fn delete_posts(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let pairs = query_pairs(raw.as_deref().unwrap_or(""));
    let ids = parse_ids(&pairs)?;
    let account = pairs
        .iter()
        .rev()
        .find(|(key, _)| key == "account")
        .map(|(_, value)| value.clone())
        .unwrap_or_else(default_account);

    info!(account = %account, count = ids.len(), "Delete posts request");
    match state.service.stats().delete_posts(&account, &ids).await {
        Ok(report) => Ok(Json(json!(report))),
        Err(e) => Ok(Json(json!({ "error": e.public_message() }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ViewsQuery {
    #[serde(default = "default_account")]
    pub account: String,
    pub post_id: u64,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchTermsQuery {
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    7
}

pub async fn post_views(
    State(state): State<AppState>,
    query: Result<Query<ViewsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let result = state
        .service
        .stats()
        .post_views(&query.account, query.post_id, query.days)
        .await;
    reply("views", result)
}

pub async fn search_terms(
    State(state): State<AppState>,
    query: Result<Query<SearchTermsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let result = state
        .service
        .stats()
        .search_terms(&query.account, query.days)
        .await;
    reply("terms", result)
}

#[derive(Debug, Deserialize)]
pub struct CleanupBody {
    pub items: Vec<CleanupItem>,
}

pub async fn cleanup(
    State(state): State<AppState>,
    body: Result<Json<CleanupBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    info!(accounts = body.items.len(), "Cleanup request");
    let results = state.service.cleanup().cleanup_batch(&body.items).await;
    Ok(Json(json!({ "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &str) -> Vec<(String, String)> {
        query_pairs(raw)
    }

    #[test]
    fn test_query_pairs_decode() {
        assert_eq!(
            pairs("account=my%20blog&ids=1&flag"),
            vec![
                ("account".to_string(), "my blog".to_string()),
                ("ids".to_string(), "1".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
        assert_eq!(pairs("a=x+y")[0].1, "x y");
    }

    #[test]
    fn test_parse_ids_repeated_and_comma_separated() {
        assert_eq!(parse_ids(&pairs("ids=1&ids=2,3&ids=%2C4")).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_ids_rejects_missing_and_garbage() {
        assert_eq!(parse_ids(&pairs("account=a")).unwrap_err().0, "ids is required");
        assert_eq!(parse_ids(&pairs("ids=")).unwrap_err().0, "ids is required");
        assert_eq!(parse_ids(&pairs("ids=1,x")).unwrap_err().0, "invalid post id: x");
    }

    #[test]
    fn test_draft_body_defaults() {
        let body: DraftBody = serde_json::from_value(json!({"content": "hello"})).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.account, "default");
        assert!(request.images.is_empty());

        let body: DraftBody =
            serde_json::from_value(json!({"content": " ", "images": ["aGk="]})).unwrap();
        assert_eq!(body.into_request().unwrap_err().0, "content is required");
    }

    #[test]
    fn test_publish_body_content_alias() {
        let body: PublishBody = serde_json::from_value(json!({"content": "hi", "account": "a"})).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.text, "hi");
        assert_eq!(request.account, "a");
    }

    #[test]
    fn test_publish_body_requires_text() {
        let body: PublishBody = serde_json::from_value(json!({"text": "   "})).unwrap();
        assert_eq!(body.into_request().unwrap_err().0, "text is required");
    }

    #[test]
    fn test_publish_body_paid_fields() {
        let body: PublishBody = serde_json::from_value(json!({
            "text": "teaser",
            "media": null,
            "paid_content": "secret",
            "paid_title": "Members",
            "plan_id": "42"
        }))
        .unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.account, DEFAULT_ACCOUNT);
        assert!(request.media.is_empty());
        let paid = request.paid_content.unwrap();
        assert_eq!(paid.body, "secret");
        assert_eq!(paid.title.as_deref(), Some("Members"));
        assert_eq!(paid.plan_id, Some(PlanId::Text("42".to_string())));
    }
}
