//! note.com REST client for drafts
//!
//! Publishing to note.com goes through the browser (see
//! [`crate::automation`]); drafts do not need it. Signing in sets a session
//! cookie that the client's cookie store replays on every later request.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::time::Duration;

use crate::automation::NoteCredentials;
use crate::config::NoteConfig;
use crate::error::{PlatformError, Result};
use crate::media::mime_for;
use crate::types::{MediaItem, NoteDraft, RemoteId};

pub const DEFAULT_API_BASE: &str = "https://note.com";

/// Cookie-session client for the note.com v1 API
pub struct NoteApiClient {
    http: Client,
    base_url: String,
    signed_in: bool,
}

impl NoteApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::network("build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signed_in: false,
        })
    }

    pub fn from_config(note: &NoteConfig) -> Result<Self> {
        Self::new(
            note.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
            Duration::from_secs(note.api_timeout_secs),
        )
    }

    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Sign in and keep the session cookie
    ///
    /// # Errors
    ///
    /// `PlatformError::Authentication` unless the upstream answers 200 or 201.
    pub async fn login(&mut self, credentials: &NoteCredentials) -> Result<()> {
        let payload = json!({
            "login": credentials.username,
            "password": credentials.password.expose_secret(),
        });

        let response = self
            .http
            .post(self.url("/sessions/sign_in"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PlatformError::Authentication(format!("sign-in request failed: {}", e)))?;

        let status = response.status().as_u16();
        tracing::debug!("note sign-in status: {}, body: [redacted]", status);
        if status != 200 && status != 201 {
            return Err(PlatformError::Authentication(format!(
                "note sign-in returned HTTP {}",
                status
            ))
            .into());
        }

        self.signed_in = true;
        tracing::info!("signed in to note.com as {}", credentials.username);
        Ok(())
    }

    /// Upload one image and return its CDN URL
    pub async fn upload_image(&self, media: &MediaItem) -> Result<String> {
        const OP: &str = "upload image";

        let part = Part::bytes(media.data.clone())
            .file_name(media.filename.clone())
            .mime_str(mime_for(media))
            .map_err(|e| PlatformError::network(OP, e))?;
        let form = Form::new().part("file", part);

        let body = self
            .send(OP, self.http.post(self.url("/upload_image")).multipart(form))
            .await?;
        Ok(parse_image_url(&body)?)
    }

    /// Create an empty text note, then save `body_html` into it as a draft
    pub async fn create_draft(&self, title: &str, body_html: &str) -> Result<NoteDraft> {
        let created = self
            .send(
                "create text note",
                self.http.post(self.url("/text_notes")).json(&json!({
                    "name": title,
                    "body": "",
                    "template_key": null,
                })),
            )
            .await?;
        let draft = parse_created_note(&created)?;

        self.send(
            "save draft",
            self.http
                .put(self.url(&format!("/text_notes/{}", draft.note_id)))
                .json(&json!({
                    "name": title,
                    "body": body_html,
                    "status": "draft",
                })),
        )
        .await?;

        tracing::info!("saved note draft {}", draft.note_id);
        Ok(draft)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Value> {
        if !self.signed_in {
            return Err(PlatformError::Authentication(
                "note client is not signed in".to_string(),
            )
            .into());
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;

        if !status.is_success() {
            return Err(PlatformError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            }
            .into());
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::parse(operation, e.to_string()).into())
    }
}

/// note.com wraps most payloads in `data`
fn unwrap_data(body: &Value) -> &Value {
    body.get("data").unwrap_or(body)
}

/// Image URL from an upload response: `url`, then `cdn_url`
pub fn parse_image_url(body: &Value) -> std::result::Result<String, PlatformError> {
    let data = unwrap_data(body);
    ["url", "cdn_url"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlatformError::parse("upload image", "no URL field recognized"))
}

/// Identifiers of a freshly created text note
pub fn parse_created_note(body: &Value) -> std::result::Result<NoteDraft, PlatformError> {
    let data = unwrap_data(body);
    let note_id = data
        .get("id")
        .and_then(|v| serde_json::from_value::<RemoteId>(v.clone()).ok())
        .ok_or_else(|| PlatformError::parse("create text note", "no note id in response"))?;
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(NoteDraft {
        note_id,
        note_key: text("key"),
        draft_url: text("draft_url"),
    })
}
