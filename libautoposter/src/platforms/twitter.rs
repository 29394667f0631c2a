//! Twitter platform implementation
//!
//! Uses OAuth 1.0a user context (HMAC-SHA1) for every request: v1.1 for
//! credential verification and media upload, v2 for creating tweets.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use sha1::Sha1;
use std::time::Duration;

use crate::config::{HttpConfig, TwitterAccount, TwitterConfig};
use crate::error::{AccountError, PlatformError, Result};
use crate::media::mime_for;
use crate::platforms::Platform;
use crate::types::{CreatedPost, MediaItem, PostDraft, RemoteId, UploadedMedia};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_UPLOAD_BASE: &str = "https://upload.twitter.com";

/// RFC 3986 unreserved characters stay literal
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// Compute an OAuth 1.0a HMAC-SHA1 signature
///
/// `params` holds every oauth_* parameter plus query parameters; JSON and
/// multipart bodies are not signed.
pub fn oauth1_signature(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));

    // HMAC accepts keys of any length
    let mut mac = match HmacSha1::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(base.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// OAuth 1.0a user-context credentials
pub struct TwitterCredentials {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    pub access_token: String,
    pub access_token_secret: SecretString,
}

/// Twitter client scoped to one user account
pub struct TwitterClient {
    http: Client,
    api_base: String,
    upload_base: String,
    credentials: TwitterCredentials,
    screen_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    #[serde(default)]
    media_id_string: Option<String>,
    #[serde(default)]
    media_id: Option<u64>,
}

impl TwitterClient {
    pub fn new(credentials: TwitterCredentials, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::network("build HTTP client", e))?;

        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            credentials,
            screen_name: None,
        })
    }

    pub fn with_endpoints(mut self, api_base: Option<&str>, upload_base: Option<&str>) -> Self {
        if let Some(base) = api_base {
            self.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = upload_base {
            self.upload_base = base.trim_end_matches('/').to_string();
        }
        self
    }

    /// Create a client from a validated account entry
    ///
    /// The bearer token is validated by the registry but not needed for
    /// user-context calls.
    pub fn from_account(
        account: &TwitterAccount,
        platform: &TwitterConfig,
        http: &HttpConfig,
    ) -> Result<Self> {
        let field = |value: &Option<String>| value.clone().ok_or(AccountError::Misconfigured);

        let credentials = TwitterCredentials {
            consumer_key: field(&account.consumer_key)?,
            consumer_secret: SecretString::from(field(&account.consumer_secret)?),
            access_token: field(&account.access_token)?,
            access_token_secret: SecretString::from(field(&account.access_token_secret)?),
        };

        let client = Self::new(credentials, Duration::from_secs(http.timeout_secs))?;
        Ok(client.with_endpoints(platform.api_base.as_deref(), platform.upload_base.as_deref()))
    }

    pub fn screen_name(&self) -> Option<&str> {
        self.screen_name.as_deref()
    }

    /// Build the `Authorization: OAuth ...` header value
    fn authorization(&self, method: &Method, url: &str, query: &[(&str, &str)]) -> String {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.credentials.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            (
                "oauth_timestamp".to_string(),
                chrono::Utc::now().timestamp().to_string(),
            ),
            ("oauth_token".to_string(), self.credentials.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut signed = oauth.clone();
        signed.extend(query.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let signature = oauth1_signature(
            method.as_str(),
            url,
            &signed,
            self.credentials.consumer_secret.expose_secret(),
            self.credentials.access_token_secret.expose_secret(),
        );
        oauth.push(("oauth_signature".to_string(), signature));
        oauth.sort();

        let fields = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {}", fields)
    }

    fn signed(&self, method: Method, url: &str, query: &[(&str, &str)]) -> RequestBuilder {
        let header = self.authorization(&method, url, query);
        self.http
            .request(method, url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, header)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::network(operation, e))?;

        if status.as_u16() == 401 {
            return Err(PlatformError::Authentication(format!(
                "{} rejected the OAuth credentials",
                operation
            ))
            .into());
        }
        if !status.is_success() {
            return Err(PlatformError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|e| PlatformError::parse(operation, e.to_string()).into())
    }
}

#[async_trait]
impl Platform for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn authenticate(&mut self) -> Result<()> {
        const OP: &str = "verify credentials";

        let url = format!("{}/1.1/account/verify_credentials.json", self.api_base);
        let body = self.send(OP, self.signed(Method::GET, &url, &[])).await?;
        let user: VerifiedUser = serde_json::from_value(body)
            .map_err(|e| PlatformError::Authentication(format!("{}: {}", OP, e)))?;

        tracing::info!("authenticated with Twitter as @{}", user.screen_name);
        self.screen_name = Some(user.screen_name);
        Ok(())
    }

    async fn upload_media(&self, media: &MediaItem) -> Result<UploadedMedia> {
        const OP: &str = "upload media";

        let url = format!("{}/1.1/media/upload.json", self.upload_base);
        let part = Part::bytes(media.data.clone())
            .file_name(media.filename.clone())
            .mime_str(mime_for(media))
            .map_err(|e| PlatformError::network(OP, e))?;
        let request = self
            .signed(Method::POST, &url, &[])
            .multipart(Form::new().part("media", part));

        let body = self.send(OP, request).await?;
        let uploaded: MediaUploadResponse =
            serde_json::from_value(body).map_err(|e| PlatformError::parse(OP, e.to_string()))?;

        let id = uploaded
            .media_id_string
            .or_else(|| uploaded.media_id.map(|id| id.to_string()))
            .ok_or_else(|| PlatformError::parse(OP, "no media id in response"))?;

        Ok(UploadedMedia {
            id: RemoteId::Text(id),
            url: None,
        })
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost> {
        const OP: &str = "create tweet";

        let mut payload = json!({ "text": draft.body });
        if !draft.media_ids.is_empty() {
            let ids: Vec<String> = draft.media_ids.iter().map(|id| id.to_string()).collect();
            payload["media"] = json!({ "media_ids": ids });
        }

        let url = format!("{}/2/tweets", self.api_base);
        let body = self
            .send(OP, self.signed(Method::POST, &url, &[]).json(&payload))
            .await?;

        let id = body
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PlatformError::parse(OP, "no tweet id in response"))?
            .to_string();
        let link = self
            .screen_name
            .as_ref()
            .map(|name| format!("https://twitter.com/{}/status/{}", name, id));

        Ok(CreatedPost {
            id: RemoteId::Text(id),
            link,
        })
    }
}
