//! Mastodon client built on megalodon
//!
//! Only the publishing subset of [`Platform`] is implemented; listing and
//! cleanup stay on the `NotImplemented` defaults.

use async_trait::async_trait;
use megalodon::entities::UploadMedia;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput, UploadMediaInputOptions};
use megalodon::{Megalodon, SNS};

use crate::config::MastodonAccount;
use crate::error::{AccountError, PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{CreatedPost, MediaItem, PostDraft, RemoteId, UploadedMedia};

/// Client for one account on one Mastodon-compatible instance
pub struct MastodonClient {
    client: Box<dyn Megalodon + Send + Sync>,
    instance_url: String,
}

impl MastodonClient {
    /// `instance_url` must carry its scheme; see [`from_account`](Self::from_account)
    /// for the lenient variant.
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| PlatformError::network("create mastodon client", e))?;

        Ok(Self {
            client,
            instance_url,
        })
    }

    /// Build from a config entry, prepending `https://` to bare hosts
    ///
    /// A blank URL or token is `AccountError::Misconfigured`.
    pub fn from_account(account: &MastodonAccount) -> Result<Self> {
        let instance = account
            .instance_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AccountError::Misconfigured)?;
        let token = account
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AccountError::Misconfigured)?;

        Self::new(normalize_instance_url(instance), token.to_string())
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }
}

/// Ensure the instance URL carries a scheme
fn normalize_instance_url(instance: &str) -> String {
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", instance.trim_end_matches('/'))
    }
}

#[async_trait]
impl Platform for MastodonClient {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn authenticate(&mut self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        tracing::info!("authenticated with Mastodon instance {}", self.instance_url);
        Ok(())
    }

    async fn upload_media(&self, media: &MediaItem) -> Result<UploadedMedia> {
        let options = UploadMediaInputOptions {
            description: Some(media.alt_text()),
            ..Default::default()
        };
        let reader = Box::new(std::io::Cursor::new(media.data.clone()));

        let response = self
            .client
            .upload_media_reader(reader, Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "upload media"))?;

        // Large files are processed asynchronously and may not have a URL yet
        let (id, url) = match response.json {
            UploadMedia::Attachment(attachment) => (attachment.id, Some(attachment.url)),
            UploadMedia::AsyncAttachment(attachment) => (attachment.id, attachment.url),
        };

        Ok(UploadedMedia {
            id: RemoteId::Text(id),
            url,
        })
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<CreatedPost> {
        let options = if draft.media_ids.is_empty() {
            None
        } else {
            Some(PostStatusInputOptions {
                media_ids: Some(draft.media_ids.iter().map(|id| id.to_string()).collect()),
                ..Default::default()
            })
        };

        let response = self
            .client
            .post_status(draft.body.clone(), options.as_ref())
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        // Scheduled statuses have no public URL yet
        let created = match response.json {
            PostStatusOutput::Status(status) => CreatedPost {
                id: RemoteId::Text(status.id),
                link: status.url.or(Some(status.uri)),
            },
            PostStatusOutput::ScheduledStatus(scheduled) => CreatedPost {
                id: RemoteId::Text(scheduled.id),
                link: None,
            },
        };

        Ok(created)
    }
}

fn map_megalodon_error(error: megalodon::error::Error, operation: &str) -> PlatformError {
    classify_error(&error.to_string(), operation)
}

/// Sort a megalodon failure into our error kinds
///
/// megalodon only exposes the upstream status inside its message, so the
/// status is recovered from the text: 401/403 mean a bad token, 422 means the
/// instance rejected the content.
fn classify_error(message: &str, operation: &str) -> PlatformError {
    let lower = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    match status_in(message) {
        Some(401 | 403) => PlatformError::Authentication(format!(
            "{} rejected the access token: {}",
            operation, message
        )),
        Some(422) => PlatformError::Validation(format!("{}: {}", operation, message)),
        Some(status) => PlatformError::Api {
            operation: operation.to_string(),
            status,
            body: message.to_string(),
        },
        None if mentions(&["unauthorized", "forbidden"]) => {
            PlatformError::Authentication(format!("{}: {}", operation, message))
        }
        None if mentions(&["json", "deserialize", "parse"]) => PlatformError::parse(operation, message),
        None => PlatformError::network(operation, message),
    }
}

/// First standalone three-digit HTTP status in a message
///
/// Digits inside hosts, ports or longer numbers do not count.
fn status_in(message: &str) -> Option<u16> {
    message
        .split(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '(' | ')' | '[' | ']'))
        .filter(|token| token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|token| token.parse::<u16>().ok())
        .find(|code| (100..=599).contains(code))
}
