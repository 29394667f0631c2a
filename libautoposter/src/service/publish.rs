//! Publishing service
//!
//! Turns a [`PostRequest`] into remote calls: decode and upload media in
//! order, assemble the platform body, create the post and normalize the
//! outcome. Browser-driven platforms are handed to the automation layer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::AccountRegistry;
use crate::automation::{DriverLauncher, NotePublisher, NoteTimeouts};
use crate::config::{NoteConfig, PlanId};
use crate::platforms::Platform;
use crate::types::{
    MediaItem, PaidContent, PlatformKind, PostDraft, PostRequest, PublishResult, UploadedMedia,
};

/// Title used for blog posts created without one
pub const DEFAULT_TITLE: &str = "Untitled";

/// Shown to visitors who are not subscribed to the plan
pub const DEFAULT_PAID_MESSAGE: &str = "This content is for subscribers only.";

/// Publishing service
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct PublishService {
    registry: Arc<AccountRegistry>,
    launcher: Arc<dyn DriverLauncher>,
    note: Arc<NoteConfig>,
}

impl PublishService {
    pub fn new(
        registry: Arc<AccountRegistry>,
        launcher: Arc<dyn DriverLauncher>,
        note: Arc<NoteConfig>,
    ) -> Self {
        Self {
            registry,
            launcher,
            note,
        }
    }

    /// Publish to one account of `kind`
    ///
    /// Never fails: every problem after request parsing is reported through
    /// [`PublishResult::Failed`].
    pub async fn publish(&self, kind: PlatformKind, request: &PostRequest) -> PublishResult {
        if kind.is_browser_driven() {
            return self.publish_note(request).await;
        }

        let client = match self.registry.resolve(kind, &request.account) {
            Ok(client) => client,
            Err(e) => {
                warn!("{} publish rejected for {}: {}", kind, request.account, e);
                return PublishResult::failed(e.public_message());
            }
        };

        let plan = self.registry.plan_id(&request.account);
        let client = client.lock().await;
        publish_with(client.as_ref(), kind, request, plan).await
    }

    async fn publish_note(&self, request: &PostRequest) -> PublishResult {
        let credentials = match self.registry.note_credentials(&request.account) {
            Ok(credentials) => credentials,
            Err(e) => return PublishResult::failed(e.public_message()),
        };

        let driver = match self.launcher.launch().await {
            Ok(driver) => driver,
            Err(e) => {
                warn!("could not start browser for note account {}: {}", request.account, e);
                return PublishResult::failed(e.to_string());
            }
        };

        NotePublisher::new(driver, &self.note.selectors, NoteTimeouts::from_config(&self.note))
            .publish(credentials, request)
            .await
    }
}

/// Run the REST publish flow against an already resolved client
///
/// `account_plan` is the account's plan (or the platform default); a plan on
/// the request's paid content takes precedence over it.
pub async fn publish_with(
    client: &dyn Platform,
    kind: PlatformKind,
    request: &PostRequest,
    account_plan: Option<PlanId>,
) -> PublishResult {
    let mut uploads: Vec<(MediaItem, UploadedMedia)> = Vec::with_capacity(request.media.len());

    for (index, payload) in request.media.iter().enumerate() {
        let item = match payload.decode(index) {
            Ok(item) => item,
            Err(e) => return PublishResult::failed(format!("Media upload failed: {}", e)),
        };

        match client.upload_media(&item).await {
            Ok(uploaded) => {
                info!("uploaded {} to {} as {}", item.filename, kind, uploaded.id);
                uploads.push((item, uploaded));
            }
            Err(e) => {
                warn!("media upload {} to {} failed: {}", index, kind, e);
                return PublishResult::failed(format!("Media upload failed: {}", e.public_message()));
            }
        }
    }

    let draft = match kind {
        PlatformKind::Wordpress => {
            push_alt_texts(client, &uploads).await;

            let mut body = wordpress_body(&request.text, &uploads);
            if let Some(paid) = &request.paid_content {
                let plan = paid.plan_id.clone().or(account_plan);
                body.push('\n');
                body.push_str(&paid_block(paid, plan.as_ref()));
            }

            let title = request
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_TITLE);

            PostDraft {
                title: Some(title.to_string()),
                body,
                featured_media: uploads.first().map(|(_, u)| u.id.clone()),
                media_ids: Vec::new(),
                categories: request.categories.clone(),
                tags: request.tags.clone(),
            }
        }
        _ => PostDraft {
            title: request.title.clone(),
            body: request.text.clone(),
            featured_media: None,
            media_ids: uploads.iter().map(|(_, u)| u.id.clone()).collect(),
            categories: Vec::new(),
            tags: Vec::new(),
        },
    };

    match client.create_post(&draft).await {
        Ok(created) => {
            info!("published to {} account {}: {}", kind, request.account, created.id);
            PublishResult::Published {
                id: created.id,
                link: created.link,
                site: kind.as_str().to_string(),
            }
        }
        Err(e) => {
            warn!("create post on {} failed: {}", kind, e);
            PublishResult::failed(e.public_message())
        }
    }
}

async fn push_alt_texts(client: &dyn Platform, uploads: &[(MediaItem, UploadedMedia)]) {
    for (item, uploaded) in uploads {
        if let Err(e) = client
            .update_media_alt_text(&uploaded.id, &item.alt_text())
            .await
        {
            warn!("could not set alt text on media {}: {}", uploaded.id, e);
        }
    }
}

/// Paragraph plus one `<img>` per upload
pub fn wordpress_body(text: &str, uploads: &[(MediaItem, UploadedMedia)]) -> String {
    let mut body = format!("<p>{}</p>", text);
    for (item, uploaded) in uploads {
        let src = uploaded.url.as_deref().unwrap_or_default();
        body.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" />",
            html_escape::encode_double_quoted_attribute(src),
            html_escape::encode_double_quoted_attribute(&item.alt_text()),
        ));
    }
    body
}

/// WordPress.com premium-content block wrapping the member-only section
pub fn paid_block(paid: &PaidContent, plan: Option<&PlanId>) -> String {
    let attrs = match plan {
        Some(plan) => serde_json::json!({ "planId": plan.to_json() }),
        None => serde_json::json!({}),
    };
    let heading = paid
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("<h2>{}</h2>", t))
        .unwrap_or_default();
    let message = paid
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_PAID_MESSAGE);

    [
        format!("<!-- wp:premium-content/container {} -->", attrs),
        "<div class=\"wp-block-premium-content-container\">".to_string(),
        "<!-- wp:premium-content/subscriber-view -->".to_string(),
        format!(
            "<div class=\"wp-block-premium-content-subscriber-view\">{}<p>{}</p></div>",
            heading, paid.body
        ),
        "<!-- /wp:premium-content/subscriber-view -->".to_string(),
        "<!-- wp:premium-content/logged-out-view -->".to_string(),
        format!(
            "<div class=\"wp-block-premium-content-logged-out-view\"><p>{}</p></div>",
            message
        ),
        "<!-- /wp:premium-content/logged-out-view -->".to_string(),
        "</div>".to_string(),
        "<!-- /wp:premium-content/container -->".to_string(),
    ]
    .join("\n")
}
