//! note.com drafts over the REST API
//!
//! Each request signs in with a fresh cookie session, uploads its images in
//! order and saves one draft. Nothing is published.

use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::AccountRegistry;
use crate::config::NoteConfig;
use crate::media::MediaPayload;
use crate::platforms::note::NoteApiClient;
use crate::types::DraftResult;

/// Title given to drafts created without one
pub const DEFAULT_DRAFT_TITLE: &str = "Auto Post";

#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    pub account: String,
    pub content: String,
    pub title: Option<String>,
    pub images: Vec<MediaPayload>,
}

/// Draft service
#[derive(Clone)]
pub struct DraftService {
    registry: Arc<AccountRegistry>,
    note: Arc<NoteConfig>,
}

impl DraftService {
    pub fn new(registry: Arc<AccountRegistry>, note: Arc<NoteConfig>) -> Self {
        Self { registry, note }
    }

    /// Create a draft for one note.com account
    ///
    /// Never fails: problems are reported through [`DraftResult::Failed`].
    pub async fn create_note_draft(&self, request: &DraftRequest) -> DraftResult {
        let credentials = match self.registry.note_credentials(&request.account) {
            Ok(credentials) => credentials,
            Err(e) => return DraftResult::failed(e.public_message()),
        };

        let mut client = match NoteApiClient::from_config(&self.note) {
            Ok(client) => client,
            Err(e) => return DraftResult::failed(e.public_message()),
        };
        if let Err(e) = client.login(credentials).await {
            warn!("note sign-in for {} failed: {}", request.account, e);
            return DraftResult::failed(e.public_message());
        }

        draft_with(&client, request).await
    }
}

/// Upload the images and save the draft with a signed-in client
pub async fn draft_with(client: &NoteApiClient, request: &DraftRequest) -> DraftResult {
    let mut body = format!("<p>{}</p>", request.content);

    for (index, payload) in request.images.iter().enumerate() {
        let item = match payload.decode(index) {
            Ok(item) => item,
            Err(e) => return DraftResult::failed(format!("Image upload failed: {}", e)),
        };
        match client.upload_image(&item).await {
            Ok(url) => body.push_str(&format!(
                "<img src=\"{}\" />",
                html_escape::encode_double_quoted_attribute(&url)
            )),
            Err(e) => {
                warn!("note image {} upload failed: {}", index, e);
                return DraftResult::failed(format!("Image upload failed: {}", e.public_message()));
            }
        }
    }

    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_DRAFT_TITLE);

    match client.create_draft(title, &body).await {
        Ok(draft) => {
            info!("draft {} saved for {}", draft.note_id, request.account);
            DraftResult::Created(draft)
        }
        Err(e) => DraftResult::failed(format!("Draft creation failed: {}", e.public_message())),
    }
}
