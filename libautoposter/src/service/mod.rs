//! Service layer for autoPoster
//!
//! This module provides the operations behind the HTTP API and the command
//! line tools, so every interface shares one implementation.
//!
//! # Architecture
//!
//! `AutoPosterService` is the entry point and hands out the specialized
//! sub-services, all sharing one [`AccountRegistry`]:
//!
//! - `PublishService`: media upload and post creation, REST or browser
//! - `CleanupService`: trimming old posts, trash and unattached media
//! - `StatsService`: listing, deletion, page views and the CSV export
//! - `DraftService`: note.com drafts over the REST API
//!
//! # Example
//!
//! ```no_run
//! use libautoposter::service::AutoPosterService;
//! use libautoposter::types::{PlatformKind, PostRequest};
//! use libautoposter::Config;
//!
//! # async fn example() -> libautoposter::Result<()> {
//! let config = Config::load()?;
//! let service = AutoPosterService::from_config(&config, true).await;
//!
//! let request = PostRequest::new("acc", "Hello from autoPoster");
//! let result = service.publish().publish(PlatformKind::Mastodon, &request).await;
//! println!("{}", serde_json::to_string(&result).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod draft;
pub mod publish;
pub mod stats;

use std::sync::Arc;

use self::cleanup::CleanupService;
use self::draft::DraftService;
use self::publish::PublishService;
use self::stats::StatsService;
use crate::accounts::AccountRegistry;
use crate::automation::{ChromiumLauncher, DriverLauncher};
use crate::config::{Config, NoteConfig};

/// Main service facade that coordinates all sub-services
#[derive(Clone)]
pub struct AutoPosterService {
    registry: Arc<AccountRegistry>,
    publish: PublishService,
    cleanup: CleanupService,
    stats: StatsService,
    draft: DraftService,
}

impl AutoPosterService {
    /// Validate accounts, authenticate clients and wire the sub-services
    ///
    /// Browser sessions use Chromium; `headless` controls whether its window
    /// is shown.
    pub async fn from_config(config: &Config, headless: bool) -> Self {
        let registry = AccountRegistry::build(config).await;
        Self::new(
            Arc::new(registry),
            Arc::new(ChromiumLauncher { headless }),
            config.note.clone(),
        )
    }

    /// Create a service from prebuilt parts
    ///
    /// Tests use this to inject mock clients and a fake browser.
    pub fn new(
        registry: Arc<AccountRegistry>,
        launcher: Arc<dyn DriverLauncher>,
        note: NoteConfig,
    ) -> Self {
        let note = Arc::new(note);
        Self {
            publish: PublishService::new(Arc::clone(&registry), launcher, Arc::clone(&note)),
            draft: DraftService::new(Arc::clone(&registry), note),
            cleanup: CleanupService::new(Arc::clone(&registry)),
            stats: StatsService::new(Arc::clone(&registry)),
            registry,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn publish(&self) -> &PublishService {
        &self.publish
    }

    pub fn cleanup(&self) -> &CleanupService {
        &self.cleanup
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn draft(&self) -> &DraftService {
        &self.draft
    }
}
