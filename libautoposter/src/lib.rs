//! autoPoster - publishing and housekeeping for blog and microblog accounts
//!
//! This library provides the platform clients, account registry, browser
//! automation and orchestration behind the autoPoster API server and its
//! command line tools.

pub mod accounts;
pub mod automation;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use accounts::AccountRegistry;
pub use config::Config;
pub use error::{AutoPosterError, Result};
pub use service::AutoPosterService;
pub use types::{PlatformKind, PostRequest, PublishResult};
