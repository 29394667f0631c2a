//! Browser driver seam
//!
//! The publishing state machine only talks to a [`BrowserDriver`]. Production
//! uses [`ChromiumDriver`](super::chromium::ChromiumDriver); tests script a
//! [`FakeDriver`](super::fake::FakeDriver).

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use super::selectors::Selector;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out after {seconds}s waiting for {condition}")]
    Timeout { condition: String, seconds: u64 },

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("{0}")]
    Protocol(String),
}

/// Primitive page interactions
///
/// Element-targeting calls act on the first match unless an index is given.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    async fn current_url(&mut self) -> DriverResult<String>;

    /// Number of elements currently matching `selector`
    async fn count(&mut self, selector: &Selector) -> DriverResult<usize>;

    /// Whether the first match exists and is not disabled
    async fn is_enabled(&mut self, selector: &Selector) -> DriverResult<bool>;

    async fn click(&mut self, selector: &Selector) -> DriverResult<()>;

    /// Replace the value of the first match with `text`
    async fn fill(&mut self, selector: &Selector, text: &str) -> DriverResult<()>;

    /// Type `text` into the first match without clearing it
    async fn type_text(&mut self, selector: &Selector, text: &str) -> DriverResult<()>;

    async fn press_enter(&mut self, selector: &Selector) -> DriverResult<()>;

    /// Attach a local file to the file input at `index` among the matches
    async fn set_file(&mut self, selector: &Selector, index: usize, path: &Path)
        -> DriverResult<()>;

    async fn screenshot(&mut self, path: &Path) -> DriverResult<()>;

    async fn close(&mut self) -> DriverResult<()>;
}

/// Opens a fresh browser session per publish call
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>>;
}
