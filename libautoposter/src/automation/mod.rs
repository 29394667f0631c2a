//! Browser automation for platforms without a public API
//!
//! note.com offers no posting API, so publishing drives a real browser over
//! the Chrome DevTools protocol. The flow itself lives in [`note`]; the
//! browser is reached only through the [`BrowserDriver`] trait so tests can
//! script a [`fake::FakeDriver`] instead.

pub mod chromium;
pub mod driver;
pub mod note;
pub mod selectors;

// Fake driver is available for all builds so the server tests can use it
pub mod fake;

pub use chromium::{ChromiumDriver, ChromiumLauncher};
pub use driver::{BrowserDriver, DriverError, DriverLauncher, DriverResult};
pub use note::{title_from_text, NoteCredentials, NotePublisher, NoteTimeouts, Stage};
pub use selectors::{NoteSelectors, Selector};
