//! Scripted in-memory browser for tests
//!
//! The page is a bag of selector match counts plus a URL. Clicks can be wired
//! to navigate or to reveal more matches, which is enough to walk the
//! publishing flow without a real browser.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::driver::{BrowserDriver, DriverError, DriverLauncher, DriverResult};
use super::selectors::{NoteSelectors, Selector};

/// Side effect of clicking an element
#[derive(Debug, Clone)]
pub enum ClickEffect {
    Navigate(String),
    Reveal(String),
}

/// Observable state shared between a [`FakeDriver`] and the test holding it
#[derive(Debug, Default)]
pub struct FakePage {
    pub url: String,
    pub present: HashMap<String, usize>,
    pub disabled: HashSet<String>,
    pub on_click: HashMap<String, ClickEffect>,
    /// Every interaction, in order, as `"<action> <selector>"`
    pub actions: Vec<String>,
    /// Files attached via `set_file`: selector, index, path, and whether the path existed
    pub files: Vec<(String, usize, PathBuf, bool)>,
    pub typed: Vec<(String, String)>,
    pub screenshots: Vec<PathBuf>,
    pub closed: bool,
}

impl FakePage {
    /// A page on which every step of the note.com flow succeeds
    pub fn note_happy_path(selectors: &NoteSelectors) -> Self {
        let mut page = FakePage::default();
        for selector in [
            &selectors.login_username,
            &selectors.login_password,
            &selectors.login_submit,
            &selectors.post_menu,
            &selectors.new_post_menu,
            &selectors.editor_title,
            &selectors.title_area,
            &selectors.text_area,
            &selectors.open_menu,
            &selectors.media_button,
            &selectors.thumbnail_button,
            &selectors.paid_tab,
            &selectors.free_tab,
            &selectors.tag_input,
            &selectors.publish_next,
            &selectors.publish,
        ] {
            page.present.insert(selector.as_str().to_string(), 1);
        }
        page.present
            .insert(selectors.media_input.as_str().to_string(), 0);
        page.present
            .insert(selectors.thumbnail_input.as_str().to_string(), 0);

        page.on_click.insert(
            selectors.login_submit.as_str().to_string(),
            ClickEffect::Navigate(selectors.home_url.clone()),
        );
        page.on_click.insert(
            selectors.media_button.as_str().to_string(),
            ClickEffect::Reveal(selectors.media_input.as_str().to_string()),
        );
        page.on_click.insert(
            selectors.thumbnail_button.as_str().to_string(),
            ClickEffect::Reveal(selectors.thumbnail_input.as_str().to_string()),
        );
        page.on_click.insert(
            selectors.publish.as_str().to_string(),
            ClickEffect::Navigate(format!("{}notes/n0123abcd", selectors.home_url)),
        );
        page
    }

    pub fn remove(&mut self, selector: &Selector) {
        self.present.remove(selector.as_str());
    }

    fn matches(&self, selector: &Selector) -> usize {
        self.present.get(selector.as_str()).copied().unwrap_or(0)
    }

    fn require(&self, selector: &Selector) -> DriverResult<()> {
        if self.matches(selector) == 0 {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        Ok(())
    }

    /// Whether any recorded action mentions `selector`
    pub fn touched(&self, selector: &Selector) -> bool {
        self.actions
            .iter()
            .any(|a| a.split_once(' ').map(|(_, s)| s) == Some(selector.as_str()))
    }
}

/// [`BrowserDriver`] over a shared [`FakePage`]
pub struct FakeDriver {
    page: Arc<Mutex<FakePage>>,
}

impl FakeDriver {
    pub fn new(page: Arc<Mutex<FakePage>>) -> Self {
        Self { page }
    }

    fn with_page<T>(&self, f: impl FnOnce(&mut FakePage) -> DriverResult<T>) -> DriverResult<T> {
        let mut page = self
            .page
            .lock()
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        f(&mut page)
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.with_page(|page| {
            page.actions.push(format!("goto {}", url));
            page.url = url.to_string();
            Ok(())
        })
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        self.with_page(|page| Ok(page.url.clone()))
    }

    async fn count(&mut self, selector: &Selector) -> DriverResult<usize> {
        self.with_page(|page| Ok(page.matches(selector)))
    }

    async fn is_enabled(&mut self, selector: &Selector) -> DriverResult<bool> {
        self.with_page(|page| {
            Ok(page.matches(selector) > 0 && !page.disabled.contains(selector.as_str()))
        })
    }

    async fn click(&mut self, selector: &Selector) -> DriverResult<()> {
        self.with_page(|page| {
            page.require(selector)?;
            page.actions.push(format!("click {}", selector));
            match page.on_click.get(selector.as_str()).cloned() {
                Some(ClickEffect::Navigate(url)) => page.url = url,
                Some(ClickEffect::Reveal(target)) => {
                    *page.present.entry(target).or_insert(0) += 1;
                }
                None => {}
            }
            Ok(())
        })
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> DriverResult<()> {
        self.with_page(|page| {
            page.require(selector)?;
            page.actions.push(format!("fill {}", selector));
            page.typed.push((selector.to_string(), text.to_string()));
            Ok(())
        })
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> DriverResult<()> {
        self.with_page(|page| {
            page.require(selector)?;
            page.actions.push(format!("type {}", selector));
            page.typed.push((selector.to_string(), text.to_string()));
            Ok(())
        })
    }

    async fn press_enter(&mut self, selector: &Selector) -> DriverResult<()> {
        self.with_page(|page| {
            page.require(selector)?;
            page.actions.push(format!("enter {}", selector));
            Ok(())
        })
    }

    async fn set_file(
        &mut self,
        selector: &Selector,
        index: usize,
        path: &Path,
    ) -> DriverResult<()> {
        self.with_page(|page| {
            if index >= page.matches(selector) {
                return Err(DriverError::NotFound(format!("{} [{}]", selector, index)));
            }
            page.actions.push(format!("file {}", selector));
            page.files
                .push((selector.to_string(), index, path.to_path_buf(), path.exists()));
            Ok(())
        })
    }

    async fn screenshot(&mut self, path: &Path) -> DriverResult<()> {
        self.with_page(|page| {
            page.screenshots.push(path.to_path_buf());
            Ok(())
        })
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.with_page(|page| {
            page.closed = true;
            Ok(())
        })
    }
}

/// Hands out [`FakeDriver`]s bound to one shared page
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub page: Arc<Mutex<FakePage>>,
    pub launches: Arc<Mutex<usize>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
            launches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl DriverLauncher for FakeLauncher {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        if let Ok(mut n) = self.launches.lock() {
            *n += 1;
        }
        Ok(Box::new(FakeDriver::new(Arc::clone(&self.page))))
    }
}
