//! note.com publishing state machine
//!
//! The flow runs `login → open editor → title → body → media* → thumbnail? →
//! paid/free → tags* → publish`. Each stage is its own method; the first
//! stage that fails ends the run with a screenshot and no later stage is
//! attempted. The browser is closed in every outcome.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::driver::{BrowserDriver, DriverError, DriverResult};
use super::selectors::{NoteSelectors, Selector};
use crate::config::{NoteAccount, NoteConfig};
use crate::error::{AccountError, AutomationError, MediaError};
use crate::media::{MediaPayload, TempMediaFile};
use crate::types::{PostRequest, PublishResult};

/// Titles are cut to this many characters
const TITLE_MAX_CHARS: usize = 20;

/// Login details for one note.com account
#[derive(Clone)]
pub struct NoteCredentials {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for NoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl TryFrom<&NoteAccount> for NoteCredentials {
    type Error = AccountError;

    fn try_from(account: &NoteAccount) -> Result<Self, Self::Error> {
        match (&account.username, &account.password) {
            (Some(username), Some(password)) => Ok(Self {
                username: username.clone(),
                password: SecretString::from(password.clone()),
            }),
            _ => Err(AccountError::Misconfigured),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteTimeouts {
    /// Ordinary element waits
    pub wait: Duration,
    /// Redirect away from the login page
    pub login: Duration,
    /// Delay between polls of a wait condition
    pub poll: Duration,
}

impl Default for NoteTimeouts {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(20),
            login: Duration::from_secs(40),
            poll: Duration::from_millis(250),
        }
    }
}

impl NoteTimeouts {
    pub fn from_config(config: &NoteConfig) -> Self {
        Self {
            wait: Duration::from_secs(config.wait_timeout_secs),
            login: Duration::from_secs(config.login_timeout_secs),
            ..Self::default()
        }
    }
}

/// Named step of the publishing flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Login,
    OpenEditor,
    EnterTitle,
    EnterBody,
    UploadMedia,
    UploadThumbnail,
    SetVisibility,
    AddTag,
    Publish,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Login => "login",
            Stage::OpenEditor => "open new post",
            Stage::EnterTitle => "enter title",
            Stage::EnterBody => "enter body",
            Stage::UploadMedia => "upload media",
            Stage::UploadThumbnail => "upload thumbnail",
            Stage::SetVisibility => "set paid/free",
            Stage::AddTag => "add tag",
            Stage::Publish => "publish",
        }
    }

    fn error(self, message: impl fmt::Display) -> AutomationError {
        AutomationError {
            stage: self.label().to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug)]
enum StepError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

type StepResult = std::result::Result<(), StepError>;

/// Something `wait_until` can poll for
#[derive(Debug, Clone, Copy)]
enum Condition<'s> {
    Present(&'s Selector),
    Enabled(&'s Selector),
    CountAbove(&'s Selector, usize),
    UrlLeaves(&'s str),
    UrlContains(&'s str),
}

impl fmt::Display for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Present(s) => write!(f, "element {}", s),
            Condition::Enabled(s) => write!(f, "{} to be clickable", s),
            Condition::CountAbove(s, n) => write!(f, "more than {} matches of {}", n, s),
            Condition::UrlLeaves(base) => write!(f, "URL to leave {}", base),
            Condition::UrlContains(part) => write!(f, "URL to contain {}", part),
        }
    }
}

/// First line of the text, cut to the title length limit
pub fn title_from_text(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect()
}

/// Drives one browser session through a single publish
pub struct NotePublisher<'a> {
    driver: Box<dyn BrowserDriver>,
    selectors: &'a NoteSelectors,
    timeouts: NoteTimeouts,
}

impl<'a> NotePublisher<'a> {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        selectors: &'a NoteSelectors,
        timeouts: NoteTimeouts,
    ) -> Self {
        Self {
            driver,
            selectors,
            timeouts,
        }
    }

    /// Run the whole flow and close the browser
    pub async fn publish(mut self, credentials: &NoteCredentials, post: &PostRequest) -> PublishResult {
        tracing::info!("starting note post for account: {}", post.account);

        let result = match self.run(credentials, post).await {
            Ok(()) => {
                tracing::info!("note post published for account: {}", post.account);
                PublishResult::Posted { posted: true }
            }
            Err(error) => {
                let screenshot = self.capture_screenshot().await;
                tracing::warn!(
                    stage = %error.stage,
                    screenshot = ?screenshot,
                    "note post failed: {}",
                    error
                );
                PublishResult::Failed {
                    error: error.to_string(),
                    screenshot: screenshot.map(|p| p.to_string_lossy().into_owned()),
                }
            }
        };

        tracing::debug!("closing browser");
        if let Err(e) = self.driver.close().await {
            tracing::warn!("failed to close browser: {}", e);
        }
        result
    }

    async fn run(
        &mut self,
        credentials: &NoteCredentials,
        post: &PostRequest,
    ) -> std::result::Result<(), AutomationError> {
        if let Err(e) = self.login(credentials).await {
            let url = self.driver.current_url().await.unwrap_or_default();
            return Err(Stage::Login.error(format!("{} (URL: {})", e, url)));
        }
        tracing::debug!("logged in");

        self.open_editor()
            .await
            .map_err(|e| Stage::OpenEditor.error(e))?;

        self.enter_title(&title_from_text(&post.text))
            .await
            .map_err(|e| Stage::EnterTitle.error(e))?;

        self.enter_body(&post.text)
            .await
            .map_err(|e| Stage::EnterBody.error(e))?;

        for (index, payload) in post.media.iter().enumerate() {
            self.upload_media(payload, index)
                .await
                .map_err(|e| Stage::UploadMedia.error(e))?;
        }

        if let Some(thumbnail) = &post.thumbnail {
            self.upload_thumbnail(thumbnail)
                .await
                .map_err(|e| Stage::UploadThumbnail.error(e))?;
        }

        self.set_visibility(post.paid)
            .await
            .map_err(|e| Stage::SetVisibility.error(e))?;

        for tag in &post.tags {
            self.add_tag(tag).await.map_err(|e| Stage::AddTag.error(e))?;
        }

        self.publish_post()
            .await
            .map_err(|e| Stage::Publish.error(e))?;

        Ok(())
    }

    async fn login(&mut self, credentials: &NoteCredentials) -> StepResult {
        let sel = self.selectors;
        let wait = self.timeouts.wait;

        self.driver.goto(&sel.login_entry_url()).await?;
        self.wait_until(Condition::Present(&sel.login_username), wait)
            .await?;
        self.driver
            .fill(&sel.login_username, &credentials.username)
            .await?;
        self.driver
            .fill(&sel.login_password, credentials.password.expose_secret())
            .await?;

        self.wait_until(Condition::Enabled(&sel.login_submit), wait)
            .await?;
        self.driver.click(&sel.login_submit).await?;
        self.wait_until(Condition::UrlLeaves(sel.login_base()), self.timeouts.login)
            .await?;
        Ok(())
    }

    async fn open_editor(&mut self) -> StepResult {
        let sel = self.selectors;
        let wait = self.timeouts.wait;

        self.driver.goto(&sel.home_url).await?;
        self.wait_until(Condition::Enabled(&sel.post_menu), wait).await?;
        self.driver.click(&sel.post_menu).await?;
        self.wait_until(Condition::Enabled(&sel.new_post_menu), wait)
            .await?;
        self.driver.click(&sel.new_post_menu).await?;
        self.wait_until(Condition::Present(&sel.editor_title), wait)
            .await?;
        tracing::debug!("editor opened");
        Ok(())
    }

    async fn enter_title(&mut self, title: &str) -> StepResult {
        self.driver
            .type_text(&self.selectors.title_area, title)
            .await?;
        Ok(())
    }

    async fn enter_body(&mut self, text: &str) -> StepResult {
        self.driver
            .type_text(&self.selectors.text_area, text)
            .await?;
        Ok(())
    }

    async fn upload_media(&mut self, payload: &MediaPayload, index: usize) -> StepResult {
        let sel = self.selectors;
        let file = TempMediaFile::from_payload(payload, index)?;

        if self.driver.count(&sel.open_menu).await? == 0 {
            return Err(DriverError::NotFound("menu button".to_string()).into());
        }
        self.driver.click(&sel.open_menu).await?;
        self.wait_until(Condition::Present(&sel.media_button), self.timeouts.wait)
            .await?;
        self.attach(&sel.media_button, &sel.media_input, &file)
            .await?;
        tracing::debug!("media item {} uploaded", index + 1);
        Ok(())
    }

    async fn upload_thumbnail(&mut self, payload: &MediaPayload) -> StepResult {
        let sel = self.selectors;
        let file = TempMediaFile::from_payload(payload, 0)?;

        if self.driver.count(&sel.thumbnail_button).await? == 0 {
            return Err(DriverError::NotFound("thumbnail button".to_string()).into());
        }
        self.attach(&sel.thumbnail_button, &sel.thumbnail_input, &file)
            .await?;
        tracing::debug!("thumbnail uploaded");
        Ok(())
    }

    /// Click `trigger`, wait for a new file input to appear, then hand it the file
    async fn attach(
        &mut self,
        trigger: &Selector,
        input: &Selector,
        file: &TempMediaFile,
    ) -> StepResult {
        let before = self.driver.count(input).await?;
        self.driver.click(trigger).await?;
        self.wait_until(Condition::CountAbove(input, before), self.timeouts.wait)
            .await?;

        let newest = self.driver.count(input).await?.saturating_sub(1);
        self.driver.set_file(input, newest, file.path()).await?;
        Ok(())
    }

    async fn set_visibility(&mut self, paid: bool) -> StepResult {
        let tab = if paid {
            &self.selectors.paid_tab
        } else {
            &self.selectors.free_tab
        };
        self.driver.click(tab).await?;
        Ok(())
    }

    async fn add_tag(&mut self, tag: &str) -> StepResult {
        let input = &self.selectors.tag_input;
        self.driver.type_text(input, tag).await?;
        self.driver.press_enter(input).await?;
        tracing::debug!("tag added: {}", tag);
        Ok(())
    }

    async fn publish_post(&mut self) -> StepResult {
        let sel = self.selectors;
        let wait = self.timeouts.wait;

        self.wait_until(Condition::Enabled(&sel.publish_next), wait)
            .await?;
        self.driver.click(&sel.publish_next).await?;
        self.wait_until(Condition::Enabled(&sel.publish), wait).await?;
        self.driver.click(&sel.publish).await?;
        self.wait_until(Condition::UrlContains(&sel.published_url_marker), wait)
            .await?;
        Ok(())
    }

    async fn check(&mut self, condition: Condition<'_>) -> DriverResult<bool> {
        match condition {
            Condition::Present(s) => Ok(self.driver.count(s).await? > 0),
            Condition::Enabled(s) => self.driver.is_enabled(s).await,
            Condition::CountAbove(s, n) => Ok(self.driver.count(s).await? > n),
            Condition::UrlLeaves(base) => {
                Ok(!self.driver.current_url().await?.starts_with(base))
            }
            Condition::UrlContains(part) => Ok(self.driver.current_url().await?.contains(part)),
        }
    }

    /// Poll `condition` until it holds or `timeout` elapses
    async fn wait_until(&mut self, condition: Condition<'_>, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.check(condition).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    condition: condition.to_string(),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.timeouts.poll).await;
        }
    }

    /// Save the current page to a kept temporary `.png`
    ///
    /// The path is returned even when the capture itself fails.
    async fn capture_screenshot(&mut self) -> Option<PathBuf> {
        let path = tempfile::Builder::new()
            .prefix("note-failure-")
            .suffix(".png")
            .tempfile()
            .and_then(|file| file.into_temp_path().keep().map_err(|e| e.error));

        let path = match path {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("failed to create screenshot file: {}", e);
                return None;
            }
        };

        if let Err(e) = self.driver.screenshot(&path).await {
            tracing::warn!("failed to save screenshot: {}", e);
        }
        Some(path)
    }
}
