//! Chromium implementation of [`BrowserDriver`] over the DevTools protocol

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use tokio::task::JoinHandle;

use super::driver::{BrowserDriver, DriverError, DriverLauncher, DriverResult};
use super::selectors::Selector;

const CLEAR_VALUE_JS: &str = "function() { \
    if ('value' in this) { this.value = ''; } else { this.textContent = ''; } \
}";

const IS_ENABLED_JS: &str = "function() { return !this.disabled; }";

fn protocol(error: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(error.to_string())
}

/// One Chromium process with a single page
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    pub async fn launch(headless: bool) -> DriverResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tracing::debug!("launched chromium (headless: {})", headless);

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn find_all(&self, selector: &Selector) -> DriverResult<Vec<Element>> {
        let found = match selector {
            Selector::Css(css) => self.page.find_elements(css.as_str()).await,
            Selector::XPath(xpath) => self.page.find_xpaths(xpath.as_str()).await,
        };
        // A missing node surfaces as a protocol error; treat it as zero matches
        Ok(found.unwrap_or_default())
    }

    async fn find_first(&self, selector: &Selector) -> DriverResult<Element> {
        self.find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NotFound(selector.to_string()))
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.page.goto(url).await.map_err(protocol)?;
        Ok(())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        let url = self.page.url().await.map_err(protocol)?;
        Ok(url.unwrap_or_default())
    }

    async fn count(&mut self, selector: &Selector) -> DriverResult<usize> {
        Ok(self.find_all(selector).await?.len())
    }

    async fn is_enabled(&mut self, selector: &Selector) -> DriverResult<bool> {
        let elements = self.find_all(selector).await?;
        let Some(element) = elements.first() else {
            return Ok(false);
        };
        let returns = element
            .call_js_fn(IS_ENABLED_JS, false)
            .await
            .map_err(protocol)?;
        Ok(returns
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&mut self, selector: &Selector) -> DriverResult<()> {
        let element = self.find_first(selector).await?;
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, text: &str) -> DriverResult<()> {
        let element = self.find_first(selector).await?;
        element.focus().await.map_err(protocol)?;
        element
            .call_js_fn(CLEAR_VALUE_JS, false)
            .await
            .map_err(protocol)?;
        element.type_str(text).await.map_err(protocol)?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &Selector, text: &str) -> DriverResult<()> {
        let element = self.find_first(selector).await?;
        element.click().await.map_err(protocol)?;
        element.type_str(text).await.map_err(protocol)?;
        Ok(())
    }

    async fn press_enter(&mut self, selector: &Selector) -> DriverResult<()> {
        let element = self.find_first(selector).await?;
        element.press_key("Enter").await.map_err(protocol)?;
        Ok(())
    }

    async fn set_file(
        &mut self,
        selector: &Selector,
        index: usize,
        path: &Path,
    ) -> DriverResult<()> {
        let elements = self.find_all(selector).await?;
        let element = elements
            .get(index)
            .ok_or_else(|| DriverError::NotFound(format!("{} [{}]", selector, index)))?;

        let mut params = SetFileInputFilesParams::new(vec![path.to_string_lossy().into_owned()]);
        params.backend_node_id = Some(element.backend_node_id.clone());
        self.page.execute(params).await.map_err(protocol)?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> DriverResult<()> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let closed = self.browser.close().await.map_err(protocol);
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.map(|_| ())
    }
}

/// Launches a [`ChromiumDriver`] per publish call
#[derive(Debug, Clone, Copy)]
pub struct ChromiumLauncher {
    pub headless: bool,
}

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserDriver>> {
        let driver = ChromiumDriver::launch(self.headless).await?;
        Ok(Box::new(driver))
    }
}
