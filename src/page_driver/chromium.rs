//! `PageDriver` over a chromiumoxide tab

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::browser_setup::launch_browser;
use super::cleanup::{CleanupResult, cleanup_browser_and_data};
use super::timeout::with_page_timeout;
use super::{DriverError, DriverFactory, DriverResult, PageDriver};
use crate::config::ScraperConfig;
use crate::utils::ELEMENT_POLL_INTERVAL_MS;

fn browser_err(e: impl std::fmt::Display) -> DriverError {
    DriverError::Browser(e.to_string())
}

/// JSON-quote a selector for embedding in a script.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// One browser process with a single tab, owned by one session.
pub struct ChromiumPageDriver {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    data_dir: PathBuf,
    page: Page,
    next_selector: String,
    page_load_timeout: Duration,
    element_timeout: Duration,
    settle_delay: Duration,
    last_filled: Option<String>,
}

impl ChromiumPageDriver {
    /// Launch a browser and open a blank tab.
    pub async fn launch(config: &ScraperConfig, headless: bool) -> DriverResult<Self> {
        let data_dir = config
            .chrome_data_dir()
            .map(|dir| dir.join(format!("session_{}", chrono::Utc::now().timestamp_micros())));

        let (browser, handler, data_dir) =
            launch_browser(headless, data_dir, config.page_load_timeout())
                .await
                .map_err(|e| DriverError::Launch(format!("{e:#}")))?;

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                cleanup_browser_and_data(browser, handler, data_dir).await;
                return Err(DriverError::Launch(format!("could not open a tab: {e}")));
            }
        };

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            data_dir,
            page,
            next_selector: config.site().next_page_link.clone(),
            page_load_timeout: config.page_load_timeout(),
            element_timeout: config.element_timeout(),
            settle_delay: config.settle_delay(),
            last_filled: None,
        })
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

async fn find(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> DriverResult<chromiumoxide::Element> {
    with_page_timeout(
        async {
            page.find_element(selector)
                .await
                .map_err(|_| DriverError::ElementNotFound {
                    selector: selector.to_string(),
                })
        },
        timeout,
        "find element",
    )
    .await
}

/// Time left before `deadline`, zero once it has passed.
fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

async fn eval_bool(page: &Page, script: String, timeout: Duration, name: &str) -> DriverResult<bool> {
    with_page_timeout(
        async move {
            let result = page.evaluate(script.as_str()).await.map_err(browser_err)?;
            result.into_value::<bool>().map_err(browser_err)
        },
        timeout,
        name,
    )
    .await
}

#[async_trait]
impl PageDriver for ChromiumPageDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        debug!("Navigating to {url}");
        let page = &self.page;
        with_page_timeout(
            async move {
                page.goto(url)
                    .await
                    .map(|_| ())
                    .map_err(|e| DriverError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
            },
            self.page_load_timeout,
            "navigation",
        )
        .await?;
        self.last_filled = None;
        settle(self.settle_delay).await;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()> {
        let element = find(&self.page, selector, self.element_timeout).await?;
        with_page_timeout(
            async {
                element.click().await.map_err(browser_err)?;
                element.type_str(value).await.map_err(browser_err)?;
                Ok(())
            },
            self.element_timeout,
            "fill",
        )
        .await?;
        self.last_filled = Some(selector.to_string());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        let element = find(&self.page, selector, self.element_timeout).await?;
        with_page_timeout(
            async { element.click().await.map(|_| ()).map_err(browser_err) },
            self.element_timeout,
            "click",
        )
        .await?;
        settle(self.settle_delay).await;
        Ok(())
    }

    async fn submit(&mut self) -> DriverResult<()> {
        let selector = self
            .last_filled
            .clone()
            .ok_or_else(|| DriverError::ElementNotFound {
                selector: "<no filled field>".to_string(),
            })?;
        let element = find(&self.page, &selector, self.element_timeout).await?;
        with_page_timeout(
            async { element.press_key("Enter").await.map(|_| ()).map_err(browser_err) },
            self.element_timeout,
            "submit",
        )
        .await?;
        settle(self.settle_delay).await;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(ELEMENT_POLL_INTERVAL_MS);
        loop {
            // each lookup gets only what is left of the wait
            if find(&self.page, selector, remaining(deadline)).await.is_ok() {
                return Ok(());
            }
            let left = remaining(deadline);
            if left.is_zero() {
                return Err(DriverError::Timeout {
                    operation: format!("wait for '{selector}'"),
                    secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(poll.min(left)).await;
        }
    }

    async fn content(&mut self) -> DriverResult<String> {
        let page = &self.page;
        with_page_timeout(
            async move { page.content().await.map_err(browser_err) },
            self.page_load_timeout,
            "read content",
        )
        .await
    }

    async fn click_next(&mut self) -> DriverResult<bool> {
        let script = format!(
            r#"(() => {{
                const link = document.querySelector({sel});
                if (!link) return false;
                const item = link.closest('li');
                if ((item && item.classList.contains('disabled'))
                    || link.classList.contains('disabled')
                    || link.getAttribute('aria-disabled') === 'true') return false;
                link.click();
                return true;
            }})()"#,
            sel = js_string(&self.next_selector)
        );
        let advanced = eval_bool(&self.page, script, self.element_timeout, "next page").await?;
        if advanced {
            settle(self.settle_delay).await;
        }
        Ok(advanced)
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> DriverResult<bool> {
        let script = format!(
            r#"(() => {{
                const select = document.querySelector({sel});
                if (!select) return false;
                const wanted = {val};
                if (![...select.options].some(o => o.value === wanted)) return false;
                select.value = wanted;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value)
        );
        let selected = eval_bool(&self.page, script, self.element_timeout, "select option").await?;
        if selected {
            settle(self.settle_delay).await;
        }
        Ok(selected)
    }

    async fn current_url(&mut self) -> DriverResult<Option<String>> {
        self.page.url().await.map_err(browser_err)
    }

    async fn close(&mut self) -> DriverResult<()> {
        let (Some(browser), Some(handler)) = (self.browser.take(), self.handler.take()) else {
            return Ok(());
        };
        match cleanup_browser_and_data(browser, handler, self.data_dir.clone()).await {
            CleanupResult::Success => Ok(()),
            CleanupResult::PartialFailure(errors) => {
                warn!("Browser cleanup incomplete: {}", errors.join("; "));
                Err(DriverError::Browser(errors.join("; ")))
            }
        }
    }
}

/// Launches a `ChromiumPageDriver` per session.
#[derive(Clone)]
pub struct ChromiumDriverFactory {
    config: Arc<ScraperConfig>,
}

impl ChromiumDriverFactory {
    #[must_use]
    pub fn new(config: Arc<ScraperConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for ChromiumDriverFactory {
    async fn launch(&self, headless: bool) -> DriverResult<Box<dyn PageDriver>> {
        let driver = ChromiumPageDriver::launch(&self.config, headless).await?;
        Ok(Box::new(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_lookup_budget_shrinks_to_zero() {
        let deadline = Instant::now() + Duration::from_secs(10);
        assert_eq!(remaining(deadline), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(remaining(deadline), Duration::from_secs(6));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(remaining(deadline).is_zero());
    }

    #[test]
    fn test_selectors_are_quoted_for_scripts() {
        assert_eq!(js_string(r#"a[aria-label="Next"]"#), r#""a[aria-label=\"Next\"]""#);
    }
}
