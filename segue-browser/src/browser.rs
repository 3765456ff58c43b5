//! Browser lifecycle management using Chrome DevTools Protocol

use crate::error::{BrowserError, Result};
use crate::inspector::StyleInspector;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Runtime::{RemoteObject, RemoteObjectSubtype};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often the document ready state is polled after navigation starts.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Ready once the DOM is parsed. Subresources may still be loading.
const DOM_READY_SCRIPT: &str =
    "document.readyState !== 'loading' && window.location.href !== 'about:blank'";

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation and protocol timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 800,
            timeout_seconds: 30,
        }
    }
}

impl BrowserConfig {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Opens page handles for URLs.
///
/// Implemented by [`BrowserSession`]; validation code is written against this trait
/// so it can run against any source of inspectable pages.
#[async_trait]
pub trait PageOpener: Send + Sync {
    type Page: StyleInspector;

    async fn open_page(&self, url: &str) -> Result<Self::Page>;

    async fn close_page(&self, page: Self::Page);
}

/// A single browser process shared by every page handle opened from it.
///
/// Dropping the session kills the browser process, so teardown happens on every
/// exit path; [`BrowserSession::close`] is the explicit form.
pub struct BrowserSession {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

impl BrowserSession {
    /// Launch a new browser instance
    pub async fn launch() -> Result<Self> {
        Self::launch_with_config(BrowserConfig::default()).await
    }

    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let launch_config = config.clone();
        let browser = tokio::task::spawn_blocking(move || {
            let launch_options = LaunchOptions::default_builder()
                .headless(launch_config.headless)
                .sandbox(false)
                .window_size(Some((launch_config.window_width, launch_config.window_height)))
                .idle_browser_timeout(Duration::from_secs(300))
                .args(vec![
                    OsStr::new("--no-sandbox"),
                    OsStr::new("--disable-setuid-sandbox"),
                    OsStr::new("--disable-dev-shm-usage"),
                ])
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            Browser::new(launch_options).map_err(|e| BrowserError::Launch(e.to_string()))
        })
        .await??;

        info!("Browser launched successfully");

        Ok(Self {
            browser: Arc::new(browser),
            config,
        })
    }

    /// Open a new tab and navigate it to `url`.
    ///
    /// Returns once the DOM content has loaded; images, fonts and third-party
    /// scripts may still be in flight.
    pub async fn visit(&self, url: &str) -> Result<PageHandle> {
        debug!("Opening tab for {}", url);

        let browser = self.browser.clone();
        let timeout = self.config.timeout();
        let tab = tokio::task::spawn_blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::Tab(e.to_string()))?;
            tab.set_default_timeout(timeout);
            Ok::<_, BrowserError>(tab)
        })
        .await??;

        let page = PageHandle {
            tab,
            url: url.to_string(),
        };

        if let Err(e) = page.navigate(timeout).await {
            page.close().await;
            return Err(e);
        }

        info!("Navigated to {}", url);
        Ok(page)
    }

    /// Close the browser session
    pub async fn close(self) {
        info!("Closing browser session");
        let browser = self.browser;
        // Dropping the last handle kills the process, which blocks until it exits.
        if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
            warn!("Browser shutdown task failed: {}", e);
        }
    }
}

#[async_trait]
impl PageOpener for BrowserSession {
    type Page = PageHandle;

    async fn open_page(&self, url: &str) -> Result<PageHandle> {
        self.visit(url).await
    }

    async fn close_page(&self, page: PageHandle) {
        page.close().await;
    }
}

fn script_value(result: RemoteObject) -> Result<serde_json::Value> {
    if matches!(result.subtype, Some(RemoteObjectSubtype::Error)) {
        let description = result
            .description
            .unwrap_or_else(|| "script threw an exception".to_string());
        return Err(BrowserError::Evaluation(description));
    }
    Ok(result.value.unwrap_or(serde_json::Value::Null))
}

/// An open tab bound to one navigated URL.
pub struct PageHandle {
    tab: Arc<Tab>,
    url: String,
}

impl PageHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn navigate(&self, timeout: Duration) -> Result<()> {
        let tab = self.tab.clone();
        let url = self.url.clone();

        tokio::task::spawn_blocking(move || {
            tab.navigate_to(&url)
                .map_err(|e| BrowserError::Navigation {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

            let deadline = Instant::now() + timeout;
            loop {
                // Evaluation can fail while the old document is being torn down.
                let ready = tab
                    .evaluate(DOM_READY_SCRIPT, false)
                    .ok()
                    .and_then(|result| result.value)
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                if ready {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(BrowserError::Navigation {
                        url,
                        reason: format!("DOM not ready after {}s", timeout.as_secs()),
                    });
                }
                std::thread::sleep(READY_POLL_INTERVAL);
            }
        })
        .await?
    }

    /// Execute a script in the page and return its primitive result.
    ///
    /// A script that throws comes back from the protocol as an error object rather
    /// than a failed call; it is turned into [`BrowserError::Evaluation`] here.
    pub async fn evaluate(&self, script: String) -> Result<serde_json::Value> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || {
            let result = tab
                .evaluate(&script, false)
                .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
            script_value(result)
        })
        .await?
    }

    /// Close the tab. Failures are logged; the browser reclaims the tab on exit.
    pub async fn close(self) {
        debug!("Closing tab for {}", self.url);
        let tab = self.tab;
        let url = self.url;
        match tokio::task::spawn_blocking(move || tab.close(false)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to close tab for {}: {}", url, e),
            Err(e) => warn!("Tab close task failed for {}: {}", url, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 800);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    fn remote_object(raw: serde_json::Value) -> RemoteObject {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_thrown_exception_is_an_evaluation_error() {
        let thrown = remote_object(serde_json::json!({
            "type": "object",
            "subtype": "error",
            "className": "DOMException",
            "description": "InvalidCharacterError: The token provided ('is changing') contains HTML space characters"
        }));

        match script_value(thrown) {
            Err(BrowserError::Evaluation(message)) => assert!(message.contains("InvalidCharacterError")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_primitive_results_pass_through() {
        let count = remote_object(serde_json::json!({"type": "number", "value": 3}));
        assert_eq!(script_value(count).unwrap(), serde_json::json!(3));

        let empty = remote_object(serde_json::json!({"type": "undefined"}));
        assert_eq!(script_value(empty).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_dom_ready_script_ignores_blank_document() {
        assert!(DOM_READY_SCRIPT.contains("readyState !== 'loading'"));
        assert!(DOM_READY_SCRIPT.contains("about:blank"));
    }
}
