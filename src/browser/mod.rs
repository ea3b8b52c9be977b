//! Browser automation seam.
//!
//! The fetcher only needs a handful of page operations, so they are exposed
//! as the [`Browser`] trait. [`webdriver::WebDriver`] implements it against a
//! W3C WebDriver endpoint (geckodriver); tests use an in-memory fake.

pub mod webdriver;

use crate::error::Result;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Opaque handle to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element(pub String);

/// Operations the fusion steps perform on a live page.
#[allow(async_fn_in_trait)]
pub trait Browser {
    async fn goto(&self, url: &str) -> Result<()>;
    /// Find the first element matching a CSS selector.
    async fn find(&self, selector: &str) -> Result<Element>;
    async fn click(&self, element: &Element) -> Result<()>;
    async fn clear(&self, element: &Element) -> Result<()>;
    async fn send_keys(&self, element: &Element, text: &str) -> Result<()>;
    async fn text(&self, element: &Element) -> Result<String>;
    /// Run a synchronous script in the page and return its result.
    async fn execute(&self, script: &str) -> Result<Value>;
    async fn current_tab(&self) -> Result<String>;
    /// Open a new tab and return its handle without switching to it.
    async fn new_tab(&self) -> Result<String>;
    async fn switch_to(&self, handle: &str) -> Result<()>;
    /// Close the current tab.
    async fn close_tab(&self) -> Result<()>;
    /// End the session. Called exactly once on every path.
    async fn quit(self) -> Result<()>
    where
        Self: Sized;
}

/// Settings for a new headless Firefox session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub download_dir: PathBuf,
    pub window: (u32, u32),
    pub proxy: Option<String>,
}

impl SessionOptions {
    /// W3C `capabilities` payload for `POST /session`.
    pub fn capabilities(&self) -> Value {
        let (width, height) = self.window;
        let mut always_match = json!({
            "browserName": "firefox",
            "acceptInsecureCerts": true,
            "moz:firefoxOptions": {
                "args": ["-headless", format!("--width={}", width), format!("--height={}", height)],
                "prefs": {
                    "browser.download.folderList": 2,
                    "browser.download.dir": self.download_dir.to_string_lossy(),
                    "browser.download.useDownloadDir": true,
                    "browser.download.manager.showWhenStarting": false,
                    "browser.helperApps.neverAsk.saveToDisk": "image/png,application/octet-stream"
                }
            }
        });

        if let Some(proxy) = &self.proxy {
            always_match["proxy"] = json!({
                "proxyType": "manual",
                "httpProxy": proxy,
                "sslProxy": proxy,
            });
        }

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}
