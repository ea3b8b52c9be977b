//! Fusion fetcher configuration with the defaults the site needs.

use crate::error::FetchError;
use std::path::PathBuf;
use std::time::Duration;

/// Default fusion page.
pub const FUSION_URL: &str = "https://japeal.com/pkm/";

/// Default geckodriver endpoint.
pub const WEBDRIVER_URL: &str = "http://localhost:4444";

/// The fusion page never finishes rendering without an upstream proxy.
pub const DEFAULT_PROXY: &str = "127.0.0.1:7890";

/// Everything a fusion run needs besides the request itself.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Browser download directory; canonical `{head}.{body}.png` files live here.
    pub cache_dir: PathBuf,
    /// Root of the 120x120 front sprites, partitioned by head id.
    pub front_dir: PathBuf,
    /// Root of the 96x96 battle sprites, partitioned by head id.
    pub battle_dir: PathBuf,
    pub fusion_url: String,
    pub webdriver_url: String,
    /// `host:port` of the HTTP/SSL proxy. `None` only when explicitly disabled.
    pub proxy: Option<String>,
    /// Browser window size.
    pub window: (u32, u32),
    /// Timeout for ordinary clicks and typing.
    pub ui_timeout: Duration,
    /// Timeout for the fusion button, which waits on server-side rendering.
    pub fusion_timeout: Duration,
    /// How long to poll the downloads view for a filename.
    pub download_timeout: Duration,
    /// Pause after page load and before the download click.
    pub settle_delay: Duration,
    /// Short pause after dismissing overlays and before fusing.
    pub step_delay: Duration,
    /// Refuse best-match suggestions that do not look like the requested name.
    pub verify_match: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("sprites/cache"),
            front_dir: PathBuf::from("sprites/infinitefusion"),
            battle_dir: PathBuf::from("sprites/infinitefusion-battle"),
            fusion_url: FUSION_URL.to_string(),
            webdriver_url: WEBDRIVER_URL.to_string(),
            proxy: Some(DEFAULT_PROXY.to_string()),
            window: (1920, 1080),
            ui_timeout: Duration::from_secs(10),
            fusion_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            step_delay: Duration::from_secs(1),
            verify_match: true,
        }
    }
}

impl FusionConfig {
    /// Rejects configurations that would make every run fail in a confusing way.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.fusion_url.trim().is_empty() {
            return Err(FetchError::Config("fusion url must not be empty".into()));
        }
        if self.webdriver_url.trim().is_empty() {
            return Err(FetchError::Config(
                "webdriver endpoint must not be empty".into(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.trim().is_empty() {
                return Err(FetchError::Config(
                    "proxy must be host:port; use --no-proxy to disable it".into(),
                ));
            }
        }
        if self.ui_timeout.is_zero()
            || self.fusion_timeout.is_zero()
            || self.download_timeout.is_zero()
        {
            return Err(FetchError::Config(
                "timeouts must be greater than 0".into(),
            ));
        }
        if self.window.0 == 0 || self.window.1 == 0 {
            return Err(FetchError::Config("window size must be non-zero".into()));
        }
        Ok(())
    }
}
