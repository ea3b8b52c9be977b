//! Fusion sprite fetcher.
//!
//! Drives a headless browser through the fusion site to generate the sprite
//! for a `(head, body)` pair, renames the download to `{head}.{body}.png`
//! and derives the front and battle sprites from it.
//!
//! A run moves through [`Stage`] in order; errors carry the stage they
//! happened in and the browser session is closed on every path.

pub mod assets;
pub mod config;
pub mod steps;

pub use assets::{derive_assets, finalize_artifact, DerivedAssetPair};
pub use config::FusionConfig;

use crate::browser::webdriver::WebDriver;
use crate::browser::{Browser, SessionOptions};
use crate::error::{FetchError, Result};
use crate::utils::files::ensure_directories;
use std::fs;
use std::path::PathBuf;
use steps::Slot;

/// Ids the site indexes by name rather than by number.
const ALIASES: &[(&str, &str)] = &[
    ("199", "slowking"),
    ("201", "unown"),
    ("664", "scatterbug"),
    ("668", "pyroar"),
];

/// Name to type into the site's search box for `id`.
pub fn resolve_identifier(id: &str) -> String {
    let padded = format!("{:0>3}", id);
    ALIASES
        .iter()
        .find(|(key, _)| *key == padded)
        .map(|(_, name)| name.to_string())
        .unwrap_or(padded)
}

/// Progress of a single fusion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SessionOpen,
    Primed,
    HeadSelected,
    BodySelected,
    FusionTriggered,
    DownloadTriggered,
    ArtifactDiscovered,
    Finalized,
    AssetsDerived,
    Closed,
}

/// The two creatures to fuse, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionRequest {
    head_id: String,
    body_id: String,
}

impl FusionRequest {
    pub fn new(head_id: &str, body_id: &str) -> Result<Self> {
        for id in [head_id, body_id] {
            let valid = !id.is_empty()
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(FetchError::Config(format!(
                    "invalid creature id {:?}",
                    id
                )));
            }
        }
        Ok(Self {
            head_id: head_id.to_string(),
            body_id: body_id.to_string(),
        })
    }

    pub fn head_id(&self) -> &str {
        &self.head_id
    }

    pub fn body_id(&self) -> &str {
        &self.body_id
    }

    /// `{head}.{body}.png`
    pub fn canonical_name(&self) -> String {
        format!("{}.{}.png", self.head_id, self.body_id)
    }
}

/// Result of [`FusionFetcher::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The canonical file already existed; nothing was done.
    Cached(PathBuf),
    Derived(DerivedAssetPair),
}

pub struct FusionFetcher {
    config: FusionConfig,
}

impl FusionFetcher {
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn canonical_path(&self, request: &FusionRequest) -> PathBuf {
        self.config.cache_dir.join(request.canonical_name())
    }

    /// True when the canonical download is already in the cache directory.
    pub fn skip_if_cached(&self, request: &FusionRequest) -> bool {
        self.canonical_path(request).exists()
    }

    /// Browser settings: downloads land in the (absolute) cache directory.
    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions {
            download_dir: fs::canonicalize(&self.config.cache_dir)?,
            window: self.config.window,
            proxy: self.config.proxy.clone(),
        })
    }

    /// Fetch `request` through a WebDriver session unless it is cached.
    pub async fn run(&self, request: &FusionRequest) -> Result<Outcome> {
        tracing::debug!(stage = ?Stage::Idle);
        ensure_directories(&[&self.config.cache_dir])?;
        if self.skip_if_cached(request) {
            tracing::info!("sprite already exists");
            return Ok(Outcome::Cached(self.canonical_path(request)));
        }

        let options = self.session_options()?;
        let browser = WebDriver::open(&self.config.webdriver_url, &options).await?;
        self.fetch(browser, request).await.map(Outcome::Derived)
    }

    /// Run every browser step on `browser`, close it, then derive the sprites.
    pub async fn fetch<B: Browser>(
        &self,
        browser: B,
        request: &FusionRequest,
    ) -> Result<DerivedAssetPair> {
        tracing::debug!(stage = ?Stage::SessionOpen);
        let downloaded = self.drive(&browser, request).await;

        if let Err(e) = browser.quit().await {
            tracing::warn!("failed to close browser session: {}", e);
        }
        tracing::debug!(stage = ?Stage::Closed);
        let canonical = downloaded?;

        tracing::info!("processing sprite");
        let pair = derive_assets(
            &canonical,
            request,
            &self.config.front_dir,
            &self.config.battle_dir,
        )?;
        tracing::debug!(stage = ?Stage::AssetsDerived);
        Ok(pair)
    }

    async fn drive<B: Browser>(&self, browser: &B, request: &FusionRequest) -> Result<PathBuf> {
        let config = &self.config;

        let consent = steps::prime_session(browser, config).await?;
        tracing::debug!(stage = ?Stage::Primed, ?consent);

        let head = resolve_identifier(request.head_id());
        steps::select_creature(browser, Slot::Head, &head, config).await?;
        tracing::debug!(stage = ?Stage::HeadSelected, %head);

        let body = resolve_identifier(request.body_id());
        steps::select_creature(browser, Slot::Body, &body, config).await?;
        tracing::debug!(stage = ?Stage::BodySelected, %body);

        steps::trigger_fusion(browser, config).await?;
        tracing::debug!(stage = ?Stage::FusionTriggered);

        steps::trigger_download(browser, config).await?;
        tracing::debug!(stage = ?Stage::DownloadTriggered);

        let discovered = steps::await_downloaded_filename(browser, config.download_timeout).await?;
        tracing::info!("{}", discovered);
        steps::await_download_on_disk(&config.cache_dir, &discovered, config.download_timeout)
            .await?;
        tracing::debug!(stage = ?Stage::ArtifactDiscovered);

        let canonical = finalize_artifact(&config.cache_dir, request, &discovered)?;
        tracing::debug!(stage = ?Stage::Finalized);
        Ok(canonical)
    }
}
