//! Page interactions against the fusion site.
//!
//! Each step wraps its lookups and clicks in [`poll_until`] so a slow page is
//! retried once a second until the step's timeout, after which the step
//! fails with the stage it was in.

use super::{FusionConfig, Stage};
use crate::browser::{Browser, Element};
use crate::error::{FetchError, Result};
use crate::poll::{poll_until, PollPolicy, PollTimeout};
use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

const HEAD_PORTRAIT: &str = "#Rimagediv";
const BODY_PORTRAIT: &str = "#Limagediv";
const SEARCH_BOX: &str = ".searchbar1";
const BEST_MATCH: &str = ".selected";
const FUSE_BUTTON: &str = "#fbutton";
const DOWNLOAD_BUTTON: &str = "#downloadBtn";
const COOKIE_ACCEPT: &str = ".cc-allow";

const DOWNLOADS_PAGE: &str = "about:downloads";
const DOWNLOADED_NAME_SCRIPT: &str = "return document.querySelector('#contentAreaDownloadsView .downloadMainArea .downloadContainer description:nth-of-type(1)')?.value ?? null;";

/// Which half of the fusion a creature goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Head,
    Body,
}

impl Slot {
    fn portrait(self) -> &'static str {
        match self {
            Slot::Head => HEAD_PORTRAIT,
            Slot::Body => BODY_PORTRAIT,
        }
    }

    /// Stage the session is in while this slot is being filled.
    fn stage(self) -> Stage {
        match self {
            Slot::Head => Stage::Primed,
            Slot::Body => Stage::HeadSelected,
        }
    }
}

/// Whether a cookie-consent overlay was found and dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieConsent {
    Dismissed,
    Absent,
}

async fn click_when_ready<B: Browser>(
    browser: &B,
    selector: &str,
    timeout: Duration,
) -> std::result::Result<(), PollTimeout> {
    poll_until(PollPolicy::every_second(timeout), || async move {
        let element = browser.find(selector).await?;
        browser.click(&element).await
    })
    .await
}

fn ui_timeout(stage: Stage, step: &'static str) -> impl FnOnce(PollTimeout) -> FetchError {
    move |source| FetchError::UiTimeout {
        stage,
        step,
        source,
    }
}

/// Load the fusion page and get it into a clickable state.
pub async fn prime_session<B: Browser>(browser: &B, config: &FusionConfig) -> Result<CookieConsent> {
    browser.goto(&config.fusion_url).await?;
    tracing::info!("waiting for the website to load");
    sleep(config.settle_delay).await;

    let consent = dismiss_cookies(browser, config).await;

    tracing::info!("clicking start");
    sleep(config.settle_delay).await;
    if let Err(e) = click_when_ready(browser, FUSE_BUTTON, config.ui_timeout).await {
        tracing::warn!("click start failed: {}", e);
    }
    sleep(config.settle_delay).await;

    Ok(consent)
}

async fn dismiss_cookies<B: Browser>(browser: &B, config: &FusionConfig) -> CookieConsent {
    match click_when_ready(browser, COOKIE_ACCEPT, config.settle_delay).await {
        Ok(()) => {
            tracing::info!("accepting all cookies");
            sleep(config.step_delay).await;
            CookieConsent::Dismissed
        }
        Err(_) => {
            tracing::info!("no cookies to accept");
            CookieConsent::Absent
        }
    }
}

/// Whether the site's best match looks like the creature we typed.
///
/// The suggestion list shows species names, so numeric ids can only be
/// checked for a non-empty match; aliased names must appear in the text.
pub fn suggestion_matches(display_name: &str, suggestion: &str) -> bool {
    let suggestion = suggestion.trim().to_lowercase();
    if suggestion.is_empty() {
        return false;
    }
    if display_name.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    suggestion.contains(&display_name.to_lowercase())
}

/// Open the slot's search field, type `display_name` and pick the best match.
pub async fn select_creature<B: Browser>(
    browser: &B,
    slot: Slot,
    display_name: &str,
    config: &FusionConfig,
) -> Result<()> {
    let stage = slot.stage();

    tracing::info!("clicking on pokemon portrait");
    click_when_ready(browser, slot.portrait(), config.ui_timeout)
        .await
        .map_err(ui_timeout(stage, "click portrait"))?;

    tracing::info!("writing pokemon name ({})", display_name);
    poll_until(PollPolicy::every_second(config.ui_timeout), || async move {
        let search = browser.find(SEARCH_BOX).await?;
        browser.clear(&search).await?;
        browser.send_keys(&search, display_name).await
    })
    .await
    .map_err(ui_timeout(stage, "type name"))?;

    tracing::info!("picking the best choice");
    let last_seen: RefCell<Option<String>> = RefCell::new(None);
    let verify = config.verify_match;
    let best = poll_until(PollPolicy::every_second(config.ui_timeout), || {
        let last_seen = &last_seen;
        async move {
            let element = browser.find(BEST_MATCH).await?;
            if !verify {
                return Ok(element);
            }
            let text = browser.text(&element).await?;
            if suggestion_matches(display_name, &text) {
                Ok(element)
            } else {
                let message = format!("best match is {:?}", text);
                *last_seen.borrow_mut() = Some(text);
                Err(FetchError::WebDriver(message))
            }
        }
    })
    .await;

    let best: Element = match best {
        Ok(element) => element,
        Err(timeout) => {
            return Err(match last_seen.into_inner() {
                Some(found) => FetchError::SuggestionMismatch {
                    stage,
                    wanted: display_name.to_string(),
                    found,
                },
                None => ui_timeout(stage, "find best match")(timeout),
            })
        }
    };

    poll_until(PollPolicy::every_second(config.ui_timeout), || {
        let best = &best;
        async move { browser.click(best).await }
    })
    .await
    .map_err(ui_timeout(stage, "click best match"))
}

/// Click the fusion button; the site renders server-side so this gets the long timeout.
pub async fn trigger_fusion<B: Browser>(browser: &B, config: &FusionConfig) -> Result<()> {
    tracing::info!("pokemon fusion");
    sleep(config.step_delay).await;
    click_when_ready(browser, FUSE_BUTTON, config.fusion_timeout)
        .await
        .map_err(ui_timeout(Stage::BodySelected, "click fusion"))
}

pub async fn trigger_download<B: Browser>(browser: &B, config: &FusionConfig) -> Result<()> {
    tracing::info!("downloading sprite");
    sleep(config.settle_delay).await;
    click_when_ready(browser, DOWNLOAD_BUTTON, config.ui_timeout)
        .await
        .map_err(ui_timeout(Stage::FusionTriggered, "click download"))
}

/// Watch the browser's downloads view in a scratch tab until a filename shows up.
pub async fn await_downloaded_filename<B: Browser>(
    browser: &B,
    timeout: Duration,
) -> Result<String> {
    let previous = browser.current_tab().await?;
    let tab = browser.new_tab().await?;
    browser.switch_to(&tab).await?;
    browser.goto(DOWNLOADS_PAGE).await?;

    let found = poll_until(PollPolicy::every_second(timeout), || async move {
        let value = browser
            .execute(DOWNLOADED_NAME_SCRIPT)
            .await
            .map_err(|e| e.to_string())?;
        match value.as_str().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err("downloads view lists no file yet".to_string()),
        }
    })
    .await
    .map_err(FetchError::DownloadNotFound)?;

    browser.close_tab().await?;
    browser.switch_to(&previous).await?;
    Ok(found)
}

/// Wait until the reported download is fully written to `download_dir`.
///
/// Firefox lists a download before it finishes and keeps the bytes in a
/// `.part` sibling until then.
pub async fn await_download_on_disk(
    download_dir: &Path,
    discovered: &str,
    timeout: Duration,
) -> Result<()> {
    let name = Path::new(discovered)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| discovered.to_string());
    let target = download_dir.join(&name);
    let partial = download_dir.join(format!("{}.part", name));

    poll_until(PollPolicy::every_second(timeout), || {
        let (target, partial) = (&target, &partial);
        async move {
            if partial.exists() {
                Err(format!("{} is still downloading", target.display()))
            } else if target.is_file() {
                Ok(())
            } else {
                Err(format!("{} not on disk yet", target.display()))
            }
        }
    })
    .await
    .map_err(FetchError::DownloadNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn numeric_names_need_any_suggestion() {
        assert!(suggestion_matches("025", "Pikachu"));
        assert!(!suggestion_matches("025", "   "));
    }

    #[test]
    fn aliased_names_must_appear_in_suggestion() {
        assert!(suggestion_matches("slowking", "Slowking"));
        assert!(suggestion_matches("unown", " Unown "));
        assert!(!suggestion_matches("slowking", "Slowbro"));
    }

    #[tokio::test(start_paused = true)]
    async fn download_wait_returns_once_file_lands() {
        let dir = tempfile::tempdir().unwrap();
        let download_dir = dir.path().to_path_buf();
        let writer = tokio::spawn({
            let download_dir = download_dir.clone();
            async move {
                fs::write(download_dir.join("fusion.png.part"), b"partial").unwrap();
                sleep(Duration::from_secs(3)).await;
                fs::rename(
                    download_dir.join("fusion.png.part"),
                    download_dir.join("fusion.png"),
                )
                .unwrap();
            }
        });
        tokio::task::yield_now().await;

        await_download_on_disk(&download_dir, "fusion.png", Duration::from_secs(10))
            .await
            .unwrap();
        writer.await.unwrap();
        assert!(download_dir.join("fusion.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn download_wait_ignores_reported_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fusion.png"), b"png").unwrap();

        await_download_on_disk(dir.path(), "/elsewhere/fusion.png", Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn download_never_written_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fusion.png.part"), b"partial").unwrap();

        let err = await_download_on_disk(dir.path(), "fusion.png", Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::DownloadNotFound(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
