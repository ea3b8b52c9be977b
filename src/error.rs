//! Error types for the fusion fetcher.
//!
//! Every variant maps onto a process exit code so the shell caller can tell
//! a site change (UI timeout) from a slow render (download not found) from a
//! broken artifact (image failure).

use crate::fusion::Stage;
use crate::poll::PollTimeout;
use std::io;
use std::path::PathBuf;

/// Errors that can end a fusion run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A UI element never became available or interactable in time.
    #[error("{stage:?}: {step} timed out: {source}")]
    UiTimeout {
        stage: Stage,
        step: &'static str,
        #[source]
        source: PollTimeout,
    },

    /// The site offered a best match that is not the creature we asked for.
    #[error("{stage:?}: best match {found:?} does not match {wanted:?}")]
    SuggestionMismatch {
        stage: Stage,
        wanted: String,
        found: String,
    },

    /// The downloads view never listed a file.
    #[error("download was not discovered: {0}")]
    DownloadNotFound(PollTimeout),

    /// The discovered download could not be moved to its canonical name.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Decoding, transforming or encoding a sprite failed.
    #[error("image transform failed for {path}: {message}")]
    Image { path: PathBuf, message: String },

    /// The WebDriver endpoint rejected a command or could not be reached.
    #[error("webdriver error: {0}")]
    WebDriver(String),

    /// Invalid fetcher configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchError::UiTimeout { .. } | FetchError::SuggestionMismatch { .. } => 1,
            FetchError::DownloadNotFound(_) | FetchError::Rename { .. } => 2,
            FetchError::Image { .. } => 3,
            FetchError::WebDriver(_) | FetchError::Config(_) | FetchError::Io(_) => 4,
        }
    }
}

/// Convenience type alias for fetcher results.
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timeout() -> PollTimeout {
        PollTimeout {
            waited: Duration::from_secs(10),
            attempts: 10,
            last_error: None,
        }
    }

    #[test]
    fn exit_codes_follow_failure_class() {
        let ui = FetchError::UiTimeout {
            stage: Stage::Primed,
            step: "click head portrait",
            source: timeout(),
        };
        assert_eq!(ui.exit_code(), 1);

        let mismatch = FetchError::SuggestionMismatch {
            stage: Stage::HeadSelected,
            wanted: "slowking".into(),
            found: "Slowbro".into(),
        };
        assert_eq!(mismatch.exit_code(), 1);

        assert_eq!(FetchError::DownloadNotFound(timeout()).exit_code(), 2);

        let rename = FetchError::Rename {
            from: "a.png".into(),
            to: "b.png".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(rename.exit_code(), 2);

        let image = FetchError::Image {
            path: "25.1.png".into(),
            message: "bad header".into(),
        };
        assert_eq!(image.exit_code(), 3);

        assert_eq!(FetchError::WebDriver("refused".into()).exit_code(), 4);
        assert_eq!(FetchError::Config("empty url".into()).exit_code(), 4);
    }

    #[test]
    fn display_ui_timeout_names_step() {
        let err = FetchError::UiTimeout {
            stage: Stage::FusionTriggered,
            step: "click download",
            source: timeout(),
        };
        assert_eq!(
            err.to_string(),
            "FusionTriggered: click download timed out: gave up after 10.0s and 10 attempts"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FetchError>();
    }
}
