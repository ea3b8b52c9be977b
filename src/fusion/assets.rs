//! Front and battle sprite derivation from a canonical fusion download.

use super::FusionRequest;
use crate::error::{FetchError, Result};
use crate::utils::images::{apply_all, open_rgba, save_png, Gravity, Transform};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Height of the watermark band at the bottom of every site download.
///
/// A download must be at least `WATERMARK_BAND + 1` rows tall. Anything
/// shorter has no sprite left after the chop and `derive_assets` fails with
/// `FetchError::Image` (exit code 3).
pub const WATERMARK_BAND: u32 = 36;

const TRIM: Transform = Transform::Chop { height: WATERMARK_BAND };

const FRONT: [Transform; 3] = [
    Transform::Extent {
        width: 300,
        height: 300,
        gravity: Gravity::North,
    },
    Transform::Extent {
        width: 240,
        height: 240,
        gravity: Gravity::Center,
    },
    Transform::Resize {
        width: 120,
        height: 120,
    },
];

const BATTLE: [Transform; 3] = [
    Transform::Extent {
        width: 300,
        height: 300,
        gravity: Gravity::North,
    },
    Transform::Extent {
        width: 192,
        height: 192,
        gravity: Gravity::Center,
    },
    Transform::Resize {
        width: 96,
        height: 96,
    },
];

/// The two durable outputs of a fusion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAssetPair {
    pub front: PathBuf,
    pub battle: PathBuf,
}

fn image_error(path: &Path) -> impl FnOnce(io::Error) -> FetchError + '_ {
    move |e| FetchError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Move the site-named download to `{head}.{body}.png` inside `download_dir`.
pub fn finalize_artifact(
    download_dir: &Path,
    request: &FusionRequest,
    discovered: &str,
) -> Result<PathBuf> {
    // The downloads view may report a bare name or a full path.
    let name = Path::new(discovered)
        .file_name()
        .ok_or_else(|| FetchError::Rename {
            from: PathBuf::from(discovered),
            to: download_dir.join(request.canonical_name()),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no file name"),
        })?;
    let from = download_dir.join(name);
    let to = download_dir.join(request.canonical_name());

    if from != to {
        fs::rename(&from, &to).map_err(|source| FetchError::Rename {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
    }
    println!("[[ {} ]]", request.canonical_name());
    Ok(to)
}

/// Produce the 120x120 front and 96x96 battle sprites for `canonical`.
///
/// The canonical file itself is only read, so running this twice yields the
/// same bytes.
pub fn derive_assets(
    canonical: &Path,
    request: &FusionRequest,
    front_root: &Path,
    battle_root: &Path,
) -> Result<DerivedAssetPair> {
    let source = open_rgba(canonical).map_err(image_error(canonical))?;
    let trimmed = TRIM.apply(&source).map_err(image_error(canonical))?;

    let pair = DerivedAssetPair {
        front: front_root
            .join(request.head_id())
            .join(request.canonical_name()),
        battle: battle_root
            .join(request.head_id())
            .join(request.canonical_name()),
    };

    for (steps, target) in [(&FRONT, &pair.front), (&BATTLE, &pair.battle)] {
        tracing::debug!(?steps, target = %target.display(), "deriving sprite");
        let derived = apply_all(&trimmed, steps).map_err(image_error(canonical))?;
        save_png(&derived, target).map_err(image_error(target))?;
    }

    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_sprite(path: &Path, width: u32, height: u32) {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]);
        }
        save_png(&img, path).unwrap();
    }

    fn request() -> FusionRequest {
        FusionRequest::new("25", "1").unwrap()
    }

    #[test]
    fn outputs_have_fixed_resolutions_for_any_source_size() {
        for (width, height) in [(288, 288), (50, 500), (1000, 80), (37, 37)] {
            let dir = tempfile::tempdir().unwrap();
            let canonical = dir.path().join("cache/25.1.png");
            write_sprite(&canonical, width, height);

            let pair = derive_assets(
                &canonical,
                &request(),
                &dir.path().join("front"),
                &dir.path().join("battle"),
            )
            .unwrap();

            assert_eq!(pair.front, dir.path().join("front/25/25.1.png"));
            assert_eq!(pair.battle, dir.path().join("battle/25/25.1.png"));
            assert_eq!(open_rgba(&pair.front).unwrap().dimensions(), (120, 120));
            assert_eq!(open_rgba(&pair.battle).unwrap().dimensions(), (96, 96));
        }
    }

    #[test]
    fn derivation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("cache/25.1.png");
        write_sprite(&canonical, 288, 288);
        let front = dir.path().join("front");
        let battle = dir.path().join("battle");

        let pair = derive_assets(&canonical, &request(), &front, &battle).unwrap();
        let first = (fs::read(&pair.front).unwrap(), fs::read(&pair.battle).unwrap());

        derive_assets(&canonical, &request(), &front, &battle).unwrap();
        let second = (fs::read(&pair.front).unwrap(), fs::read(&pair.battle).unwrap());

        assert_eq!(first, second);
    }

    #[test]
    fn too_short_download_is_an_image_failure() {
        for height in [20, WATERMARK_BAND] {
            let dir = tempfile::tempdir().unwrap();
            let canonical = dir.path().join("25.1.png");
            write_sprite(&canonical, 100, height);

            let err =
                derive_assets(&canonical, &request(), dir.path(), dir.path()).unwrap_err();
            assert!(matches!(err, FetchError::Image { .. }));
            assert_eq!(err.exit_code(), 3);
        }
    }

    #[test]
    fn one_row_above_watermark_band_still_derives() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().join("25.1.png");
        write_sprite(&canonical, 100, WATERMARK_BAND + 1);

        let pair = derive_assets(
            &canonical,
            &request(),
            &dir.path().join("front"),
            &dir.path().join("battle"),
        )
        .unwrap();
        assert_eq!(open_rgba(&pair.front).unwrap().dimensions(), (120, 120));
        assert_eq!(open_rgba(&pair.battle).unwrap().dimensions(), (96, 96));
    }

    #[test]
    fn missing_canonical_is_an_image_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = derive_assets(
            &dir.path().join("nope.png"),
            &request(),
            dir.path(),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::Image { .. }));
    }

    #[test]
    fn finalize_renames_to_canonical_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fusion (3).png"), b"png").unwrap();

        let path = finalize_artifact(dir.path(), &request(), "fusion (3).png").unwrap();
        assert_eq!(path, dir.path().join("25.1.png"));
        assert!(path.exists());
        assert!(!dir.path().join("fusion (3).png").exists());
    }

    #[test]
    fn finalize_accepts_full_path_from_downloads_view() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("download.png"), b"png").unwrap();

        let reported = dir.path().join("download.png");
        let path =
            finalize_artifact(dir.path(), &request(), &reported.to_string_lossy()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn finalize_surfaces_missing_download() {
        let dir = tempfile::tempdir().unwrap();
        let err = finalize_artifact(dir.path(), &request(), "gone.png").unwrap_err();
        assert!(matches!(err, FetchError::Rename { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}
