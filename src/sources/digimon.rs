use crate::utils::files::write_json;
use crate::utils::http::download_file;
use crate::utils::images::validate_image;
use futures::stream::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://www.digimons.net/digimon";

/// One `[id, image_key]` pair from the download list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigimonEntry(pub String, pub String);

impl DigimonEntry {
    pub fn id(&self) -> &str {
        &self.0
    }

    pub fn image_key(&self) -> &str {
        &self.1
    }

    pub fn image_url(&self, base_url: &str) -> String {
        format!("{}/{}/{}.jpg", base_url.trim_end_matches('/'), self.1, self.1)
    }

    pub fn raw_path(&self, raw_dir: &Path) -> PathBuf {
        raw_dir.join(format!("{}.jpg", self.0))
    }

    /// Where the download is staged until it validates.
    fn part_path(&self, raw_dir: &Path) -> PathBuf {
        raw_dir.join(format!("{}.jpg.part", self.0))
    }
}

/// Totals for a download run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub failed: Vec<DigimonEntry>,
}

pub fn read_list(list_path: &Path) -> io::Result<Vec<DigimonEntry>> {
    let json_content = fs::read_to_string(list_path)?;
    serde_json::from_str(&json_content).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", list_path.display(), e),
        )
    })
}

/// True when `path` holds a complete image. A leftover that fails validation
/// is removed so it is fetched again.
fn is_complete_download(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match validate_image(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Re-downloading invalid {}: {}", path.display(), e);
            if let Err(cleanup_err) = fs::remove_file(path) {
                tracing::warn!("Failed to remove invalid image file: {}", cleanup_err);
            }
            false
        }
    }
}

/// Download every entry of `list_path` from `base_url` into `raw_dir`,
/// writing failures to `failed_path`.
pub async fn download_all(
    list_path: &Path,
    raw_dir: &Path,
    failed_path: &Path,
    base_url: &str,
    thread_count: usize,
) -> io::Result<DownloadSummary> {
    let entries = read_list(list_path)?;
    fs::create_dir_all(raw_dir)?;

    let (existing, pending): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|entry| is_complete_download(&entry.raw_path(raw_dir)));

    println!(
        "Found {} entries, skipping {} that already exist",
        existing.len() + pending.len(),
        existing.len()
    );

    let client = reqwest::Client::new();
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            .progress_chars("#>-"),
    );

    let results: Vec<(DigimonEntry, io::Result<()>)> =
        futures::stream::iter(pending.into_iter().map(|entry| {
            let client = client.clone();
            let pb = pb.clone();
            async move {
                let result = fetch_entry(&client, &entry, base_url, raw_dir).await;
                if let Err(e) = &result {
                    tracing::warn!(id = entry.id(), key = entry.image_key(), "download failed: {}", e);
                }
                pb.inc(1);
                (entry, result)
            }
        }))
        .buffer_unordered(thread_count.max(1))
        .collect()
        .await;

    pb.finish_with_message("Download complete!");

    let mut summary = DownloadSummary {
        skipped_existing: existing.len(),
        ..Default::default()
    };
    for (entry, result) in results {
        match result {
            Ok(()) => summary.downloaded += 1,
            Err(_) => summary.failed.push(entry),
        }
    }
    // Keep the failure list stable across runs regardless of completion order.
    summary.failed.sort_by(|a, b| a.0.cmp(&b.0));

    write_json(failed_path, &summary.failed)?;
    Ok(summary)
}

/// Fetch into `{id}.jpg.part`, validate, then move into place. Only a
/// validated image ever appears under its final name.
async fn fetch_entry(
    client: &reqwest::Client,
    entry: &DigimonEntry,
    base_url: &str,
    raw_dir: &Path,
) -> io::Result<()> {
    let part = entry.part_path(raw_dir);
    let result = async {
        download_file(client, &entry.image_url(base_url), &part).await?;
        validate_image(&part)?;
        fs::rename(&part, entry.raw_path(raw_dir))
    }
    .await;

    if result.is_err() && part.exists() {
        if let Err(cleanup_err) = fs::remove_file(&part) {
            tracing::warn!("Failed to cleanup partial download: {}", cleanup_err);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_parse_from_pair_arrays() {
        let entries: Vec<DigimonEntry> =
            serde_json::from_str(r#"[["agumon", "agumon"], ["plotmon", "plotmon_x"]]"#).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id(), "plotmon");
        assert_eq!(entries[1].image_key(), "plotmon_x");
        assert_eq!(
            entries[1].image_url(DEFAULT_BASE_URL),
            "http://www.digimons.net/digimon/plotmon_x/plotmon_x.jpg"
        );
        assert_eq!(
            entries[1].image_url("http://mirror.local/"),
            "http://mirror.local/plotmon_x/plotmon_x.jpg"
        );
        assert_eq!(
            entries[1].raw_path(Path::new("raw")),
            Path::new("raw/plotmon.jpg")
        );
    }

    #[test]
    fn failed_list_round_trips_in_input_shape() {
        let failed = vec![DigimonEntry("a".into(), "b".into())];
        assert_eq!(serde_json::to_string(&failed).unwrap(), r#"[["a","b"]]"#);
    }

    #[test]
    fn malformed_list_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digimon_list.json");
        fs::write(&path, r#"{"agumon": "agumon"}"#).unwrap();
        assert_eq!(
            read_list(&path).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    // Nothing listens on the discard port, so every request fails fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    struct Workspace {
        _dir: tempfile::TempDir,
        list: PathBuf,
        raw: PathBuf,
        failed: PathBuf,
    }

    fn workspace(list_json: &str) -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("digimon_list.json");
        let raw = dir.path().join("raw");
        let failed = dir.path().join("failed_list.json");
        fs::write(&list, list_json).unwrap();
        fs::create_dir_all(&raw).unwrap();
        Workspace {
            _dir: dir,
            list,
            raw,
            failed,
        }
    }

    fn write_jpeg(path: &Path) {
        let img = image::RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([x as u8 * 8, y as u8 * 8, 90])
        });
        img.save(path).unwrap();
    }

    #[tokio::test]
    async fn existing_files_are_skipped_without_network() {
        let ws = workspace(r#"[["agumon", "agumon"]]"#);
        write_jpeg(&ws.raw.join("agumon.jpg"));

        let summary = download_all(&ws.list, &ws.raw, &ws.failed, UNREACHABLE, 4)
            .await
            .unwrap();

        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(summary.downloaded, 0);
        assert!(summary.failed.is_empty());
        assert_eq!(fs::read_to_string(&ws.failed).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn unreachable_host_lands_in_failed_list() {
        let ws = workspace(r#"[["agumon", "agumon"]]"#);

        let summary = download_all(&ws.list, &ws.raw, &ws.failed, UNREACHABLE, 4)
            .await
            .unwrap();

        assert_eq!(summary.downloaded, 0);
        assert_eq!(
            summary.failed,
            vec![DigimonEntry("agumon".into(), "agumon".into())]
        );
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&ws.failed).unwrap()).unwrap();
        assert_eq!(written, serde_json::json!([["agumon", "agumon"]]));
        assert!(!ws.raw.join("agumon.jpg").exists());
        assert!(!ws.raw.join("agumon.jpg.part").exists());
    }

    #[tokio::test]
    async fn truncated_existing_file_is_fetched_again() {
        let ws = workspace(r#"[["agumon", "agumon"]]"#);
        fs::write(ws.raw.join("agumon.jpg"), b"jpg").unwrap();

        let summary = download_all(&ws.list, &ws.raw, &ws.failed, UNREACHABLE, 4)
            .await
            .unwrap();

        assert_eq!(summary.skipped_existing, 0);
        assert_eq!(summary.failed.len(), 1);
        assert!(!ws.raw.join("agumon.jpg").exists());
    }
}
