use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ensure every directory in `dirs` exists
pub fn ensure_directories<P: AsRef<Path>>(dirs: &[P]) -> io::Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory: {}", dir.display());
        }
    }
    Ok(())
}

/// List image files (`.png`, `.jpg`, `.jpeg`) directly inside `dir`, sorted by name
pub fn list_image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if path.is_file() && is_image_file(&path) {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

/// Write `value` as pretty JSON
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to serialize JSON: {}", e),
        )
    })?;
    fs::write(path, json)
}
