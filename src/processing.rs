use crate::utils::files::{ensure_directories, list_image_files};
use crate::utils::images::{open_rgba, save_png, Transform};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Colour tolerance for the background flood fill, as a fraction of the RGB range.
pub const BACKGROUND_FUZZ: f32 = 0.05;

const KEY: Transform = Transform::KeyBackground {
    fuzz: BACKGROUND_FUZZ,
};
const DEX: Transform = Transform::Fit {
    width: 120,
    height: 120,
};
const BATTLE: Transform = Transform::Fit {
    width: 96,
    height: 96,
};

/// Directory layout of a batch run; every path is relative to one root.
#[derive(Debug, Clone)]
pub struct BatchLayout {
    pub raw: PathBuf,
    pub cache: PathBuf,
    pub dex: PathBuf,
    pub battle: PathBuf,
}

impl BatchLayout {
    pub fn under(root: &Path) -> Self {
        Self {
            raw: root.join("raw"),
            cache: root.join("cache"),
            dex: root.join("dex"),
            battle: root.join("battle"),
        }
    }
}

/// Statistics for a batch run
#[derive(Debug, Default)]
pub struct BatchStats {
    pub processed: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Key out the background of every raw image, then write dex and battle sizes.
pub fn process_batch(layout: &BatchLayout) -> Result<BatchStats, Box<dyn std::error::Error>> {
    if !layout.raw.is_dir() {
        return Err(format!("{} is not a directory", layout.raw.display()).into());
    }
    ensure_directories(&[&layout.cache, &layout.dex, &layout.battle])?;

    let files = list_image_files(&layout.raw)?;
    println!("Found {} raw images in {}", files.len(), layout.raw.display());

    let mut stats = BatchStats::default();
    let (files, duplicates) = claim_output_names(files);
    for (file, first) in duplicates {
        let reason = format!(
            "output {} already produced by {}",
            output_name(&file).unwrap_or_default(),
            first.display()
        );
        tracing::warn!("Skipping {}: {}", file.display(), reason);
        stats.failed.push((file, reason));
    }

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}",
            )?
            .progress_chars("=>-"),
    );
    progress_bar.set_message("Processing sprites");

    let results: Vec<(PathBuf, Result<(), String>)> = files
        .par_iter()
        .map(|file| {
            let result = process_file(file, layout).map_err(|e| e.to_string());
            if let Err(e) = &result {
                tracing::warn!("Error processing {}: {}", file.display(), e);
            }
            progress_bar.inc(1);
            (file.clone(), result)
        })
        .collect();

    progress_bar.finish_with_message("Completed sprite processing");

    for (file, result) in results {
        match result {
            Ok(()) => stats.processed += 1,
            Err(e) => stats.failed.push((file, e)),
        }
    }
    Ok(stats)
}

fn output_name(file: &Path) -> Option<String> {
    file.file_stem().map(|stem| format!("{}.png", stem.to_string_lossy()))
}

/// Split `files` (sorted) into those that own their output name and later
/// ones whose stem collides, paired with the file that claimed it first.
fn claim_output_names(files: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<(PathBuf, PathBuf)>) {
    let mut owners: HashMap<String, PathBuf> = HashMap::new();
    let mut unique = Vec::with_capacity(files.len());
    let mut duplicates = Vec::new();

    for file in files {
        match output_name(&file) {
            Some(name) => match owners.get(&name) {
                Some(first) => duplicates.push((file, first.clone())),
                None => {
                    owners.insert(name, file.clone());
                    unique.push(file);
                }
            },
            // `process_file` reports the bad name.
            None => unique.push(file),
        }
    }
    (unique, duplicates)
}

fn process_file(
    file: &Path,
    layout: &BatchLayout,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let name = output_name(file).ok_or("Invalid file name")?;

    let keyed = KEY.apply(&open_rgba(file)?)?;
    save_png(&keyed, &layout.cache.join(&name))?;
    save_png(&DEX.apply(&keyed)?, &layout.dex.join(&name))?;
    save_png(&BATTLE.apply(&keyed)?, &layout.battle.join(&name))?;
    Ok(())
}
