use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const DEFAULT_BASE_URL: &str = "http://play.pokemonshowdown.com/sprites";

/// Sprite subdirectories worth mirroring, with the file pattern `wget` accepts in each.
pub const MIRROR_TARGETS: &[(&str, &str)] = &[
    ("ani", "*.gif"),
    ("ani-back", "*.gif"),
    ("ani-back-shiny", "*.gif"),
    ("ani-shiny", "*.gif"),
    ("dex", "*.png"),
    ("dex-shiny", "*.png"),
    ("gen5", "*.png"),
    ("gen5-back", "*.png"),
    ("gen5-back-shiny", "*.png"),
    ("gen5-shiny", "*.png"),
];

/// A subdirectory whose mirror run did not succeed.
#[derive(Debug)]
pub struct MirrorFailure {
    pub directory: String,
    pub reason: String,
}

/// `wget` arguments for one subdirectory.
pub fn wget_args(base_url: &str, directory: &str, accept: &str) -> Vec<String> {
    [
        "--recursive",
        "-np",
        "-N",
        "-nd",
        "-nH",
        "--reject=index.html",
        "-e",
        "robots=off",
        "-A",
        accept,
        "--cut-dirs=2",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(format!(
        "{}/{}/",
        base_url.trim_end_matches('/'),
        directory
    )))
    .collect()
}

/// Pick the targets to mirror, optionally restricted to `only`.
pub fn select_targets(only: &[String]) -> io::Result<Vec<(&'static str, &'static str)>> {
    if only.is_empty() {
        return Ok(MIRROR_TARGETS.to_vec());
    }
    only.iter()
        .map(|name| {
            MIRROR_TARGETS
                .iter()
                .find(|(dir, _)| *dir == name.as_str())
                .copied()
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("unknown sprite directory: {}", name),
                    )
                })
        })
        .collect()
}

/// Mirror each target into `{root}/{dir}` with `wget`, one directory at a time.
pub async fn mirror_all(
    root: &Path,
    base_url: &str,
    targets: &[(&str, &str)],
) -> io::Result<Vec<MirrorFailure>> {
    let mut failures = Vec::new();

    for (directory, accept) in targets {
        let cwd: PathBuf = root.join(directory);
        std::fs::create_dir_all(&cwd)?;
        println!("Mirroring {} into {}", directory, cwd.display());

        let status = Command::new("wget")
            .args(wget_args(base_url, directory, accept))
            .current_dir(&cwd)
            .status()
            .await;

        let reason = match status {
            Ok(status) if status.success() => continue,
            Ok(status) => format!("wget exited with {}", status),
            Err(e) => format!("failed to run wget: {}", e),
        };
        tracing::warn!(directory, "{}", reason);
        failures.push(MirrorFailure {
            directory: directory.to_string(),
            reason,
        });
    }

    Ok(failures)
}
