use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod browser;
mod error;
mod fusion;
mod poll;
mod processing;
mod sources;
mod utils;

use fusion::{FusionConfig, FusionFetcher, FusionRequest, Outcome};

/// Sprite scraping and processing jobs for the battle client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a fusion sprite on the fusion site and derive front/battle sprites
    Fusion(FusionArgs),
    /// Download raw Digimon artwork listed in a JSON file
    DigimonDownload {
        /// JSON list of [id, image_key] pairs
        #[arg(short, long, default_value = "digimon_list.json")]
        list: PathBuf,

        /// Directory for raw images
        #[arg(short, long, default_value = "raw")]
        raw: PathBuf,

        /// Where to write the pairs that failed to download
        #[arg(short, long, default_value = "failed_list.json")]
        failed: PathBuf,

        /// Site root holding {key}/{key}.jpg artwork
        #[arg(long, default_value = sources::digimon::DEFAULT_BASE_URL)]
        base_url: String,

        /// Number of concurrent downloads (defaults to number of CPU cores)
        #[arg(short, long, default_value_t = thread::available_parallelism().map_or(1, |p| p.get()))]
        threads: usize,
    },
    /// Key out backgrounds of raw Digimon artwork and write dex/battle sizes
    DigimonProcess {
        /// Directory containing raw/, cache/, dex/ and battle/
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
    /// Mirror Showdown sprite directories with wget
    Mirror {
        /// Local sprites directory; each mirrored directory lands under it
        #[arg(short, long, default_value = "sprites")]
        root: PathBuf,

        #[arg(long, default_value = sources::showdown::DEFAULT_BASE_URL)]
        base_url: String,

        /// Only mirror these directories (repeatable)
        #[arg(long)]
        only: Vec<String>,
    },
}

#[derive(ClapArgs, Debug)]
struct FusionArgs {
    /// Head creature id
    head: String,
    /// Body creature id
    body: String,

    /// Browser download directory holding canonical {head}.{body}.png files
    #[arg(long, default_value = "sprites/cache")]
    cache_dir: PathBuf,

    /// Root for 120x120 front sprites
    #[arg(long, default_value = "sprites/infinitefusion")]
    front_dir: PathBuf,

    /// Root for 96x96 battle sprites
    #[arg(long, default_value = "sprites/infinitefusion-battle")]
    battle_dir: PathBuf,

    /// WebDriver endpoint (geckodriver)
    #[arg(long, default_value = fusion::config::WEBDRIVER_URL)]
    webdriver: String,

    /// Fusion page URL
    #[arg(long, default_value = fusion::config::FUSION_URL)]
    url: String,

    /// Upstream HTTP/SSL proxy the browser must use
    #[arg(long, default_value = fusion::config::DEFAULT_PROXY)]
    proxy: String,

    /// Run the browser without a proxy
    #[arg(long, default_value_t = false)]
    no_proxy: bool,

    /// Seconds to retry ordinary clicks and typing
    #[arg(long, default_value_t = 10)]
    ui_timeout: u64,

    /// Seconds to retry the fusion button
    #[arg(long, default_value_t = 60)]
    fusion_timeout: u64,

    /// Seconds to wait for the download to show up
    #[arg(long, default_value_t = 60)]
    download_timeout: u64,

    /// Accept any best-match suggestion without checking its text
    #[arg(long, default_value_t = false)]
    no_verify_match: bool,
}

impl FusionArgs {
    fn config(&self) -> FusionConfig {
        FusionConfig {
            cache_dir: self.cache_dir.clone(),
            front_dir: self.front_dir.clone(),
            battle_dir: self.battle_dir.clone(),
            fusion_url: self.url.clone(),
            webdriver_url: self.webdriver.clone(),
            proxy: (!self.no_proxy).then(|| self.proxy.clone()),
            ui_timeout: Duration::from_secs(self.ui_timeout),
            fusion_timeout: Duration::from_secs(self.fusion_timeout),
            download_timeout: Duration::from_secs(self.download_timeout),
            verify_match: !self.no_verify_match,
            ..Default::default()
        }
    }
}

async fn run_fusion(args: FusionArgs) -> error::Result<()> {
    println!("START");
    let request = FusionRequest::new(&args.head, &args.body)?;
    let fetcher = FusionFetcher::new(args.config())?;
    tracing::debug!(webdriver = %fetcher.config().webdriver_url, "fusion config loaded");

    match fetcher.run(&request).await? {
        Outcome::Cached(path) => {
            tracing::info!("{} already exists", path.display());
            println!("EXIT");
        }
        Outcome::Derived(pair) => {
            println!("Front: {}", pair.front.display());
            println!("Battle: {}", pair.battle.display());
            println!("END");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sprite_fetch=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Fusion(fusion_args) => {
            if let Err(e) = run_fusion(fusion_args).await {
                eprintln!("Error: {}", e);
                std::process::exit(e.exit_code());
            }
        }
        Commands::DigimonDownload {
            list,
            raw,
            failed,
            base_url,
            threads,
        } => {
            let summary =
                sources::digimon::download_all(&list, &raw, &failed, &base_url, threads).await?;
            println!(
                "Downloaded {} images, skipped {} existing",
                summary.downloaded, summary.skipped_existing
            );
            if !summary.failed.is_empty() {
                eprintln!(
                    "Warning: {} downloads failed, see {}",
                    summary.failed.len(),
                    failed.display()
                );
                std::process::exit(1);
            }
        }
        Commands::DigimonProcess { root } => {
            let layout = processing::BatchLayout::under(Path::new(&root));
            match processing::process_batch(&layout) {
                Ok(stats) => {
                    println!("Processed {} images", stats.processed);
                    for (file, reason) in &stats.failed {
                        eprintln!("  - {}: {}", file.display(), reason);
                    }
                    if !stats.failed.is_empty() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error during processing: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Mirror {
            root,
            base_url,
            only,
        } => {
            let targets = sources::showdown::select_targets(&only)?;
            let failures = sources::showdown::mirror_all(&root, &base_url, &targets).await?;
            if !failures.is_empty() {
                eprintln!("\n{} directories failed to mirror:", failures.len());
                for failure in &failures {
                    eprintln!("  - {}: {}", failure.directory, failure.reason);
                }
                std::process::exit(1);
            }
            println!("All {} directories mirrored", targets.len());
        }
    }

    Ok(())
}
