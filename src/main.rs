use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use gameshelf_lib::core::config::{download_dir, TransferConfig};
use gameshelf_lib::core::game::GameMetadata;
use gameshelf_lib::core::launch::launch_game;
use gameshelf_lib::core::progress::{ProgressChannel, ProgressEvent, ProgressListener};
use gameshelf_lib::core::transfer::{DownloadRequest, TransferService};

const BAR_STYLE: &str = "{prefix:>10.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos:>3}%";

#[derive(Debug, Parser)]
#[command(name = "gameshelf", version, about = "Move games in and out of the library")]
struct Cli {
    /// Settings file to use instead of the one in the data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download a game archive and unpack it.
    Download {
        url: String,
        /// Folder to extract into (defaults to the downloads folder).
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Name for the downloaded archive (defaults to the URL's last segment).
        #[arg(long)]
        file_name: Option<String>,
        #[arg(long, default_value = "cli")]
        id: String,
    },
    /// Bundle installed games into one archive.
    Export {
        archive: PathBuf,
        /// `<id>=<executable>`; repeat for each game.
        #[arg(long = "game", value_parser = parse_game)]
        games: Vec<GameMetadata>,
        /// JSON array of games, same shape as a bundle's config.json.
        #[arg(long)]
        games_file: Option<PathBuf>,
    },
    /// Unpack a bundle and install its games under a folder.
    Import { archive: PathBuf, dest_root: PathBuf },
    /// Start a game executable detached.
    Launch { execution_path: PathBuf },
}

fn parse_game(raw: &str) -> Result<GameMetadata, String> {
    match raw.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok(GameMetadata::new(id, path))
        }
        _ => Err(format!("expected <id>=<executable>, got '{raw}'")),
    }
}

/// Terminal progress bar driven by the service's progress events.
struct BarListener {
    bar: ProgressBar,
}

impl BarListener {
    fn new(prefix: &'static str) -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template(BAR_STYLE) {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_prefix(prefix);
        Self { bar }
    }
}

impl ProgressListener for BarListener {
    fn on_progress(&self, _channel: ProgressChannel, event: &ProgressEvent) {
        self.bar.set_position(u64::from(event.percent));
    }
}

fn attach_bar(service: &TransferService, channel: ProgressChannel, prefix: &'static str) -> ProgressBar {
    let listener = BarListener::new(prefix);
    let bar = listener.bar.clone();
    service.progress().subscribe(channel, Arc::new(listener));
    bar
}

fn start_service(config: TransferConfig) -> Result<TransferService> {
    TransferService::new(config).context("failed to start transfer service")
}

#[tokio::main]
async fn main() -> Result<()> {
    gameshelf_lib::init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TransferConfig::load_from(path).with_overrides(|k| std::env::var(k).ok()),
        None => TransferConfig::load(),
    };

    match cli.command {
        Command::Download {
            url,
            dest,
            file_name,
            id,
        } => {
            let file_name = match file_name {
                Some(name) => name,
                None => url
                    .rsplit('/')
                    .next()
                    .and_then(|s| s.split(['?', '#']).next())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .context("cannot derive a file name from the URL; pass --file-name")?,
            };
            let dest_dir = dest.unwrap_or_else(download_dir);
            let service = start_service(config)?;

            let bar = attach_bar(&service, ProgressChannel::Download, "download");
            let bytes = service
                .download_and_extract(DownloadRequest {
                    id,
                    url,
                    dest_dir: dest_dir.clone(),
                    file_name,
                })
                .await?;
            bar.finish();
            println!("Downloaded {bytes} bytes into {}", dest_dir.display());
        }
        Command::Export {
            archive,
            mut games,
            games_file,
        } => {
            if let Some(path) = games_file {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?;
                let listed: Vec<GameMetadata> = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not a game list", path.display()))?;
                games.extend(listed);
            }
            if games.is_empty() {
                bail!("nothing to export; pass --game or --games-file");
            }

            let service = start_service(config)?;
            let bar = attach_bar(&service, ProgressChannel::Export, "export");
            let summary = service.export_games(&games, &archive).await?;
            bar.finish();
            for game in &summary.games {
                println!("{:<24} {:?}", game.id, game.strategy);
            }
            println!("Wrote {}", summary.archive.display());
        }
        Command::Import { archive, dest_root } => {
            let service = start_service(config)?;
            let bar = attach_bar(&service, ProgressChannel::Import, "import");
            let summary = service.import_games(&archive, &dest_root).await?;
            bar.finish();
            for game in &summary.installed {
                println!("{:<24} {}", game.id, game.execution_path.display());
            }
        }
        Command::Launch { execution_path } => {
            let pid = launch_game(&execution_path)?;
            println!("Started {} (pid {pid})", execution_path.display());
        }
    }

    Ok(())
}
