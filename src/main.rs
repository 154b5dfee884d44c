use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deck_presenter::{
    config::PlayerConfig,
    converter::{AssetPlacement, Converter},
    descriptor::{DEFAULT_FOLDER, Playlist, Resolver, StartAt},
    playback::session::SessionOptions,
    player::Player,
    types::Presentation,
};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Present and package pre-rendered slide decks", long_about = None)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct FolderArg {
    /// Folder holding the scene descriptors.
    #[arg(long, default_value = DEFAULT_FOLDER)]
    folder: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Present one or more scenes in the terminal, back to back.
    Present {
        /// Scene names; optional when the folder holds exactly one.
        scenes: Vec<String>,
        #[command(flatten)]
        folder: FolderArg,
        /// Playlist file sequencing scenes; replaces SCENES and --folder.
        #[arg(long, conflicts_with = "scenes")]
        playlist: Option<PathBuf>,
        /// Start position as `SCENE,SLIDE`; negative values count from the end.
        #[arg(long, allow_hyphen_values = true)]
        start_at: Option<StartAt>,
        /// Player config file (defaults to the per-user config).
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        start_paused: bool,
        /// Stop once the last slide has played.
        #[arg(long)]
        exit_after_last_slide: bool,
        /// Media speed multiplier.
        #[arg(long)]
        playback_rate: Option<f64>,
    },
    /// Package scenes as a standalone HTML document.
    Convert {
        #[arg(required = true)]
        scenes: Vec<String>,
        /// Output document, e.g. `talk.html`.
        output: PathBuf,
        #[command(flatten)]
        folder: FolderArg,
        /// Inline media into the document instead of `<name>_assets/`.
        #[arg(long)]
        embed: bool,
    },
    /// List the scenes that resolve cleanly.
    List {
        #[command(flatten)]
        folder: FolderArg,
    },
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Present {
            scenes,
            folder,
            playlist,
            start_at,
            config,
            start_paused,
            exit_after_last_slide,
            playback_rate,
        } => {
            let (presentation, lengths) = match playlist {
                Some(path) => load_playlist(&path)?,
                None => load_scenes(&folder.folder, scenes)?,
            };

            let start_index = match start_at {
                Some(at) => at
                    .slide_index(&lengths)
                    .with_context(|| format!("start position {},{} is out of range", at.scene, at.slide))?,
                None => 0,
            };

            let config = PlayerConfig::load(config.as_deref())?;
            let playback_rate = playback_rate.unwrap_or(config.playback_rate);
            if !(playback_rate > 0.0 && playback_rate.is_finite()) {
                bail!("playback rate must be a positive number, got {playback_rate}");
            }
            let options = SessionOptions {
                start_index,
                start_paused: start_paused || config.start_paused,
                exit_after_last_slide: exit_after_last_slide || config.exit_after_last_slide,
                playback_rate,
            };

            let end = Player::new(&presentation, config, options).play()?;
            tracing::info!(?end, presentation = %presentation.name, "presentation closed");
            Ok(())
        }
        Commands::Convert {
            scenes,
            output,
            folder,
            embed,
        } => {
            let resolver = Resolver::new(&folder.folder);
            let name = scenes.join("+");
            let presentation = resolver.resolve_many(&scenes, &name)?;

            let placement = if embed {
                AssetPlacement::Embedded
            } else {
                AssetPlacement::CoLocated
            };
            let report = Converter::new(placement).convert(&presentation, &output)?;

            eprintln!(
                "Converted {} slides from {} -> {} ({} assets, {} bytes)",
                presentation.len(),
                name,
                report.document.display(),
                report.assets,
                report.bytes,
            );
            Ok(())
        }
        Commands::List { folder } => {
            for name in Resolver::new(&folder.folder).list()? {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Resolve the requested scenes (or the only one in `folder`) and return
/// them joined, along with each scene's slide count.
fn load_scenes(folder: &Path, mut scenes: Vec<String>) -> Result<(Presentation, Vec<usize>)> {
    let resolver = Resolver::new(folder);
    if scenes.is_empty() {
        let available = resolver
            .list()
            .with_context(|| format!("Failed to list {}", folder.display()))?;
        match available.as_slice() {
            [only] => scenes.push(only.clone()),
            [] => bail!("no presentations found in {}", folder.display()),
            many => bail!(
                "{} holds several presentations, pick one or more of: {}",
                folder.display(),
                many.join(", ")
            ),
        }
    }

    let name = scenes.join("+");
    let parts = resolver.resolve_scenes(&scenes)?;
    Ok(join(name, parts))
}

fn load_playlist(path: &Path) -> Result<(Presentation, Vec<usize>)> {
    let playlist = Playlist::load(path)?;
    let parts = playlist.resolver(path).resolve_scenes(&playlist.sequence)?;
    Ok(join(playlist.display_name(path), parts))
}

fn join(name: String, mut parts: Vec<Presentation>) -> (Presentation, Vec<usize>) {
    let lengths = parts.iter().map(Presentation::len).collect();
    let presentation = if parts.len() == 1 {
        parts.remove(0)
    } else {
        Presentation::concat(name, parts)
    };
    (presentation, lengths)
}
