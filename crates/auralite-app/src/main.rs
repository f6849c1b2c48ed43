//! # AuraLite
//!
//! Plays one uncompressed WAV file on the default (or named) output device.

use anyhow::{Context, Result};
use auralite_audio::output::{default_device_name, list_output_devices};
use auralite_audio::{
    load_with, CompletionMode, NullBackend, OutputConfig, ParseMode, PlatformBackend,
    PlaybackBackend, Player, SoundBuffer,
};
use auralite_core::Error;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for files that cannot be read as sound.
const EXIT_BAD_INPUT: u8 = 2;

/// Command-line arguments for auralite
#[derive(Parser, Debug)]
#[command(name = "auralite")]
#[command(about = "Play an uncompressed PCM WAV file")]
#[command(version)]
struct Args {
    /// WAV file to play
    #[arg(required_unless_present = "list_devices")]
    path: Option<PathBuf>,

    /// Start playback this many seconds into the file
    #[arg(short, long, value_name = "SECONDS", allow_negative_numbers = true)]
    seek: Option<f64>,

    /// Header parser
    #[arg(long, value_enum, default_value_t = Parse::ChunkWalk)]
    parse: Parse,

    /// Output device name (default device when omitted)
    #[arg(short, long, value_name = "NAME")]
    device: Option<String>,

    /// Return after the estimated duration instead of waiting for the device to drain
    #[arg(long)]
    estimate: bool,

    /// Run the full lifecycle without opening an audio device
    #[arg(long)]
    no_device: bool,

    /// Print the output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Parse {
    ChunkWalk,
    Canonical,
}

impl From<Parse> for ParseMode {
    fn from(parse: Parse) -> Self {
        match parse {
            Parse::ChunkWalk => Self::ChunkWalk,
            Parse::Canonical => Self::Canonical,
        }
    }
}

impl Args {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            device: self.device.clone(),
            completion: if self.estimate {
                CompletionMode::Estimate
            } else {
                CompletionMode::Signal
            },
            ..OutputConfig::default()
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auralite=info,auralite_audio=info".into()),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if args.list_devices {
        return print_devices();
    }
    let Some(path) = args.path.as_ref() else {
        anyhow::bail!("no input file given");
    };

    info!("Starting AuraLite v{}", env!("CARGO_PKG_VERSION"));

    let sound = load_with(path, args.parse.into())
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(
        "{}: {:.2}s of {}",
        path.display(),
        sound.duration(),
        sound.format()
    );

    let config = args.output_config();
    let finished_at = if args.no_device {
        play::<NullBackend>(&sound, &config, args.seek)?
    } else {
        play::<PlatformBackend>(&sound, &config, args.seek)?
    };

    println!("{finished_at:.3}s / {:.3}s", sound.duration());
    Ok(())
}

/// Open a player, play `sound` once and close the player.
///
/// Returns the cursor time after playback.
fn play<B: PlaybackBackend>(
    sound: &SoundBuffer,
    config: &OutputConfig,
    seek: Option<f64>,
) -> Result<f64> {
    let mut player: Player<B> = Player::with_config(sound.format(), config)
        .context("Failed to initialize audio output")?;

    if let Some(seconds) = seek {
        let at = player.seek(sound, seconds);
        info!("Starting at {at:.3}s");
    }

    player.play(sound).context("Playback failed")?;
    let finished_at = player.current_time(sound);

    player.close().context("Failed to close audio output")?;
    Ok(finished_at)
}

fn print_devices() -> Result<()> {
    let default = default_device_name();
    for name in list_output_devices().context("Failed to enumerate output devices")? {
        let marker = if default.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {name}");
    }
    Ok(())
}

/// Bad input exits with 2, everything else with 1.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_input_error() || matches!(e, Error::Io(_)) => EXIT_BAD_INPUT,
        _ => 1,
    }
}
