//! MIDI Pipes - command line front end
//!
//! Subcommands:
//! - `midipipes midi` - connect every MIDI device to every other one
//! - `midipipes audio` - loop USB audio inputs to the preferred output
//! - `midipipes volume [PERCENT]` - read or set a volume
//! - `midipipes output <NAME>` - choose the preferred output

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use midipipes::system::{CommandExecutor, DeviceKind, DryRunExecutor, SubprocessExecutor};
use midipipes::{Host, Settings, VolumeTarget};

#[derive(Parser)]
#[command(name = "midipipes")]
#[command(about = "Automatic MIDI and USB audio routing")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <config dir>/midipipes/settings.json)
    #[arg(long, global = true, env = "MIDIPIPES_SETTINGS")]
    settings: Option<PathBuf>,

    /// Read the current state but only log routing and volume changes
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset MIDI connections and connect every device to every other
    Midi,

    /// List MIDI devices as JSON
    MidiView,

    /// Loop every USB audio input to the preferred output
    Audio,

    /// Print the audio topology as JSON
    Config,

    /// Read or set a volume level
    Volume {
        /// New level in percent; omit to read the current level
        #[arg(allow_negative_numbers = true)]
        percent: Option<i64>,

        /// Device id (defaults to the preferred output)
        #[arg(short, long)]
        device: Option<String>,

        /// Device kind: source or sink (defaults to source when --device is given)
        #[arg(short, long)]
        kind: Option<DeviceKind>,
    },

    /// Choose the preferred output by its technical name
    Output {
        /// Sink name, e.g. alsa_output.platform-bcm2835_audio.analog-stereo
        name: String,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> midipipes::Result<()> {
    let settings_path = match cli.settings.or_else(Settings::default_path) {
        Some(path) => path,
        None => {
            log::warn!("No config directory available, using default settings");
            return execute(cli.command, Settings::default(), None, cli.dry_run);
        }
    };

    let settings = Settings::load_for_run(&settings_path, cli.dry_run)?;
    execute(cli.command, settings, Some(settings_path), cli.dry_run)
}

fn execute(
    command: Commands,
    settings: Settings,
    settings_path: Option<PathBuf>,
    dry_run: bool,
) -> midipipes::Result<()> {
    let subprocess = SubprocessExecutor::new(settings.tools.clone());
    let executor: Box<dyn CommandExecutor> = if dry_run {
        Box::new(DryRunExecutor::new(subprocess))
    } else {
        Box::new(subprocess)
    };
    let mut host = Host::new(executor, settings);

    match command {
        Commands::Midi => {
            host.update_midi()?;
            print_json(&true);
        }
        Commands::MidiView => {
            let names: Vec<String> = host.midi_clients()?.into_iter().map(|c| c.name).collect();
            print_json(&names);
        }
        Commands::Audio => {
            host.update_audio()?;
            print_json(&true);
        }
        Commands::Config => print_json(&host.topology()?),
        Commands::Volume {
            percent,
            device,
            kind,
        } => {
            let level = host.volume(VolumeTarget::from_parts(device, kind), percent)?;
            print_json(&level);
        }
        Commands::Output { name } => {
            let topology = host.select_output(&name)?;
            match &settings_path {
                Some(path) if !dry_run => host.settings().save(path)?,
                _ => log::info!("Preference not persisted"),
            }
            print_json(&topology);
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to encode output: {}", e),
    }
}
