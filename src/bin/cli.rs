//! edotrack CLI: song inspection, headless playback, WAV and JSON export.
//!
//! Usage:
//!   et-cli info song.org
//!   et-cli play song.mid --edo 46 --loop
//!   et-cli render song.org -o out.wav
//!   et-cli export song.mid -o song.json
//!   et-cli import song.json

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use et_master::{Controller, PlaybackEvent, PlayerConfig, Song, TuningProfile};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "et-cli")]
#[command(about = "Microtonal player for MIDI and Organya songs", long_about = None)]
struct Cli {
    /// TOML player configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Steps per octave (38 or 46), overrides the config
    #[arg(long, global = true)]
    edo: Option<u16>,

    /// Companion wavetable resource, overrides the config
    #[arg(long, global = true)]
    wavetable: Option<PathBuf>,

    /// Directory of extra drum WAV files, overrides the config
    #[arg(long, global = true)]
    drums: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print format, tempo, tracks and load diagnostics
    Info { input: PathBuf },

    /// Play through the default audio device
    Play {
        input: PathBuf,

        /// Start measure
        #[arg(short, long)]
        from: Option<u32>,

        /// Override the song tempo (BPM)
        #[arg(short, long)]
        tempo: Option<f64>,

        /// Loop the song's loop region, or the whole song if it has none
        #[arg(long = "loop")]
        looping: bool,
    },

    /// Render to a 16-bit stereo WAV file
    Render {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Maximum length in seconds
        #[arg(short, long)]
        seconds: Option<u32>,

        /// Output sample rate, overrides the config
        #[arg(short, long)]
        rate: Option<u32>,

        /// Loop the song's loop region until `--seconds` runs out
        #[arg(long = "loop")]
        looping: bool,
    },

    /// Export the note model as a JSON project
    Export {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate a JSON project and print a summary
    Import { input: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Info { ref input } => {
            let ctrl = open(config, input)?;
            print_info(ctrl.song());
        }
        Commands::Play {
            ref input,
            from,
            tempo,
            looping,
        } => {
            let mut ctrl = open(config, input)?;
            print_info(ctrl.song());
            if let Some(bpm) = tempo {
                if !ctrl.set_tempo(bpm) {
                    bail!("invalid tempo {}", bpm);
                }
            }
            if looping {
                enable_loop(&mut ctrl);
            }
            play(&mut ctrl, from)?;
        }
        Commands::Render {
            ref input,
            ref output,
            seconds,
            rate,
            looping,
        } => {
            let mut ctrl = open(config, input)?;
            if looping {
                enable_loop(&mut ctrl);
            }
            let rate = rate.unwrap_or(ctrl.config().sample_rate);
            let seconds = seconds.unwrap_or(ctrl.config().max_render_seconds);
            println!("Rendering to {} at {} Hz...", output.display(), rate);
            let wav = ctrl.render_to_wav(rate, seconds);
            std::fs::write(output, &wav).with_context(|| format!("failed to write {}", output.display()))?;
            println!("Rendered {} bytes", wav.len());
        }
        Commands::Export { ref input, ref output } => {
            let ctrl = open(config, input)?;
            let json = ctrl.export_json()?;
            std::fs::write(output, json).with_context(|| format!("failed to write {}", output.display()))?;
            println!("Exported {} notes to {}", ctrl.song().notes.len(), output.display());
        }
        Commands::Import { ref input } => {
            let text =
                std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
            let mut ctrl = Controller::new(config)?;
            ctrl.import_json(&text)
                .with_context(|| format!("{} is not a valid song file", input.display()))?;
            print_info(ctrl.song());
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<PlayerConfig> {
    let mut config = match &cli.config {
        Some(path) => PlayerConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(steps) = cli.edo {
        let profile = TuningProfile::from_steps(steps)
            .with_context(|| format!("unsupported division {}, expected 38 or 46", steps))?;
        config.tuning = profile.into();
    }
    if let Some(path) = &cli.wavetable {
        config.wavetable = Some(path.clone());
    }
    if let Some(dir) = &cli.drums {
        config.drum_dir = Some(dir.clone());
    }
    config.validate()?;
    debug!(
        tuning = %config.tuning_profile(),
        sample_rate = config.sample_rate,
        "effective configuration"
    );
    Ok(config)
}

fn open(config: PlayerConfig, input: &Path) -> Result<Controller> {
    let mut ctrl = Controller::new(config).context("failed to load wave resources")?;
    ctrl.load_file(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    Ok(ctrl)
}

fn enable_loop(ctrl: &mut Controller) {
    let region = ctrl.song().loop_region;
    if region.is_active() {
        ctrl.set_loop(true, region.start_measure, region.end_measure);
    } else {
        let end = ctrl.song().measure_count().max(1);
        ctrl.set_loop(true, 0, end);
    }
}

fn print_info(song: &Song) {
    println!("Title:     {}", song.title);
    println!("Format:    {}", song.format);
    println!("Tuning:    {}", song.tuning);
    println!("Tempo:     {:.2} BPM, {} ticks/beat, {}", song.bpm, song.ticks_per_beat, song.time_signature);
    println!("Measures:  {}", song.measure_count());
    if song.loop_region.is_active() {
        println!(
            "Loop:      measures {}..{}",
            song.loop_region.start_measure, song.loop_region.end_measure
        );
    }
    println!("Notes:     {}", song.notes.len());
    for track in &song.tracks {
        let count = song.notes.iter().filter(|n| n.track == track.index).count();
        println!("  {:<10} {:>6} notes", track.name.as_str(), count);
    }
    if !song.diagnostics.is_empty() {
        println!("Diagnostics ({}):", song.diagnostics.len());
        for d in song.diagnostics.iter() {
            println!("  {}", d);
        }
    }
    println!();
}

fn play(ctrl: &mut Controller, from: Option<u32>) -> Result<()> {
    ctrl.play(from).context("failed to start audio output")?;
    println!("Playing...");

    while ctrl.is_playing() {
        for event in ctrl.poll_events() {
            if let PlaybackEvent::MeasureChange { measure } = event {
                print!("\rMeasure: {:>4}", measure);
                let _ = std::io::stdout().flush();
            }
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.stop();
    println!("\rDone.          ");
    Ok(())
}
