//! Divan CLI — play or render the ritual's sounds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;

use divan_engine::nodes::Frame;
use divan_engine::{Engine, EngineConfig, Haptics, LogVibrator, SoundEngine};

#[derive(Parser, Debug)]
#[command(name = "divan")]
#[command(version, about = "Procedural sound for the divination ritual", long_about = None)]
struct Cli {
    /// Output device name (default device when omitted)
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Seed for noise and sparkle pitches
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List audio output devices
    Devices,

    /// Play one piece on the output device
    Play {
        piece: Piece,

        /// Length of the ambient drone
        #[arg(long, default_value_t = 12.0)]
        seconds: f32,
    },

    /// Play the full ritual sequence
    Ritual {
        /// How long the breath is held; under 3000 ms interrupts it
        #[arg(long, default_value_t = 3000)]
        hold_ms: u64,
    },

    /// Render a piece to a WAV file offline
    Render {
        piece: Piece,

        /// Destination WAV file
        #[arg(short, long)]
        out: PathBuf,

        /// Length of the ambient drone
        #[arg(long, default_value_t = 12.0)]
        seconds: f32,

        /// Breath hold for the ritual
        #[arg(long, default_value_t = 3000)]
        hold_ms: u64,

        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Piece {
    Click,
    Chime,
    Reveal,
    Ambient,
    Ritual,
}

/// Where time passes: on the device clock or by rendering offline.
trait Timeline {
    fn engine(&mut self) -> &mut Engine;
    fn wait(&mut self, secs: f32);
}

struct Live(Engine);

impl Timeline for Live {
    fn engine(&mut self) -> &mut Engine {
        &mut self.0
    }

    fn wait(&mut self, secs: f32) {
        std::thread::sleep(Duration::from_secs_f32(secs.max(0.0)));
    }
}

struct Offline {
    engine: Engine,
    frames: Vec<Frame>,
}

impl Timeline for Offline {
    fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }

    fn wait(&mut self, secs: f32) {
        let block = self.engine.context().render_seconds(secs);
        self.frames.extend_from_slice(&block);
    }
}

/// Unlock output without starting the drone, for isolated one-shots.
fn resume_only(t: &mut impl Timeline) -> Result<()> {
    t.engine().context().resume().context("resuming audio")
}

fn perform(t: &mut impl Timeline, piece: Piece, seconds: f32, hold_ms: u64) -> Result<()> {
    match piece {
        Piece::Click => {
            resume_only(t)?;
            t.engine().play_click();
            t.wait(0.4);
        }
        Piece::Chime => {
            resume_only(t)?;
            t.engine().play_completion();
            t.wait(3.3);
        }
        Piece::Reveal => {
            resume_only(t)?;
            t.engine().play_reveal();
            t.wait(10.3);
        }
        Piece::Ambient => {
            t.engine().init();
            t.wait(seconds);
        }
        Piece::Ritual => ritual(t, hold_ms),
    }
    Ok(())
}

/// Welcome, breath, completion, reveal, return.
fn ritual(t: &mut impl Timeline, hold_ms: u64) {
    const STEP_MS: u64 = 50;
    let full_ms = (t.engine().config().breath.duration * 1000.0) as u64;

    t.engine().init();
    t.engine().play_click();
    t.wait(2.0);

    info!("ritual: breath, holding {hold_ms} ms");
    t.engine().start_breath();
    let hold = hold_ms.min(full_ms);
    let mut held = 0;
    while held < hold {
        let step = STEP_MS.min(hold - held);
        t.wait(step as f32 / 1000.0);
        held += step;
        t.engine().breath_progress(Duration::from_millis(held));
    }

    if hold_ms < full_ms {
        info!("ritual: breath interrupted");
        t.engine().stop_breath(false);
        t.wait(1.5);
        return;
    }

    t.engine().stop_breath(true);
    t.engine().play_completion();
    t.wait(3.0);

    info!("ritual: reveal");
    t.engine().play_click();
    t.engine().fade_ambient_out(3.0);
    t.wait(0.5);
    t.engine().play_reveal();
    t.wait(9.0);

    info!("ritual: return");
    t.engine().play_click();
    t.engine().fade_ambient_in(2.0);
    t.wait(3.0);
}

fn write_wav(path: &Path, frames: &[Frame], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for [l, r] in frames {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;
    Ok(())
}

fn config(seed: Option<u64>) -> EngineConfig {
    let cfg = EngineConfig::default();
    match seed {
        Some(s) => cfg.with_seed(s),
        None => cfg,
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let haptics = || Haptics::new(LogVibrator);

    match cli.command {
        Commands::Devices => {
            println!("Available output devices:");
            for name in divan_engine::output_device_names()? {
                println!("- {name}");
            }
        }
        Commands::Play { piece, seconds } => {
            let engine = Engine::realtime(config(cli.seed), cli.device.as_deref(), haptics())?;
            let mut live = Live(engine);
            perform(&mut live, piece, seconds, 3000)?;
        }
        Commands::Ritual { hold_ms } => {
            let engine = Engine::realtime(config(cli.seed), cli.device.as_deref(), haptics())?;
            let mut live = Live(engine);
            perform(&mut live, Piece::Ritual, 0.0, hold_ms)?;
        }
        Commands::Render { piece, out, seconds, hold_ms, sample_rate } => {
            let cfg = config(cli.seed).with_sample_rate(sample_rate);
            let mut offline = Offline { engine: Engine::offline(cfg, haptics()), frames: Vec::new() };
            perform(&mut offline, piece, seconds, hold_ms)?;
            write_wav(&out, &offline.frames, sample_rate.max(1))?;
            info!(
                "wrote {} ({:.1} s)",
                out.display(),
                offline.frames.len() as f32 / sample_rate.max(1) as f32
            );
        }
    }
    Ok(())
}
