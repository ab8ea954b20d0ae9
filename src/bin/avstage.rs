use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use avstage::{
    Capability, CapabilityRegistry, CapabilitySet, ChannelOrder, Frame, FrameGeometry, RenderOpts,
    SampleChunk, probe_media, render_offline,
};

#[derive(Parser, Debug)]
#[command(name = "avstage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print source media metadata as JSON (requires `ffprobe` on PATH).
    Probe(ProbeArgs),
    /// Render the built-in test pattern to an A/V file (requires `ffmpeg` on
    /// PATH).
    Demo(DemoArgs),
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to probe.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Output file path (container chosen by extension).
    #[arg(long)]
    out: PathBuf,

    /// Render length in seconds.
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Output frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Output width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = true)]
    overwrite: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Probe(args) => cmd_probe(args),
        Command::Demo(args) => cmd_demo(args),
    }
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = probe_media(&args.in_path)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let opts = RenderOpts {
        geometry: FrameGeometry::new(args.width, args.height, ChannelOrder::Rgb)?,
        fps: args.fps,
        duration_secs: args.duration,
        ..RenderOpts::default()
    };

    let registry = CapabilityRegistry::new();
    registry.install_all(demo_set(opts.sample_rate));
    render_offline(&registry, opts, &args.out, args.overwrite)
        .with_context(|| format!("render demo into '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

/// A moving red bar over a dark background, with a two-tone stereo chord.
fn demo_set(sample_rate: u32) -> CapabilitySet {
    let tick = Arc::new(AtomicU64::new(0));
    let video_out = Arc::new(move |frame: &mut Frame| {
        let t = tick.fetch_add(1, Ordering::Relaxed);
        let g = frame.geometry;
        frame.fill([16, 16, 32]);

        let bar_w = (g.width / 8).max(1);
        let span = g.width.saturating_sub(bar_w).max(1);
        let x0 = ((t * 4) % u64::from(span)) as u32;
        for y in g.height / 4..g.height * 3 / 4 {
            for x in x0..x0 + bar_w {
                frame.put_pixel(x, y, [220, 40, 40]);
            }
        }
    });

    let sample_pos = Arc::new(AtomicU64::new(0));
    let audio_out = Arc::new(move |chunk: &mut SampleChunk| {
        let channels = chunk.channels as usize;
        let start = sample_pos.fetch_add(chunk.frames() as u64, Ordering::Relaxed);
        for (i, sample_frame) in chunk.samples.chunks_exact_mut(channels).enumerate() {
            let t = (start + i as u64) as f64 / f64::from(sample_rate);
            let left = (std::f64::consts::TAU * 440.0 * t).sin();
            let right = (std::f64::consts::TAU * 554.37 * t).sin();
            sample_frame[0] = (left * 0.2 * 32767.0) as i16;
            if channels > 1 {
                sample_frame[1] = (right * 0.2 * 32767.0) as i16;
            }
        }
    });

    CapabilitySet::new()
        .with(Capability::VideoOut(video_out))
        .with(Capability::AudioOut(audio_out))
}
