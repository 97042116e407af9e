use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vidloom::{
    AnimationSpec, ClipBatchOptions, ClipStore, ComposeOptions, FontSpec, Fps, Shake, TextEffect,
    Timeline, VideoFormat, compose, encode_text_clip, render_text_clips,
};

#[derive(Parser, Debug)]
#[command(name = "vidloom", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one animated text clip as an MP4 (requires `ffmpeg` on PATH).
    Text(TextArgs),
    /// Pre-render every text asset of a timeline into the clip store.
    Clips(ClipsArgs),
    /// Composite a timeline over a background and audio track into an MP4.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct TextArgs {
    /// Text to animate.
    text: String,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Animation effect: reveal_by_letter, reveal_by_word, zoom or static.
    #[arg(long, default_value = "reveal_by_letter")]
    effect: String,

    /// Effect phase length in seconds.
    #[arg(long, default_value_t = 0.5)]
    effect_duration: f64,

    /// Hold phase length in seconds.
    #[arg(long, default_value_t = 1.0)]
    hold_duration: f64,

    /// Fadeout phase length in seconds.
    #[arg(long, default_value_t = 0.5)]
    fadeout_duration: f64,

    /// Clip frame rate.
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Text color as "r,g,b"; omit to pick from the palette.
    #[arg(long, value_parser = parse_rgb)]
    font_color: Option<[u8; 3]>,

    /// Background fill as "r,g,b".
    #[arg(long, default_value = "0,0,0", value_parser = parse_rgb)]
    bg_color: [u8; 3],

    /// Output format: "long" (1920x1080) or "short" (1080x1920).
    #[arg(long, default_value = "long")]
    format: String,

    /// Font file (TTF/OTF); defaults to the first system font found.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Font size override in pixels.
    #[arg(long)]
    font_size: Option<u32>,
}

#[derive(Parser, Debug)]
struct ClipsArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Clip store root directory.
    #[arg(long)]
    clip_dir: PathBuf,

    /// Output format: "long" or "short".
    #[arg(long, default_value = "long")]
    format: String,

    /// Animation effect applied to every clip.
    #[arg(long, default_value = "reveal_by_letter")]
    effect: String,

    /// Text color as "r,g,b"; omit to pick per clip from the palette.
    #[arg(long, value_parser = parse_rgb)]
    font_color: Option<[u8; 3]>,

    /// Background fill as "r,g,b".
    #[arg(long, default_value = "0,0,0", value_parser = parse_rgb)]
    bg_color: [u8; 3],

    /// Clip frame rate.
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Font file (TTF/OTF); defaults to the first system font found.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Clip store root directory.
    #[arg(long)]
    clip_dir: PathBuf,

    /// Background still image.
    #[arg(long)]
    background: PathBuf,

    /// Audio track for the final mix.
    #[arg(long)]
    audio: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Output format: "long" or "short".
    #[arg(long, default_value = "long")]
    format: String,

    /// Composite frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Overlay shake amplitude in pixels (0 disables).
    #[arg(long, default_value_t = 3.0)]
    shake_amplitude: f64,
}

fn parse_rgb(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected \"r,g,b\", got {s:?}"));
    }
    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse::<u8>()
            .map_err(|e| format!("bad channel {part:?}: {e}"))?;
    }
    Ok(rgb)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Text(args) => cmd_text(args),
        Command::Clips(args) => cmd_clips(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

fn cmd_text(args: TextArgs) -> anyhow::Result<()> {
    let spec = AnimationSpec {
        effect: TextEffect::parse_flag(&args.effect)?,
        effect_duration_s: args.effect_duration,
        hold_duration_s: args.hold_duration,
        fadeout_duration_s: args.fadeout_duration,
        fps: Fps::whole(args.fps)?,
        font_color: args.font_color,
        bg_color: args.bg_color,
        font: args.font.map(FontSpec::File).unwrap_or_default(),
        font_size: args.font_size,
        ..AnimationSpec::default()
    };
    let format = VideoFormat::parse_flag(&args.format)?;

    let out = encode_text_clip(&args.text, &spec, format, &args.out)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_clips(args: ClipsArgs) -> anyhow::Result<()> {
    let timeline = Timeline::from_path(&args.in_path)?;
    let store = ClipStore::new(&args.clip_dir);
    let opts = ClipBatchOptions {
        format: VideoFormat::parse_flag(&args.format)?,
        effect: TextEffect::parse_flag(&args.effect)?,
        font: args.font.map(FontSpec::File).unwrap_or_default(),
        font_color: args.font_color,
        bg_color: args.bg_color,
        fps: Fps::whole(args.fps)?,
    };

    let cancel = AtomicBool::new(false);
    let report = render_text_clips(&timeline, &opts, &store, &cancel)?;
    eprintln!(
        "rendered {} clip(s) into {} ({} skipped)",
        report.rendered,
        store.root().display(),
        report.skipped
    );
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let timeline = Timeline::from_path(&args.in_path)?;
    let store = ClipStore::new(&args.clip_dir);
    let opts = ComposeOptions {
        format: VideoFormat::parse_flag(&args.format)?,
        fps: Fps::whole(args.fps)?,
        shake: Shake {
            amplitude_px: args.shake_amplitude,
            ..Shake::default()
        },
        ..ComposeOptions::default()
    };

    let out = compose(
        &timeline,
        &store,
        &args.background,
        &args.audio,
        &args.out,
        &opts,
    )?;
    eprintln!("wrote {}", out.display());
    Ok(())
}
