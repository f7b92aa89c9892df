use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use pitchtrack::{Cache, Config, DetectionsFile, Pipeline};

/// Football clip analysis: tracks, camera motion, teams, possession and speed
#[derive(Parser)]
#[command(name = "pitchtrack")]
#[command(version)]
struct Cli {
    /// Directory of frame images (png/jpg), read in file-name order
    #[arg(long, conflicts_with = "video")]
    frames: Option<PathBuf>,

    /// Video file, requires the `video` feature
    #[arg(long)]
    video: Option<PathBuf>,

    /// Detections dump, one `<frame>: [...]` line per frame
    #[arg(long)]
    detections: PathBuf,

    /// TOML configuration, defaults are used for missing sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for cached tracks and camera movement
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Where to write the analysis (JSON)
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    let mut detector = DetectionsFile::open(&cli.detections)
        .with_context(|| format!("loading detections {}", cli.detections.display()))?;

    let frames = match (&cli.frames, &cli.video) {
        (Some(dir), _) => pitchtrack::frame::load_frames(dir)
            .with_context(|| format!("reading frames from {}", dir.display()))?,
        (None, Some(path)) => read_video(path, &mut config)?,
        (None, None) => bail!("either --frames or --video is required"),
    };

    let mut pipeline = Pipeline::new(config);
    if let Some(dir) = &cli.cache_dir {
        pipeline = pipeline.with_cache(Cache::new(dir)?);
    }

    let analysis = pipeline.run(&frames, &mut detector)?;

    let out = std::fs::File::create(&cli.out)
        .with_context(|| format!("creating {}", cli.out.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(out), &analysis)?;

    if let Some((a, b)) = analysis.ball_control.share() {
        info!("ball control: team A {:.1}%, team B {:.1}%", a * 100.0, b * 100.0);
    }
    info!(out = %cli.out.display(), "analysis written");

    Ok(())
}

#[cfg(feature = "video")]
fn read_video(
    path: &std::path::Path,
    config: &mut Config,
) -> anyhow::Result<Vec<image::RgbImage>> {
    let video = pitchtrack::video::read_video(path)
        .with_context(|| format!("decoding {}", path.display()))?;

    if video.frame_rate > 0.0 {
        config.speed.frame_rate = video.frame_rate as f32;
    }

    Ok(video.frames)
}

#[cfg(not(feature = "video"))]
fn read_video(
    path: &std::path::Path,
    _config: &mut Config,
) -> anyhow::Result<Vec<image::RgbImage>> {
    bail!("cannot decode {}: built without the `video` feature", path.display())
}
