use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use particle_tree_core::{
    AnalysisProvider, AppConfig, AssetStore, AudioLocator, CachedProvider, FfmpegProvider,
    RasterBackend, Recorder, RecordingSettings, RenderBackend, RenderGraph, SceneClock,
    SceneRuntime, StarfieldSeeding,
};
use tracing_subscriber::EnvFilter;

fn main() -> particle_tree_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.seed_starfield)?;

    match cli.command {
        Commands::Precompute { input, output } => run_precompute(&config, &input, &output),
        Commands::Frame { frame, envelope } => run_frame(config, frame, envelope),
        Commands::Render(args) => run_render(config, args),
    }
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> particle_tree_core::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(seed) = seed {
        config.starfield.seeding = StarfieldSeeding::Seeded { seed };
    }
    Ok(config)
}

fn run_precompute(config: &AppConfig, input: &Path, output: &Path) -> particle_tree_core::Result<()> {
    tracing::info!(?input, ?output, "running precompute pipeline");

    let provider = FfmpegProvider::new(config.audio.clone(), config.clock.fps);
    let envelope = provider.analyse(&AudioLocator::new(input))?;
    envelope.save(output)?;

    tracing::info!(
        frames = envelope.frame_count(),
        peak = envelope.peak(),
        "wrote envelope cache"
    );
    Ok(())
}

/// Prints the state of a single frame, the way a preview scrubber would
/// request it.
fn run_frame(config: AppConfig, frame: u32, envelope: PathBuf) -> particle_tree_core::Result<()> {
    let mut runtime = SceneRuntime::init(config, RenderGraph::new())?;
    runtime.begin_audio(CachedProvider, AudioLocator::new(envelope))?;
    runtime.ready()?;

    let state = runtime.update(frame)?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    runtime.dispose();
    Ok(())
}

fn run_render(mut config: AppConfig, args: RenderArgs) -> particle_tree_core::Result<()> {
    if let Some(scale) = args.scale {
        config.clock.pixel_ratio = scale;
    }
    config.validate()?;

    let clock = SceneClock::from_config(&config.clock);
    let (width, height) = clock.render_size();
    let recorder = Recorder::create(RecordingSettings {
        output_dir: args.output.clone(),
        ..RecordingSettings::default()
    })?;
    let backend = RasterBackend::new(width, height, clock.pixel_ratio, config.render.background)?
        .with_recorder(recorder);

    let start = args.start.unwrap_or(0);
    let end = args.end.unwrap_or(clock.total_frames).min(clock.total_frames);
    let source = audio_source(&args)?;
    let decoder = FfmpegProvider::new(config.audio.clone(), config.clock.fps);

    let mut runtime = SceneRuntime::init(config, backend)?;
    let loaded = match source {
        AudioSource::Cache(locator) => runtime.begin_audio(CachedProvider, locator),
        AudioSource::Decode(locator) => runtime.begin_audio(decoder, locator),
    }
    .and_then(|()| runtime.ready());

    if let Err(err) = loaded {
        tracing::error!(error = %err, "render job canceled");
        runtime.dispose();
        return Err(err);
    }

    tracing::info!(start, end, width, height, "rendering frames");
    let result = render_range(&mut runtime, start..end);
    runtime.dispose();
    result?;

    tracing::info!(output = ?args.output, frames = end.saturating_sub(start), "render finished");
    Ok(())
}

fn render_range<B: RenderBackend>(
    runtime: &mut SceneRuntime<B>,
    frames: std::ops::Range<u32>,
) -> particle_tree_core::Result<()> {
    for frame in frames {
        runtime.update(frame)?;
        if frame % 60 == 0 {
            tracing::info!(frame, "rendered");
        }
    }
    Ok(())
}

enum AudioSource {
    Cache(AudioLocator),
    Decode(AudioLocator),
}

fn audio_source(args: &RenderArgs) -> particle_tree_core::Result<AudioSource> {
    if let Some(envelope) = &args.envelope {
        return Ok(AudioSource::Cache(AudioLocator::new(envelope)));
    }
    let store = AssetStore::new(&args.assets);
    Ok(AudioSource::Decode(store.static_file(&args.audio)?))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive particle tree renderer", long_about = None)]
struct Cli {
    /// JSON configuration file; omitted fields keep their defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Seed the starfield so it is identical across runs.
    #[arg(long, global = true)]
    seed_starfield: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse an audio file ahead of time and persist the envelope.
    Precompute {
        /// Path to the audio file that should be analysed.
        input: PathBuf,
        /// Output path for the generated envelope cache.
        output: PathBuf,
    },
    /// Print the computed state of one frame as JSON.
    Frame {
        frame: u32,
        /// Envelope cache written by `precompute`.
        #[arg(short, long)]
        envelope: PathBuf,
    },
    /// Render a range of frames to a PNG sequence.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Directory static assets are resolved against.
    #[arg(long, default_value = "public")]
    assets: PathBuf,
    /// Audio file name below the asset directory.
    #[arg(long, default_value = "Jingle_Bells_by_Kevin_MacLeod.mp3")]
    audio: String,
    /// Use a precomputed envelope instead of decoding audio.
    #[arg(short, long)]
    envelope: Option<PathBuf>,
    /// Output directory for the frames.
    #[arg(short, long, default_value = "frames")]
    output: PathBuf,
    /// First frame to render.
    #[arg(long)]
    start: Option<u32>,
    /// End of the range (exclusive); defaults to the composition length.
    #[arg(long)]
    end: Option<u32>,
    /// Pixel density override.
    #[arg(long)]
    scale: Option<f32>,
}
