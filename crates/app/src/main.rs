use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use ambient_dashboard_core::{
    channel_surface, AppConfig, DashboardError, FeedProvider, Frame, FrameTime,
    LocationFeedSource, RenderLoop, StageParts, SurfaceHandle, Viewport,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Interval between scripted clicks in headless runs.
const CLICK_INTERVAL_MS: u64 = 2_000;

fn main() -> ambient_dashboard_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            frames,
            rate,
            debug,
            snapshot,
        } => run(config.as_deref(), frames, rate, debug, snapshot.as_deref()),
        Commands::DefaultConfig { output } => write_default_config(&output),
    }
}

fn run(
    config_path: Option<&Path>,
    frames: Option<u64>,
    rate: f32,
    debug: bool,
    snapshot: Option<&Path>,
) -> ambient_dashboard_core::Result<()> {
    let tick_budget = frame_interval(rate)?;

    let mut config = match config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.debug.enabled |= debug;
    tracing::info!(?config_path, ?frames, rate, debug = config.debug.enabled, "starting dashboard");

    let source = LocationFeedSource::new(config.feeds.clone())?;
    let provider = FeedProvider::new(source, &config.feeds, config.debug.clone());
    let parts = StageParts::from_config(&config)?;
    let mut stage = RenderLoop::new(parts, provider, &config.surface);

    let logical = Viewport::new(config.surface.logical_width, config.surface.logical_height);
    let (handle, mut surface) = channel_surface(logical);

    let origin = Instant::now();
    let mut last_frame: Option<Frame> = None;
    let mut next_click = CLICK_INTERVAL_MS;
    let mut index = 0_u64;

    while frames.map_or(true, |limit| index < limit) {
        let started = Instant::now();
        let time = FrameTime::since(origin);
        let click = time.millis >= next_click;
        if click {
            next_click = time.millis + CLICK_INTERVAL_MS;
        }
        script_pointer(&handle, logical, time.millis, click);

        if let Some(frame) = stage.tick(time, &mut surface) {
            last_frame = Some(frame);
        }
        if index > 0 && stage.clock().frame_count() == 0 {
            tracing::info!(fps = stage.fps(), frame = index, "frame rate");
        }

        index += 1;
        thread::sleep(tick_budget.saturating_sub(started.elapsed()));
    }

    if let Some(path) = snapshot {
        match &last_frame {
            Some(frame) => {
                std::fs::write(path, serde_json::to_vec_pretty(frame)?)?;
                tracing::info!(?path, calls = frame.calls.len(), "wrote frame snapshot");
            }
            None => tracing::warn!(?path, "no frame rendered, snapshot skipped"),
        }
    }
    Ok(())
}

/// Sleep budget of one tick at `rate` Hz.
fn frame_interval(rate: f32) -> ambient_dashboard_core::Result<Duration> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(DashboardError::InvalidConfig(format!(
            "frame rate must be positive, got {rate}"
        )));
    }
    Duration::try_from_secs_f32(1.0 / rate).map_err(|err| {
        DashboardError::InvalidConfig(format!("frame rate {rate} is out of range: {err}"))
    })
}

/// Moves the pointer around a circle, optionally clicking where it lands.
fn script_pointer(handle: &SurfaceHandle, viewport: Viewport, millis: u64, click: bool) {
    let angle = millis as f32 / 1_000.0;
    let radius = viewport.height / 4.0;
    let x = viewport.width / 2.0 + radius * angle.cos();
    let y = viewport.height / 2.0 + radius * angle.sin();

    handle.move_pointer(x, y);
    if click {
        handle.press(x, y);
    }
}

fn write_default_config(output: &Path) -> ambient_dashboard_core::Result<()> {
    let json = serde_json::to_string_pretty(&AppConfig::default())?;
    std::fs::write(output, json)?;
    tracing::info!(?output, "wrote default configuration");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ambient dashboard render loop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the render loop headless with a scripted pointer.
    Run {
        /// JSON configuration file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Stop after this many ticks instead of running forever.
        #[arg(short, long)]
        frames: Option<u64>,
        /// Target tick rate in Hz.
        #[arg(short, long, default_value_t = 60.0)]
        rate: f32,
        /// Force the demo lesson weekday and warning icons.
        #[arg(long)]
        debug: bool,
        /// Write the last rendered frame as JSON to this path.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Write the default configuration as JSON.
    DefaultConfig {
        /// Destination of the configuration file.
        output: PathBuf,
    },
}
