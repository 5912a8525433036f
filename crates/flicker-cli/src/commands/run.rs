use std::path::PathBuf;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use flicker_core::camera::sim::{SimulatedCamera, SimulatedCameraConfig};
use flicker_core::config::{AcquisitionMode, SessionConfig};
use flicker_core::events::PipelineEvent;
use flicker_core::io::save_image;
use flicker_core::pipeline::Pipeline;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use super::EnhancementArg;
use crate::summary::{print_run_report, print_session_summary, RunReport};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Single,
    Difference,
}

impl From<ModeArg> for AcquisitionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Single => Self::Single,
            ModeArg::Difference => Self::Difference,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Session config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Acquisition mode (overrides config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Enhancement mode (overrides config)
    #[arg(long, value_enum)]
    pub enhance: Option<EnhancementArg>,

    /// Rolling average depth, 0 disables (overrides config)
    #[arg(long)]
    pub averaging: Option<usize>,

    /// Exposure time in seconds (overrides config)
    #[arg(long)]
    pub exposure: Option<f64>,

    /// Hardware binning: 1, 2 or 4 (overrides config)
    #[arg(long)]
    pub binning: Option<u32>,

    /// Capture a background from this many frames before starting
    #[arg(long)]
    pub background: Option<usize>,

    /// How long to acquire, in seconds
    #[arg(long, default_value = "5")]
    pub duration: f64,

    /// Simulated sensor size: "width,height"
    #[arg(long, default_value = "512,512")]
    pub sensor: String,

    /// Random seed for the simulated camera
    #[arg(long, default_value = "24301")]
    pub seed: u64,

    /// Save the last processed frame to this path
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let (width, height) = parse_sensor(&args.sensor)?;

    let camera = SimulatedCamera::connect(SimulatedCameraConfig {
        detector_size: (height, width),
        bit_depth: config.acquisition.bit_depth,
        seed: args.seed,
        ..Default::default()
    })
    .context("Failed to connect simulated camera")?;

    print_session_summary(&config, "simulated");

    let (mut pipeline, events) =
        Pipeline::new(camera, &config).context("Failed to set up acquisition pipeline")?;

    if let Some(n) = args.background {
        pipeline
            .capture_background(n)
            .with_context(|| format!("Failed to capture background from {n} frames"))?;
        pipeline.set_subtract_background(true)?;
        println!("  Background captured from {n} frames");
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    pipeline.start(config.acquisition.mode)?;
    let started = Instant::now();
    let deadline = started + Duration::from_secs_f64(args.duration.max(0.0));
    let mut frames = 0u64;

    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(PipelineEvent::FrameProcessed(frame)) => {
                frames += 1;
                pb.set_message(format!(
                    "frame {:>6}  mean {:>9.1}",
                    frame.index, frame.measurements.mean_intensity
                ));
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    pipeline.pause();
    let elapsed = started.elapsed();
    info!(frames, elapsed_ms = elapsed.as_millis() as u64, "Acquisition finished");
    pb.finish_and_clear();

    let (processed, dropped) = pipeline.counts();
    let latest = pipeline.latest_processed();
    print_run_report(&RunReport {
        elapsed,
        received: frames,
        processed,
        dropped,
        history: pipeline.intensity_history(),
        latest: latest.as_deref(),
    });

    if let Some(ref path) = args.save {
        let frame = latest.context("No frame was processed, nothing to save")?;
        save_image(&frame.enhanced, frame.bit_depth, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nLast frame saved to {}", path.display());
    }

    pipeline.close();
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<SessionConfig> {
    let mut config: SessionConfig = if let Some(ref path) = args.config {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).context("Invalid session config")?
    } else {
        SessionConfig::default()
    };

    if let Some(mode) = args.mode {
        config.acquisition.mode = mode.into();
    }
    if let Some(enhance) = args.enhance {
        config.processing.enhancement = enhance.into();
    }
    if let Some(depth) = args.averaging {
        config.processing.averaging = depth;
    }
    if let Some(exposure) = args.exposure {
        config.acquisition.exposure_time = exposure;
    }
    if let Some(binning) = args.binning {
        config.acquisition.binning = binning;
    }
    config.validate().context("Invalid session config")?;
    debug!(?config, "Session config loaded");
    Ok(config)
}

fn parse_sensor(s: &str) -> Result<(usize, usize)> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .context("Invalid sensor format (expected 'width,height')")?;
    if parts.len() != 2 {
        anyhow::bail!("Sensor size requires exactly 2 values: width,height");
    }
    Ok((parts[0], parts[1]))
}
