use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flicker_core::config::ProcessingConfig;
use flicker_core::enhance::enhance;
use flicker_core::io::{load_image, save_image};

use super::EnhancementArg;

#[derive(Args)]
pub struct EnhanceArgs {
    /// Input image file (TIFF or PNG)
    pub file: PathBuf,

    /// Enhancement mode
    #[arg(long, value_enum, default_value = "percentile")]
    pub mode: EnhancementArg,

    /// Percentile clip bounds: "low,high" (e.g. "1,99")
    #[arg(long, default_value = "1,99")]
    pub percentiles: String,

    /// Adaptive equalization clip limit
    #[arg(long, default_value = "0.03")]
    pub clip_limit: f32,

    /// Output file path
    #[arg(short, long, default_value = "enhanced.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &EnhanceArgs) -> Result<()> {
    let frame = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    println!("Loaded {}x{} image", frame.width(), frame.height());

    let mut config = ProcessingConfig {
        enhancement: args.mode.into(),
        ..Default::default()
    };
    let (low, high) = parse_percentiles(&args.percentiles)?;
    config.set_percentiles(low, high)?;
    config.set_clip_limit(args.clip_limit)?;

    println!("Applying {}", config.enhancement);
    let enhanced = enhance(&frame.data, &config, frame.bit_depth);

    save_image(&enhanced, frame.bit_depth, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved to {}", args.output.display());

    Ok(())
}

fn parse_percentiles(s: &str) -> Result<(f32, f32)> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .context("Invalid percentile format (expected 'low,high')")?;
    if parts.len() != 2 {
        anyhow::bail!("Percentiles require exactly 2 values: low,high");
    }
    Ok((parts[0], parts[1]))
}
