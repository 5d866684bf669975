use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;

use crate::analysis::boxplot::{ImageFormat, PlotOptions};
use crate::analysis::correction::Correction;
use crate::helper_functions::resolve_path;

/// Pairwise Mann-Whitney tests and box-scatter plots for classifier counts
#[derive(Debug, Clone, Parser)]
#[command(name = "groupwise", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the two input tables
    #[arg(long, default_value = "./input")]
    pub input_dir: PathBuf,

    /// Directory receiving plots, statistics.tsv and run_config.json
    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// Wide classifier count table inside the input directory
    #[arg(long, default_value = "combined_classifier_count.tsv")]
    pub counts_file: String,

    /// Header-less Isolate/Color/Group table inside the input directory
    #[arg(long, default_value = "isolate_colors.tsv")]
    pub isolates_file: String,

    /// Significance threshold
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,

    /// Multiple testing correction across all comparisons
    #[arg(long, value_enum, default_value_t = Correction::None)]
    pub correction: Correction,

    /// Vertical spacing of stacked significance brackets, in Count units
    #[arg(long, default_value_t = 20.0)]
    pub bracket_step: f64,

    /// Plot image format
    #[arg(long, value_enum, default_value_t = ImageFormat::Svg)]
    pub format: ImageFormat,

    #[arg(long, default_value_t = 1600)]
    pub width: u32,

    #[arg(long, default_value_t = 1000)]
    pub height: u32,

    /// Seed for the strip-plot jitter
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Effective settings of one run, also written to `run_config.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub counts_path: PathBuf,
    pub isolates_path: PathBuf,
    pub output_dir: PathBuf,
    pub alpha: f64,
    pub correction: Correction,
    pub plot: PlotOptions,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if !(cli.alpha > 0.0 && cli.alpha < 1.0) {
            bail!("--alpha must lie strictly between 0 and 1, got {}", cli.alpha);
        }
        if !(cli.bracket_step.is_finite() && cli.bracket_step > 0.0) {
            bail!("--bracket-step must be positive, got {}", cli.bracket_step);
        }
        if cli.width == 0 || cli.height == 0 {
            bail!("plot dimensions must be non-zero, got {}x{}", cli.width, cli.height);
        }

        let input_dir = resolve_path(&cli.input_dir);
        Ok(RunConfig {
            counts_path: input_dir.join(&cli.counts_file),
            isolates_path: input_dir.join(&cli.isolates_file),
            output_dir: resolve_path(&cli.output_dir),
            alpha: cli.alpha,
            correction: cli.correction,
            plot: PlotOptions {
                width: cli.width,
                height: cli.height,
                bracket_step: cli.bracket_step,
                seed: cli.seed,
                format: cli.format,
            },
        })
    }
}
