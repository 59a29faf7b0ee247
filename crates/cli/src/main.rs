//! fpcfilter: crop, thin, clean and smooth PLY point clouds.
//!
//! # Logging
//!
//! `-v` enables info output from the pipeline, `-vv` debug output, `-vvv`
//! everything. `RUST_LOG` takes precedence when set, for example
//! `RUST_LOG=fpcfilter_filters=debug`.
//!
//! # Example
//!
//! ```bash
//! fpcfilter dense.ply clean.ply -b site.geojson -r 0.05 -s 2.5 -m 16 --stats stats.json
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fpcfilter_filters::SampleMode;
use fpcfilter_io::read_boundary;
use fpcfilter_pipeline::{
    run_pipeline, OutlierParams, PipelineConfig, SmoothMethod, SmoothParams, DEFAULT_BIN_SCALE,
    DEFAULT_MEAN_K,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fast point cloud filtering: crop to a boundary, enforce a minimum point
/// spacing, remove statistical outliers and smooth.
#[derive(Debug, Parser)]
#[command(name = "fpcfilter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input PLY file
    input: PathBuf,

    /// Output PLY file
    output: PathBuf,

    /// GeoJSON file whose first polygon crops the cloud
    #[arg(short, long)]
    boundary: Option<PathBuf>,

    /// Standard deviation multiplier for outlier removal (enables the filter)
    #[arg(short, long)]
    std: Option<f64>,

    /// Number of neighbours used by outlier removal
    #[arg(short = 'm', long = "meank", default_value_t = DEFAULT_MEAN_K)]
    mean_k: usize,

    /// Minimum distance between points after sampling (0 disables sampling)
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    radius: f64,

    /// Neighbourhood radius for smoothing (enables smoothing)
    #[arg(long)]
    smooth_radius: Option<f64>,

    /// Smooth along point normals instead of in elevation
    #[arg(long)]
    surface_smooth: bool,

    /// Tangential bin radius for surface smoothing, relative to the smoothing radius
    #[arg(long, default_value_t = DEFAULT_BIN_SCALE)]
    bin_scale: f64,

    /// Worker threads (0 uses every logical CPU)
    #[arg(short, long, default_value_t = 0)]
    concurrency: usize,

    /// Sample in a single thread so the output is reproducible
    #[arg(long)]
    deterministic: bool,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Result<PipelineConfig> {
        let boundary = match &self.boundary {
            Some(path) => Some(
                read_boundary(path)
                    .with_context(|| format!("failed to load boundary from {}", path.display()))?,
            ),
            None => None,
        };

        let smooth = self.smooth_radius.map(|radius| SmoothParams {
            radius,
            method: if self.surface_smooth {
                SmoothMethod::Surface
            } else {
                SmoothMethod::Elevation
            },
            bin_scale: self.bin_scale,
        });

        let sample_mode = if self.deterministic || self.concurrency == 1 {
            SampleMode::Sequential
        } else {
            SampleMode::Parallel
        };

        Ok(PipelineConfig {
            boundary,
            sample_radius: (self.radius != 0.0).then_some(self.radius),
            outlier: self.std.map(|std_multiplier| OutlierParams {
                std_multiplier,
                mean_k: self.mean_k,
            }),
            smooth,
            sample_mode,
        })
    }
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "fpcfilter=info,fpcfilter_io=info,fpcfilter_filters=info,fpcfilter_pipeline=info",
            2 => "fpcfilter=debug,fpcfilter_io=debug,fpcfilter_filters=debug,fpcfilter_pipeline=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(?cli, "parsed arguments");

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.concurrency)
        .build_global()
        .context("failed to start worker threads")?;
    info!(threads = rayon::current_num_threads(), "worker pool ready");

    let config = cli.config()?;
    config.validate().context("invalid arguments")?;

    let stats = run_pipeline(&cli.input, &cli.output, &config).with_context(|| {
        format!(
            "failed to filter {} into {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    if let Some(path) = &cli.stats {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &stats)
            .with_context(|| format!("failed to write statistics to {}", path.display()))?;
        info!(path = %path.display(), "wrote statistics");
    }

    Ok(())
}
