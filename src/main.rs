use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use seamtrace::{BatchDriver, MaskConfig, SkeletonMethod, SplitReport};

#[derive(Parser)]
#[command(name = "seamtrace")]
#[command(about = "Generate seam-path training masks from photographs of unwelded joints")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Generate masks for every image in each split
    Generate {
        /// Dataset root containing <split>/images/ subfolders
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Dataset splits to process
        #[arg(long, value_delimiter = ',', default_values_t = default_splits())]
        splits: Vec<String>,

        /// Longest image side allowed into the pipeline
        #[arg(long, default_value_t = 1024)]
        max_width: u32,

        /// Canny hysteresis low threshold
        #[arg(long, default_value_t = 50.0)]
        canny_low: f32,

        /// Canny hysteresis high threshold
        #[arg(long, default_value_t = 150.0)]
        canny_high: f32,

        /// Hough accumulator vote threshold
        #[arg(long, default_value_t = 60)]
        vote_threshold: u32,

        /// Minimum segment length as a fraction of min(height, width)
        #[arg(long, default_value_t = 0.15)]
        min_line_frac: f32,

        /// Largest bridged gap between collinear edge runs, in pixels
        #[arg(long, default_value_t = 10)]
        max_line_gap: u32,

        /// Dilation radius applied to the skeleton, in pixels
        #[arg(long, default_value_t = 2)]
        dilate_radius: u32,

        /// Thinning algorithm
        #[arg(long, value_enum, default_value = "zhang-suen")]
        skeleton: SkeletonMethod,

        /// Save per-stage debug images under this directory
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Write a JSON report of per-image results to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Check that every image has a mask paired by file stem
    Check {
        /// Dataset root containing <split>/images/ subfolders
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Dataset splits to check
        #[arg(long, value_delimiter = ',', default_values_t = default_splits())]
        splits: Vec<String>,
    },
}

fn default_splits() -> Vec<String> {
    vec!["train".to_string(), "val".to_string()]
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Generate {
            root,
            splits,
            max_width,
            canny_low,
            canny_high,
            vote_threshold,
            min_line_frac,
            max_line_gap,
            dilate_radius,
            skeleton,
            debug_out,
            report,
        } => {
            let config = MaskConfig {
                max_width,
                canny_low,
                canny_high,
                vote_threshold,
                min_line_frac,
                max_line_gap,
                dilate_radius,
                skeleton_method: skeleton,
                ..MaskConfig::default()
            };
            run_generate(root, &splits, config, debug_out, report)
        }
        Command::Check { root, splits } => run_check(root, &splits),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("seamtrace={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_generate(
    root: PathBuf,
    splits: &[String],
    config: MaskConfig,
    debug_out: Option<PathBuf>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let mut driver = BatchDriver::new(root, config);
    if let Some(dir) = debug_out {
        driver = driver.with_debug_root(dir);
    }

    let mut reports: Vec<SplitReport> = Vec::new();
    for split in splits {
        // A split whose directory is missing or unreadable should not
        // stop the remaining splits.
        match driver.process_split(split) {
            Ok(report) => reports.push(report),
            Err(e) => eprintln!("[{split}] split failed: {e:#}"),
        }
    }

    for report in &reports {
        println!(
            "{}: {} masks generated, {} failed",
            report.split,
            report.succeeded(),
            report.failed()
        );
        for record in report.records.iter().filter(|r| !r.succeeded()) {
            println!(
                "  [FAIL] {} ({})",
                record.image,
                record.detail.as_deref().unwrap_or("unknown")
            );
        }
    }

    if let Some(path) = report_path {
        serde_json::to_writer_pretty(File::create(&path)?, &reports)?;
        println!("report written to {}", path.display());
    }

    Ok(())
}

fn run_check(root: PathBuf, splits: &[String]) -> Result<()> {
    let driver = BatchDriver::new(root, MaskConfig::default());

    let mut incomplete = false;
    for split in splits {
        let report = driver.check_split(split)?;
        if report.is_complete() {
            println!(
                "{}: all {} images have masks",
                report.split, report.total_images
            );
        } else {
            incomplete = true;
            println!(
                "{}: {} of {} images have no mask:",
                report.split,
                report.missing_masks.len(),
                report.total_images
            );
            for name in &report.missing_masks {
                println!("  - {name}");
            }
        }
    }

    if incomplete {
        anyhow::bail!("some images have no paired mask");
    }
    Ok(())
}
