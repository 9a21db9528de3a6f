use std::{error::Error, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use hdrmeter::{
    AnalyzeOptions, HdrAnalyzer, MatrixCoefficients, MediaSource, ProgressCallback, ProgressInfo,
    TransferFunction, check_signaling,
};

const CLI_AFTER_HELP: &str = "Examples:\n  hdrmeter analyze input.mkv --progress\n  hdrmeter analyze input.mp4 --percentile 99.98 --percentile 99 --json\n  hdrmeter analyze untagged.mp4 --assume-transfer pq --assume-matrix bt2020ncl\n  hdrmeter probe input.mkv --json\n  hdrmeter check input.mkv\n  hdrmeter completions zsh > _hdrmeter";

#[derive(Debug, Parser)]
#[command(
    name = "hdrmeter",
    version,
    about = "Measure HDR light levels (MaxCLL, MaxFALL, percentiles) of video streams",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    ffmpeg_log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decode the stream and report aggregate HDR light levels.
    #[command(
        about = "Analyze HDR light levels",
        after_help = "Examples:\n  hdrmeter analyze input.mkv --progress\n  hdrmeter analyze input.mp4 --percentile 99.98 --percentile 50 --json\n  hdrmeter analyze input.mkv --timeline levels.png\n  hdrmeter analyze damaged.mkv --skip-malformed"
    )]
    Analyze {
        /// Input media path or URL.
        input: String,

        /// Percentile to report; repeat for multiple. Defaults to 99.98.
        #[arg(long = "percentile", value_name = "P")]
        percentiles: Vec<f64>,

        /// Assume this transfer function when the stream declares none (pq, hlg).
        #[arg(long)]
        assume_transfer: Option<String>,

        /// Assume these matrix coefficients when the stream declares none
        /// (bt601, bt709, bt2020ncl).
        #[arg(long)]
        assume_matrix: Option<String>,

        /// Count and skip frames that fail to unpack instead of aborting.
        #[arg(long)]
        skip_malformed: bool,

        /// Write a per-frame max/avg/min luminance chart to this PNG path.
        /// Retains per-frame statistics in memory for the whole run.
        #[arg(long, value_name = "PNG")]
        timeline: Option<std::path::PathBuf>,

        /// Output the report as machine-readable JSON (includes the
        /// per-frame timeline when --timeline is set).
        #[arg(long)]
        json: bool,
    },

    /// Print stream metadata including color signaling (alias: info).
    #[command(
        about = "Print stream metadata",
        visible_alias = "info",
        after_help = "Examples:\n  hdrmeter probe input.mkv\n  hdrmeter probe input.mkv --json"
    )]
    Probe {
        /// Input media path or URL.
        input: String,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check whether the stream's HDR signaling is complete enough to analyze.
    #[command(about = "Pre-flight HDR signaling check")]
    Check {
        /// Input media path or URL.
        input: String,
    },

    /// Generate shell completions.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Progress bar adapter for [`ProgressCallback`].
struct BarProgress(ProgressBar);

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total_frames {
            self.0.set_length(total.max(info.frames_done));
        }
        self.0.set_position(info.frames_done);
    }
}

fn make_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} frames ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} frames")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    }
}

fn parse_transfer(value: &str) -> Option<TransferFunction> {
    match value.to_ascii_lowercase().as_str() {
        "pq" | "smpte2084" | "st2084" => Some(TransferFunction::Pq),
        "hlg" | "arib-std-b67" => Some(TransferFunction::Hlg),
        _ => None,
    }
}

fn parse_matrix(value: &str) -> Option<MatrixCoefficients> {
    match value.to_ascii_lowercase().as_str() {
        "bt601" | "bt470bg" | "smpte170m" => Some(MatrixCoefficients::Bt601),
        "bt709" => Some(MatrixCoefficients::Bt709),
        "bt2020ncl" | "bt2020" => Some(MatrixCoefficients::Bt2020Ncl),
        _ => None,
    }
}

fn parse_ffmpeg_log_level(value: &str) -> Option<ffmpeg_next::util::log::Level> {
    use ffmpeg_next::util::log::Level;
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(Level::Quiet),
        "panic" => Some(Level::Panic),
        "fatal" => Some(Level::Fatal),
        "error" => Some(Level::Error),
        "warning" => Some(Level::Warning),
        "info" => Some(Level::Info),
        "verbose" => Some(Level::Verbose),
        "debug" => Some(Level::Debug),
        "trace" => Some(Level::Trace),
        _ => None,
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // FFmpeg's own stderr chatter drowns the report; keep it at errors
    // unless asked otherwise.
    let ffmpeg_level = match &cli.global.ffmpeg_log_level {
        Some(value) => parse_ffmpeg_log_level(value)
            .ok_or_else(|| format!("unsupported --ffmpeg-log-level {value}"))?,
        None => ffmpeg_next::util::log::Level::Error,
    };
    ffmpeg_next::util::log::set_level(ffmpeg_level);

    match cli.command {
        Commands::Analyze {
            input,
            percentiles,
            assume_transfer,
            assume_matrix,
            skip_malformed,
            timeline,
            json,
        } => {
            let mut options = AnalyzeOptions::new()
                .with_skip_malformed(skip_malformed)
                .with_frame_stats(timeline.is_some());

            if !percentiles.is_empty() {
                options = options.with_percentiles(percentiles);
            }
            if let Some(value) = assume_transfer {
                let transfer = parse_transfer(&value)
                    .ok_or_else(|| format!("unsupported --assume-transfer {value} (pq|hlg)"))?;
                options = options.with_assumed_transfer(transfer);
            }
            if let Some(value) = assume_matrix {
                let matrix = parse_matrix(&value).ok_or_else(|| {
                    format!("unsupported --assume-matrix {value} (bt601|bt709|bt2020ncl)")
                })?;
                options = options.with_assumed_matrix(matrix);
            }

            let mut source = MediaSource::open(&input)?;

            let bar = cli.global.progress.then(|| {
                let bar = make_progress_bar(source.info().frame_count);
                options = options
                    .clone()
                    .with_progress(Arc::new(BarProgress(bar.clone())));
                bar
            });

            let report = HdrAnalyzer::with_options(options).analyze_source(&mut source)?;

            if let Some(bar) = bar {
                bar.finish_and_clear();
            }

            if let Some(path) = &timeline {
                hdrmeter::render_timeline(&report.frame_stats, path)?;
                println!("timeline {} to {}", "saved".green().bold(), path.display());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            } else {
                if report.partial {
                    eprintln!("{}", "note: report is partial".yellow());
                }
                print!("{report}");
            }
        }
        Commands::Probe { input, json } => {
            let info = MediaSource::probe(&input)?;
            if json {
                let payload = json!({
                    "codec": info.codec,
                    "width": info.width,
                    "height": info.height,
                    "frames_per_second": info.frames_per_second,
                    "frame_count": info.frame_count,
                    "duration_seconds": info.duration.as_secs_f64(),
                    "pixel_format": info.pixel_format,
                    "bit_depth": info.bit_depth,
                    "transfer": info.transfer_name,
                    "matrix": info.matrix_name,
                    "primaries": info.primaries_name,
                    "range_declared": info.range_declared,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}x{} {} @ {:.2} fps",
                    info.codec.bold(),
                    info.width,
                    info.height,
                    info.pixel_format,
                    info.frames_per_second,
                );
                println!(
                    "transfer={} matrix={} primaries={}",
                    info.transfer_name.as_deref().unwrap_or("undeclared"),
                    info.matrix_name.as_deref().unwrap_or("undeclared"),
                    info.primaries_name.as_deref().unwrap_or("undeclared"),
                );
                if let Some(count) = info.frame_count {
                    println!("~{count} frames over {:.2}s", info.duration.as_secs_f64());
                }
            }
        }
        Commands::Check { input } => {
            let info = MediaSource::probe(&input)?;
            let report = check_signaling(&info);
            print!("{report}");
            if !report.is_analyzable() {
                return Err("stream signaling is incomplete; see errors above".into());
            }
            println!("{}", "signaling ok".green().bold());
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "hdrmeter", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
