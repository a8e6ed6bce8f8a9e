use clap::{Parser, Subcommand};
use indicatif_log_bridge::LogWrapper;
use log::{LevelFilter, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use streamkit::model::Resolution;
use tubemux::config::{Config, PipelineOptions};
use tubemux::progress::Progress;
use tubemux::{Pipeline, PlaylistOutcome, VideoOutcome};

#[derive(Parser, Clone)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Target resolution, e.g. 1080p. Best available when omitted.
    #[arg(long = "resolution", short, global = true)]
    pub resolution: Option<String>,

    #[arg(long = "output-dir", short, global = true)]
    pub output_dir: Option<PathBuf>,

    #[arg(long = "yt-dlp", global = true)]
    pub yt_dlp: Option<PathBuf>,

    #[arg(long = "ffmpeg", global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Fetch video and audio streams at the same time.
    #[arg(long = "parallel-streams", action = clap::ArgAction::SetTrue, global = true)]
    pub parallel_streams: bool,

    /// Timeout in seconds for one yt-dlp or ffmpeg run.
    #[arg(long = "timeout", global = true)]
    pub timeout: Option<u64>,

    #[arg(long = "quiet", short, action = clap::ArgAction::SetTrue, global = true)]
    pub quiet: bool,

    #[arg(
        long = "verbosity",
        short,
        default_value = "info",
        global = true,
        value_parser = clap::builder::PossibleValuesParser::new([
            "info", "debug", "error", "none", "full"
        ])
    )]
    pub verbosity: String,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Download a single video.
    Video { url: String },
    /// Download every video of a playlist.
    Playlist { url: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Cli::parse();

    let progress = if args.quiet {
        Progress::hidden()
    } else {
        Progress::new()
    };
    init_logger(&args.verbosity, &progress)?;

    let config = Config::load();
    let options = merge_options(&args, &config);
    let resolution = Resolution::lenient(args.resolution.as_deref().or(config.resolution.as_deref()));

    let pipeline = Pipeline::with_yt_dlp(options)?.with_progress(progress);
    match pipeline.muxer().check().await {
        Ok(version) => info!("Using {}", version),
        Err(e) => warn!("ffmpeg is not usable, adaptive streams cannot be combined: {}", e),
    }

    let failures = match &args.command {
        Command::Video { url } => {
            let outcome = pipeline.download_video(url, resolution).await;
            print_outcome(&outcome);
            usize::from(!outcome.is_success())
        }
        Command::Playlist { url } => match pipeline.walk_playlist(url, resolution).await? {
            PlaylistOutcome::Empty { title } => {
                println!("Playlist {} has no videos.", title.as_deref().unwrap_or(url));
                0
            }
            PlaylistOutcome::Completed { title, outcomes } => {
                println!("Playlist {}:", title.as_deref().unwrap_or(url));
                outcomes.iter().for_each(print_outcome);
                let failures = outcomes.iter().filter(|o| !o.is_success()).count();
                println!(
                    "{} of {} videos downloaded.",
                    outcomes.len() - failures,
                    outcomes.len()
                );
                failures
            }
        },
    };

    if failures > 0 {
        error!("{} video(s) failed", failures);
        std::process::exit(1);
    }
    Ok(())
}

fn init_logger(
    verbosity: &str,
    progress: &Progress,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = match verbosity {
        "debug" => LevelFilter::Debug,
        "error" => LevelFilter::Error,
        "none" => LevelFilter::Off,
        "full" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    if level == LevelFilter::Trace {
        builder.filter_level(level);
    } else {
        builder
            .filter_level(LevelFilter::Warn.min(level))
            .filter_module("tubemux", level)
            .filter_module("streamkit", level);
    }
    let logger = builder.build();
    let max_level = logger.filter();

    LogWrapper::new(progress.multi().clone(), logger).try_init()?;
    log::set_max_level(max_level);
    Ok(())
}

fn merge_options(args: &Cli, config: &Config) -> PipelineOptions {
    let mut options = PipelineOptions::from_config(config);

    if let Some(output_dir) = &args.output_dir {
        options.output_dir = output_dir.clone();
    }
    if let Some(yt_dlp) = &args.yt_dlp {
        options.yt_dlp = yt_dlp.clone();
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        options.ffmpeg = ffmpeg.clone();
    }
    if args.parallel_streams {
        options.parallel_streams = true;
    }
    if let Some(secs) = args.timeout {
        options.command_timeout = Duration::from_secs(secs);
    }

    options
}

fn print_outcome(outcome: &VideoOutcome) {
    let name = outcome.title.as_deref().unwrap_or(&outcome.video_id);
    match &outcome.result {
        Ok(downloaded) => {
            let note = downloaded
                .degraded
                .as_ref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            println!("  ok      {} -> {}{}", name, downloaded.path.display(), note);
        }
        Err(e) => println!("  failed  {}: {}", name, e),
    }
}
