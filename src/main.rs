use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use watermark_compositor::{BatchEvent, BatchPipeline, Config, Logo, Position, VideoCompositor};

#[derive(Parser)]
#[command(
    name = "watermark",
    version,
    about = "Stamp a logo onto batches of images and videos",
    long_about = "Watermark scales a logo to a fraction of each image or video frame, places it at one of six anchor positions and blends it with the chosen opacity. Folders are searched recursively and results never overwrite existing files."
)]
struct Cli {
    /// Files and folders to watermark
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Logo image (PNG, JPEG or WebP)
    #[arg(short, long)]
    logo: PathBuf,

    /// Output folder (created if missing)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest fraction of the target the logo may cover (0.0-1.0]
    #[arg(long)]
    scale: Option<f64>,

    /// Logo opacity (0.0-1.0)
    #[arg(long)]
    opacity: Option<f64>,

    /// Anchor: center_top, center_bottom, top_left, top_right, bottom_left, bottom_right
    #[arg(short, long)]
    position: Option<Position>,

    /// Horizontal margin in pixels
    #[arg(long)]
    offset_x: Option<u32>,

    /// Vertical margin in pixels
    #[arg(long)]
    offset_y: Option<u32>,

    /// Write the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Write log lines to this file instead of the terminal
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags win over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.output.directory = output.clone();
        }
        if let Some(scale) = self.scale {
            config.watermark.scale = scale;
        }
        if let Some(opacity) = self.opacity {
            config.watermark.opacity = opacity;
        }
        if let Some(position) = self.position {
            config.watermark.position = position;
        }
        if let Some(offset_x) = self.offset_x {
            config.watermark.offset_x = offset_x;
        }
        if let Some(offset_y) = self.offset_y {
            config.watermark.offset_y = offset_y;
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("cannot create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting watermark v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path).map_err(|e| anyhow!(e.user_message()))?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate().map_err(|e| anyhow!(e.user_message()))?;

    if let Some(path) = &cli.save_config {
        config.save_to_file(path)?;
        info!("Configuration saved to {:?}", path);
    }

    let logo = Logo::load(&cli.logo).map_err(|e| anyhow!(e.user_message()))?;

    if !VideoCompositor::new(config.video.clone()).tools_available() {
        warn!("{} / {} not found, video files will fail", config.video.ffmpeg, config.video.ffprobe);
    }

    let pipeline = BatchPipeline::from_config(&config, Arc::new(logo)).map_err(|e| anyhow!(e.user_message()))?;
    let mut batch = pipeline.spawn(cli.paths.clone());

    let cancel = batch.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            cancel.cancel();
        }
    });

    while let Some(event) = batch.next_event().await {
        match &event {
            BatchEvent::ItemFailed { .. } | BatchEvent::Cancelled { .. } => eprintln!("{}", event),
            _ => println!("{}", event),
        }
    }

    let report = batch.wait().await?;
    println!(
        "{} written, {} failed -> {}",
        report.succeeded.len(),
        report.failed.len(),
        config.output.directory.display()
    );

    if let Some(reason) = &report.aborted {
        return Err(anyhow!("Batch stopped early: {}", reason));
    }
    if !report.failed.is_empty() {
        return Err(anyhow!("{} of {} files failed", report.failed.len(), report.attempted));
    }
    Ok(())
}
