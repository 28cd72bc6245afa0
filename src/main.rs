//! garment_views: generates garment views from a photo and its pose keypoints,
//! uploads them through presigned URLs and records them with the backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use garment_views::config::Config;
use garment_views::error::UploadError;
use garment_views::pose::PrecomputedPose;
use garment_views::upload::{self, HttpStorageApi, ImageSource, SagaState, UploadOptions};
use garment_views::views::{encode_png, synth::estimate_and_synthesize, ViewSet};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "garment_views",
    version = env!("GARMENT_VIEWS_BUILD"),
    about = "Generate and upload garment views"
)]
struct Cli {
    /// Config file (TOML); defaults apply when it does not exist
    #[arg(long, env = "GARMENT_VIEWS_CONFIG", default_value = "garment_views.toml")]
    config: PathBuf,

    /// Backend base URL, overrides [api].base_url
    #[arg(long, env = "GARMENT_VIEWS_API")]
    api_url: Option<String>,

    /// Do not write a log file under logs/
    #[arg(long)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the six views of one photo and upload them
    Single {
        /// Local path or http(s) URL of the photo
        #[arg(long)]
        image: String,
        /// Pose model output (JSON keypoints)
        #[arg(long)]
        keypoints: PathBuf,
        /// Also write every view as <view>.png into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Generate views only, skip upload
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload local files and register direct image URLs as one batch
    Batch {
        /// Local file paths or image URLs
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// List uploaded images
    Images,
    /// List batches and their server-side status
    Batches,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

type LogFile = Option<Arc<Mutex<std::io::BufWriter<std::fs::File>>>>;

fn open_log_file() -> Result<LogFile> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/garment_views_{}.log", ts);
    let file = std::fs::File::create(&path)?;
    eprintln!("Log: {}", path);
    Ok(Some(Arc::new(Mutex::new(std::io::BufWriter::new(file)))))
}

macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        eprintln!("{}", msg);
        if let Some(file) = &$logfile {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{} {}", chrono::Local::now().format("%H:%M:%S%.3f"), msg);
                let _ = f.flush();
            }
        }
    }};
}

fn saga_observer(logfile: &LogFile) -> upload::StateObserver {
    let logfile = logfile.clone();
    Arc::new(move |state: &SagaState| {
        log!(logfile, "[upload] {}", state);
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn load_source_image(api: &HttpStorageApi, image: &str) -> Result<RgbaImage> {
    let decoded = if image.starts_with("http://") || image.starts_with("https://") {
        let bytes = api
            .fetch_bytes(image)
            .await
            .with_context(|| format!("failed to download {image}"))?;
        image::load_from_memory(&bytes).with_context(|| format!("failed to decode {image}"))?
    } else {
        image::open(image).with_context(|| format!("failed to open {image}"))?
    };
    Ok(decoded.to_rgba8())
}

fn write_views(views: &ViewSet, out_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    for (name, image) in views.iter() {
        let path = out_dir.join(name.file_name());
        let png = encode_png(image).with_context(|| format!("failed to encode {name} view"))?;
        std::fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn report_upload_error(logfile: &LogFile, err: &UploadError) {
    if let UploadError::Persist { payload, .. } = err {
        log!(logfile, "[upload] assets are stored but unrecorded; retry persistence with:");
        if let Ok(json) = serde_json::to_string(payload) {
            println!("{}", json);
        }
    } else if err.is_nothing_uploaded() {
        log!(logfile, "[upload] nothing was uploaded");
    }
}

fn parse_batch_source(source: &str) -> Result<ImageSource> {
    if Path::new(source).is_file() {
        return ImageSource::from_path(source);
    }
    Ok(ImageSource::url(source)?)
}

#[allow(clippy::too_many_arguments)]
async fn run_single(
    config: &Config,
    api: &HttpStorageApi,
    options: &UploadOptions,
    cancel: &CancellationToken,
    logfile: &LogFile,
    image: &str,
    keypoints: &Path,
    out_dir: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let source = load_source_image(api, image).await?;
    log!(logfile, "[views] source {}x{}", source.width(), source.height());

    let mut pose = PrecomputedPose::load(keypoints, config.views.min_confidence)?;
    let synthesized =
        estimate_and_synthesize(&mut pose, &source, &config.views.synthesis_options())?;
    for warning in &synthesized.warnings {
        log!(logfile, "[views] warning: {}", warning);
    }
    let names: Vec<_> = synthesized.views.names().iter().map(|n| n.as_str()).collect();
    log!(logfile, "[views] generated: {}", names.join(", "));

    if let Some(dir) = out_dir {
        write_views(&synthesized.views, dir)?;
        log!(logfile, "[views] written to {}", dir.display());
    }
    if dry_run {
        return Ok(());
    }

    match upload::upload_views(api, &synthesized.views, options, cancel).await {
        Ok(record) => {
            log!(logfile, "[upload] recorded {}", record.image_url);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(err) => {
            report_upload_error(logfile, &err);
            Err(err.into())
        }
    }
}

async fn run_batch(
    api: &HttpStorageApi,
    options: &UploadOptions,
    cancel: &CancellationToken,
    logfile: &LogFile,
    sources: &[String],
) -> Result<()> {
    let entries = sources
        .iter()
        .map(|s| parse_batch_source(s))
        .collect::<Result<Vec<_>>>()?;
    log!(logfile, "[batch] {} entries", entries.len());

    match upload::upload_batch(api, entries, options, cancel).await {
        Ok(record) => {
            log!(logfile, "[batch] recorded {} images", record.image_urls.len());
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(err) => {
            report_upload_error(logfile, &err);
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    let logfile: LogFile = if cli.no_log_file { None } else { open_log_file()? };
    log!(logfile, "garment_views {}", env!("GARMENT_VIEWS_BUILD"));
    log!(logfile, "API: {}", config.api.base_url);

    let api = HttpStorageApi::new(&config.api)?;
    let options = config.upload.upload_options().with_observer(saga_observer(&logfile));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_log = logfile.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log!(signal_log, "[input] cancellation requested");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Single {
            image,
            keypoints,
            out_dir,
            dry_run,
        } => {
            run_single(
                &config,
                &api,
                &options,
                &cancel,
                &logfile,
                &image,
                &keypoints,
                out_dir.as_deref(),
                dry_run,
            )
            .await
        }
        Command::Batch { sources } => run_batch(&api, &options, &cancel, &logfile, &sources).await,
        Command::Images => {
            let images = api.list_images().await?;
            println!("{}", serde_json::to_string_pretty(&images)?);
            Ok(())
        }
        Command::Batches => {
            let batches = api.list_batches().await?;
            for batch in &batches {
                let status = batch
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                log!(
                    logfile,
                    "[batch] {} {} {}/{} ({:.0}%)",
                    batch.id,
                    status,
                    batch.processed_images,
                    batch.total_images,
                    batch.progress() * 100.0
                );
            }
            println!("{}", serde_json::to_string_pretty(&batches)?);
            Ok(())
        }
    }
}
