use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use facetrack_core::models::verify_artifact;
use facetrack_core::ModelKind;
use facetrack_hw::{CaptureConstraints, CaptureHandle, Frame, V4lCamera};
use facetrack_session::store::{load_projection, save_projection};
use facetrack_session::{ClipGallery, ClipId, Config, SqliteStore};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "facetrack", about = "FaceTrack live face-tracking recorder")]
struct Cli {
    /// TOML config file; FACETRACK_* environment variables still apply
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that all four model artifacts are present and complete
    Models {
        /// Model directory (defaults to the configured one)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Devices,
    /// Open the camera, grab frames and report what was negotiated
    Probe {
        /// Device path (defaults to the configured one)
        #[arg(long)]
        device: Option<String>,
        /// Number of frames to sample
        #[arg(long, default_value_t = 10)]
        frames: usize,
        /// Write the last sampled frame as PNG
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Inspect or edit the persisted clip gallery
    Gallery {
        #[command(subcommand)]
        command: GalleryCommand,
    },
    /// Print the resolved configuration
    Config,
}

#[derive(Subcommand)]
enum GalleryCommand {
    /// List clip metadata in recording order
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove one clip by id
    Delete { id: ClipId },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Models { dir } => {
            check_models(dir.as_deref().unwrap_or(config.model_dir.as_path()))
        }
        Commands::Devices => {
            list_devices();
            Ok(())
        }
        Commands::Probe {
            device,
            frames,
            save,
        } => {
            let device = device.unwrap_or_else(|| config.camera_device.clone());
            probe(&device, frames, config.detect_interval(), save.as_deref()).await
        }
        Commands::Gallery { command } => match command {
            GalleryCommand::List { json } => gallery_list(&config.store_path, json),
            GalleryCommand::Delete { id } => gallery_delete(&config.store_path, id),
        },
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn check_models(dir: &Path) -> Result<()> {
    println!("Model directory: {}", dir.display());
    let mut failed = 0;
    for kind in ModelKind::ALL {
        match verify_artifact(kind, dir) {
            Ok(bytes) => println!("  ok      {:<28} {bytes} bytes", kind.stem()),
            Err(e) => {
                failed += 1;
                println!("  FAILED  {:<28} {e}", kind.stem());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} model artifacts unusable", ModelKind::ALL.len());
    }
    println!("All models present.");
    Ok(())
}

fn list_devices() {
    let devices = V4lCamera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for dev in devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
}

/// Sample frames at the detection cadence, as the session would see them.
async fn probe(
    device: &str,
    frames: usize,
    interval: Duration,
    save: Option<&Path>,
) -> Result<()> {
    let camera = V4lCamera::new(device);
    let constraints = CaptureConstraints::default();
    let handle = CaptureHandle::acquire(&camera, &constraints)
        .await
        .with_context(|| format!("opening {device}"))?;

    let settings = handle.stream().settings();
    println!(
        "{device}: {}x{} (requested {}x{}), audio: {}",
        settings.width,
        settings.height,
        constraints.ideal_width,
        constraints.ideal_height,
        if settings.has_audio { "yes" } else { "no" }
    );

    let mut last: Option<Frame> = None;
    let mut seen = 0;
    let mut ticker = tokio::time::interval(interval);
    for _ in 0..frames.max(1) * 5 {
        ticker.tick().await;
        if !handle.is_live() {
            bail!("stream stopped while probing");
        }
        let Some(frame) = handle.stream().latest_frame() else {
            continue;
        };
        if last.as_ref().is_some_and(|prev| prev.sequence == frame.sequence) {
            continue;
        }
        println!(
            "  frame {:>4}  brightness {:>6.1}",
            frame.sequence,
            frame.avg_brightness()
        );
        last = Some(frame);
        seen += 1;
        if seen >= frames {
            break;
        }
    }
    handle.release();

    let Some(frame) = last else {
        bail!("no frames received from {device}");
    };
    if let Some(path) = save {
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.data)
            .context("frame buffer does not match its dimensions")?;
        image
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Saved frame to {}", path.display());
    }
    Ok(())
}

fn gallery_list(store_path: &Path, json: bool) -> Result<()> {
    let store = SqliteStore::open(store_path)
        .with_context(|| format!("opening {}", store_path.display()))?;
    let entries = load_projection(&store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No recordings");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:<15} {}  {}",
            entry.id.0,
            entry.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            entry.display_name
        );
    }
    Ok(())
}

fn gallery_delete(store_path: &Path, id: ClipId) -> Result<()> {
    let store = SqliteStore::open(store_path)
        .with_context(|| format!("opening {}", store_path.display()))?;
    let mut gallery = ClipGallery::from_projection(load_projection(&store)?);

    let Some(removed) = gallery.remove(id) else {
        bail!("no clip with id {id}");
    };
    save_projection(&store, &gallery.projection())?;
    tracing::info!(%id, "clip deleted");
    println!("Deleted {} ({})", removed.display_name, removed.id);
    Ok(())
}
