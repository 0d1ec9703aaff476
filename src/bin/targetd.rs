//! targetd - target tracking daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera source
//! 2. Segments the target color range and matches contour shapes against
//!    a reference template
//! 3. Publishes target coordinates to the shared tuning/telemetry store
//! 4. Streams the annotated video as MJPEG to any number of TCP clients
//! 5. Offers a console REPL for live threshold and camera tuning

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use target_vision::{
    repl, CameraControl, CameraSource, DetectionPipeline, FrameBuffer, StreamServer,
    TargetTemplate, TargetdConfig, TuningStore,
};

#[derive(Debug, Parser)]
#[command(name = "targetd", version, about = "Real-time target tracking daemon")]
struct Args {
    /// Camera device: stub://<name>, an image path, or /dev/videoN
    #[arg(long)]
    device: Option<String>,

    /// TCP port for the MJPEG stream
    #[arg(long)]
    port: Option<u16>,

    /// Reference image the target template is extracted from
    #[arg(long)]
    template: Option<PathBuf>,

    /// Directory for one-shot frame captures
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Run headless, without the interactive tuning console
    #[arg(long)]
    no_repl: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    print_banner();

    let mut cfg = TargetdConfig::load()?;
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(port) = args.port {
        cfg.stream_port = port;
    }
    if let Some(template) = args.template {
        cfg.template_path = template;
    }
    if let Some(capture_dir) = args.capture_dir {
        cfg.capture_dir = capture_dir;
    }
    cfg.validate()?;

    let store = TuningStore::new();
    store.announce_version(env!("CARGO_PKG_VERSION"), env!("CARGO_PKG_AUTHORS"));

    // The template is the one startup-time hard failure: without a shape
    // baseline every cycle would be meaningless.
    let template = TargetTemplate::load(&cfg.template_path, &store.threshold_snapshot())?;
    log::info!("target template loaded from {}", cfg.template_path.display());

    let mut source = CameraSource::open(&cfg.device)?;
    source.configure(cfg.width, cfg.height)?;
    log::info!(
        "camera source {} configured for {}x{}",
        cfg.device,
        cfg.width,
        cfg.height
    );

    let camera = CameraControl::new();
    camera.set_manual_exposure();

    let frames = FrameBuffer::new();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)) {
            log::warn!("failed to install Ctrl+C handler: {err}");
        }
    }

    let pipeline_handle = {
        let store = store.clone();
        let frames = frames.clone();
        let shutdown = shutdown.clone();
        let capture_dir = cfg.capture_dir.clone();
        thread::Builder::new()
            .name("pipeline".into())
            .spawn(move || {
                let mut pipeline =
                    DetectionPipeline::new(source, store, frames, template, camera, capture_dir);
                pipeline.run(&shutdown);
            })
            .context("spawn pipeline thread")?
    };

    {
        let store = store.clone();
        let frames = frames.clone();
        let port = cfg.stream_port;
        let backlog = cfg.stream_backlog;
        thread::Builder::new()
            .name("streamer".into())
            .spawn(move || {
                // An accept-loop failure takes down streaming only; the
                // pipeline keeps publishing regardless.
                if let Err(err) = StreamServer::listen(port, backlog, store, frames) {
                    log::error!("stream server stopped: {err:#}");
                }
            })
            .context("spawn stream server thread")?;
    }

    if !args.no_repl {
        let stdin = io::stdin();
        if let Err(err) = repl::run(&store, stdin.lock(), io::stdout()) {
            log::warn!("tuning console stopped: {err:#}");
        }
    }

    // Console gone (EOF or --no-repl): stay up until Ctrl+C.
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    log::info!("shutting down");
    let _ = pipeline_handle.join();
    Ok(())
}

fn print_banner() {
    println!("targetd - competition robot vision");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Author: {}", env!("CARGO_PKG_AUTHORS"));
    println!();
}
