//! Live detection binary.
//!
//! Samples frames from `FALCON_FRAME_SOURCE` (a camera such as `/dev/video0`
//! or `stub://demo`, an image file, or a directory of images), sends them to
//! the detection service and writes the overlay to `FALCON_OVERLAY_OUT` as
//! it changes.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use falcon_client::DetectionClient;
use falcon_overlay::{FontMeasure, OverlayRenderer, Rasterizer};
use tracing::{debug, error, info, warn};

use falcon_live::logging::init_tracing;
use falcon_live::{
    is_camera_uri, load_accuracy_report, AnnouncementEngine, CameraConfig, CameraSource,
    CommandSpeech, DetectionLoop, DirectorySource, FrameSource, LiveConfig, LiveError, LiveResult,
    LogSpeech, OverlayWriter, SpeechSink, StillImageSource,
};

fn open_source(source: &str, quality: u8) -> LiveResult<Arc<dyn FrameSource>> {
    if is_camera_uri(source) {
        return Ok(Arc::new(CameraSource::open(CameraConfig::from_env(source, quality))?));
    }
    let path = Path::new(source);
    if path.is_dir() {
        Ok(Arc::new(DirectorySource::open(path, quality)?))
    } else if path.is_file() {
        Ok(Arc::new(StillImageSource::open(path, quality)?))
    } else {
        Err(LiveError::config(format!(
            "frame source {} does not exist",
            path.display()
        )))
    }
}

fn speech_backend() -> Option<Arc<dyn SpeechSink>> {
    match std::env::var("FALCON_SPEECH").ok().as_deref() {
        Some("log") => Some(Arc::new(LogSpeech)),
        Some("none") => None,
        _ => match CommandSpeech::detect() {
            Ok(speech) => Some(Arc::new(speech)),
            Err(e) => {
                warn!("{}; announcements will be display-only", e);
                None
            }
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting falcon-live");

    if let Some(addr) = std::env::var("FALCON_METRICS_ADDR")
        .ok()
        .and_then(|s| s.parse::<SocketAddr>().ok())
    {
        falcon_live::metrics::init_metrics(addr).context("failed to start metrics exporter")?;
        info!("Metrics listening on {}", addr);
    }

    let config = LiveConfig::from_env();
    config.validate().context("invalid live configuration")?;
    info!("Live config: {:?}", config);

    let client = DetectionClient::from_env().context("failed to create detection client")?;
    match client.health_check().await {
        Ok(true) => info!(url = %client.config().base_url, "Detection service healthy"),
        Ok(false) => warn!("Detection service reports model not loaded"),
        Err(e) => warn!("Detection service health check failed: {}", e),
    }

    if let Ok(path) = std::env::var("FALCON_ACCURACY_REPORT") {
        if let Err(e) = load_accuracy_report(&path) {
            warn!("Could not load accuracy report {}: {}", path, e);
        }
    }

    let source_path = std::env::var("FALCON_FRAME_SOURCE")
        .context("FALCON_FRAME_SOURCE must name a camera, an image or a directory")?;
    let source = open_source(&source_path, config.jpeg_quality)?;

    let (renderer, rasterizer) = match std::env::var("FALCON_OVERLAY_FONT") {
        Ok(path) => {
            let measure = FontMeasure::from_file(&path)
                .with_context(|| format!("failed to load overlay font {}", path))?;
            let rasterizer = Rasterizer::new(Some(measure.font().clone()));
            (OverlayRenderer::new(Arc::new(measure)), rasterizer)
        }
        Err(_) => (OverlayRenderer::default(), Rasterizer::default()),
    };
    let composite = std::env::var("FALCON_OVERLAY_COMPOSITE")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    let writer = std::env::var("FALCON_OVERLAY_OUT")
        .ok()
        .map(|path| OverlayWriter::new(path, rasterizer).with_background(composite));

    let speech = if config.voice_enabled { speech_backend() } else { None };
    let announcer = AnnouncementEngine::new(config.settle_window, config.voice.clone(), speech);

    let detection_loop = DetectionLoop::new(config, source, Arc::new(client), renderer, announcer)?;
    let mut snapshots = detection_loop.subscribe();
    let mut announcements = detection_loop.announcer().subscribe();
    detection_loop.start();

    let mut last_rendered = 0;
    let mut last_fps = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.fps != last_fps {
                    last_fps = snapshot.fps;
                    info!(fps = snapshot.fps, detections = snapshot.batch.len(), "Live");
                }
                if snapshot.frames_rendered != last_rendered {
                    last_rendered = snapshot.frames_rendered;
                    if let (Some(writer), Some(overlay)) = (&writer, &snapshot.overlay) {
                        if let Err(e) = writer.write(overlay, snapshot.frame.as_ref()) {
                            error!(path = %writer.path().display(), "Failed to write overlay: {}", e);
                        }
                    }
                }
            }
            changed = announcements.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(text) = announcements.borrow_and_update().clone() {
                    info!("Announcement: {}", text);
                }
            }
        }
    }

    detection_loop.stop();
    info!("falcon-live shut down");
    Ok(())
}
