//! The live detection loop.
//!
//! Two timers drive a session: a capture tick that samples a frame and
//! fires a detection request without waiting for it, and a measurement
//! tick that publishes frames-per-second. Responses land whenever they
//! land. A response is applied only if its session is still the running
//! one, so nothing changes after `stop` or once a newer session started.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use falcon_client::{Detector, TransportError, TransportResult};
use falcon_models::{DetectionBatch, DetectionHistory, DetectionSummary, Frame, HistoryEntry};
use falcon_overlay::{Overlay, OverlayRenderer};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::announce::AnnouncementEngine;
use crate::config::{LiveConfig, ResponseOrdering};
use crate::error::LiveResult;
use crate::fps::FpsMeter;
use crate::frame_source::FrameSource;
use crate::logging::{FailureTracker, SessionLogger};
use crate::metrics;
use crate::task::RepeatingTask;

/// Consecutive detection failures logged before going quiet.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Measurement ticks trail capture ticks by this much, so a capture due at
/// the same instant is counted in the window it closes.
const MEASURE_LAG: Duration = Duration::from_millis(1);

/// Mutable session bookkeeping, guarded by one lock.
#[derive(Debug, Clone, Default)]
pub struct LoopSession {
    pub running: bool,
    /// Incremented on every start; responses carry the epoch they were issued in.
    pub epoch: u64,
    /// Sequence number of the last request sent this session
    pub issued: u64,
    /// Highest sequence number applied this session
    pub applied: u64,
    pub meter: FpsMeter,
}

impl LoopSession {
    fn is_current(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }
}

/// Everything a display needs, published on every change.
#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot {
    pub running: bool,
    pub session: u64,
    pub fps: u32,
    pub batch: DetectionBatch,
    pub summary: DetectionSummary,
    /// Display list of the last applied batch; `None` before the first one.
    pub overlay: Option<Overlay>,
    /// Frame the overlay was rendered for.
    pub frame: Option<Frame>,
    pub frames_rendered: u64,
    pub stats: Option<serde_json::Value>,
    pub last_error: Option<String>,
}

struct Shared {
    config: LiveConfig,
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn Detector>,
    renderer: OverlayRenderer,
    announcer: AnnouncementEngine,
    session: Mutex<LoopSession>,
    history: Mutex<DetectionHistory>,
    failures: Mutex<FailureTracker>,
    snapshot: watch::Sender<LiveSnapshot>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn failure_kind(e: &TransportError) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_service_unavailable() {
        "unavailable"
    } else {
        match e {
            TransportError::Status { .. } => "status",
            TransportError::InvalidResponse(_) | TransportError::Json(_) => "invalid_response",
            _ => "network",
        }
    }
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, LoopSession> {
        lock(&self.session)
    }

    fn capture_tick(self: &Arc<Self>) {
        if !self.session().running {
            return;
        }

        let frame = match self.source.capture() {
            Ok(frame) => frame,
            Err(e) if e.is_unavailable() => {
                trace!("Frame source not ready, skipping tick");
                return;
            }
            Err(e) => {
                debug!("Frame capture failed, skipping tick: {}", e);
                return;
            }
        };

        let (epoch, seq) = {
            let mut session = self.session();
            if !session.running {
                return;
            }
            session.meter.record_frame();
            session.issued += 1;
            (session.epoch, session.issued)
        };
        metrics::record_frame_captured();

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = shared.detector.detect(&frame).await;
            shared.on_response(epoch, seq, &frame, result);
        });
    }

    fn measure_tick(&self) {
        let fps = {
            let mut session = self.session();
            if !session.running {
                return;
            }
            let fps = session.meter.measure();
            self.snapshot.send_if_modified(|s| {
                let changed = s.fps != fps;
                s.fps = fps;
                changed
            });
            fps
        };
        metrics::set_fps(fps);
    }

    fn on_response(
        self: &Arc<Self>,
        epoch: u64,
        seq: u64,
        frame: &Frame,
        result: TransportResult<DetectionBatch>,
    ) {
        let logger = SessionLogger::new(epoch);
        let mut session = self.session();
        if !session.is_current(epoch) {
            logger.log_stale(seq, "session ended");
            metrics::record_stale_response("session");
            return;
        }

        match result {
            Ok(batch) => {
                if self.config.ordering == ResponseOrdering::LatestIssued && seq < session.applied {
                    logger.log_stale(seq, "superseded");
                    metrics::record_stale_response("superseded");
                    return;
                }
                session.applied = session.applied.max(seq);

                let count = batch.len();
                let overlay = self.renderer.render(&batch, frame.width, frame.height);
                let summary = batch.summary();
                lock(&self.history).record(&batch);
                self.announcer.consider(&batch);
                self.snapshot.send_modify(|s| {
                    s.batch = batch;
                    s.summary = summary;
                    s.overlay = Some(overlay);
                    s.frame = Some(frame.clone());
                    s.frames_rendered += 1;
                    s.last_error = None;
                });
                drop(session);

                lock(&self.failures).record_success();
                metrics::record_batch_applied(count);
                logger.log_applied(seq, count);

                if self.config.refresh_stats {
                    self.refresh_stats(epoch);
                }
            }
            Err(e) => {
                // Displayed detections stay as they were.
                self.snapshot.send_modify(|s| s.last_error = Some(e.to_string()));
                drop(session);

                metrics::record_detection_failure(failure_kind(&e));
                if lock(&self.failures).record_failure() {
                    logger.log_failure(seq, &e);
                }
            }
        }
    }

    fn refresh_stats(self: &Arc<Self>, epoch: u64) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            match shared.detector.stats().await {
                Ok(Some(stats)) => {
                    let session = shared.session();
                    if session.is_current(epoch) {
                        shared.snapshot.send_modify(|s| s.stats = Some(stats));
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Stats refresh failed: {}", e),
            }
        });
    }
}

/// Orchestrates capture, detection, overlay rendering and announcements.
pub struct DetectionLoop {
    shared: Arc<Shared>,
    timers: Mutex<Vec<RepeatingTask>>,
}

impl DetectionLoop {
    pub fn new(
        config: LiveConfig,
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn Detector>,
        renderer: OverlayRenderer,
        announcer: AnnouncementEngine,
    ) -> LiveResult<Self> {
        config.validate()?;
        announcer.set_enabled(config.voice_enabled);
        let (snapshot, _) = watch::channel(LiveSnapshot::default());
        let history = DetectionHistory::new(config.history_limit);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                source,
                detector,
                renderer,
                announcer,
                session: Mutex::new(LoopSession::default()),
                history: Mutex::new(history),
                failures: Mutex::new(FailureTracker::new(MAX_LOGGED_FAILURES)),
                snapshot,
            }),
            timers: Mutex::new(Vec::new()),
        })
    }

    /// Start a session. Returns `false` (and does nothing) if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut timers = lock(&self.timers);
        let epoch = {
            let mut session = self.shared.session();
            if session.running {
                debug!("Live detection already running");
                return false;
            }
            session.running = true;
            session.epoch += 1;
            session.issued = 0;
            session.applied = 0;
            session.meter.reset();

            let epoch = session.epoch;
            self.shared.snapshot.send_modify(|s| {
                s.running = true;
                s.session = epoch;
                s.fps = 0;
                s.last_error = None;
            });
            epoch
        };

        let config = &self.shared.config;
        let capture = {
            let shared = Arc::clone(&self.shared);
            RepeatingTask::spawn("capture", config.capture_interval, move || shared.capture_tick())
        };
        let measure = {
            let shared = Arc::clone(&self.shared);
            RepeatingTask::spawn_after(
                "measure",
                config.measure_interval + MEASURE_LAG,
                config.measure_interval,
                move || shared.measure_tick(),
            )
        };
        *timers = vec![capture, measure];

        SessionLogger::new(epoch).log_start(
            config.capture_interval.as_millis() as u64,
            config.measure_interval.as_millis() as u64,
        );
        true
    }

    /// Stop the session. Returns `false` (and does nothing) if not running.
    ///
    /// Timers are cancelled, fps and displayed detections are cleared and
    /// any pending announcement is dropped. In-flight requests are left to
    /// finish but their results are discarded.
    pub fn stop(&self) -> bool {
        let mut timers = lock(&self.timers);
        let epoch = {
            let mut session = self.shared.session();
            if !session.running {
                debug!("Live detection not running");
                return false;
            }
            session.running = false;
            session.meter.reset();
            timers.clear();

            self.shared.snapshot.send_modify(|s| {
                s.running = false;
                s.fps = 0;
                s.batch = DetectionBatch::empty();
                s.summary = DetectionSummary::default();
                s.overlay = None;
                s.frame = None;
            });
            session.epoch
        };

        self.shared.announcer.reset();
        lock(&self.shared.failures).reset();
        metrics::set_fps(0);
        SessionLogger::new(epoch).log_stop();
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.session().running
    }

    /// Last measured frames-per-second (0 when stopped).
    pub fn fps(&self) -> u32 {
        self.shared.session().meter.fps()
    }

    pub fn session(&self) -> LoopSession {
        self.shared.session().clone()
    }

    /// Run one capture tick now (normally driven by the capture timer).
    pub fn capture_tick(&self) {
        self.shared.capture_tick();
    }

    /// Run one measurement tick now (normally driven by the measure timer).
    pub fn measure_tick(&self) {
        self.shared.measure_tick();
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Recent applied batches, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.shared.history).entries().cloned().collect()
    }

    pub fn announcer(&self) -> &AnnouncementEngine {
        &self.shared.announcer
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.shared.announcer.set_enabled(enabled);
    }

    pub fn config(&self) -> &LiveConfig {
        &self.shared.config
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
