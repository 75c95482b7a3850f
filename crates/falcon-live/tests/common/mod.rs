//! Shared fixtures for live loop tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use falcon_client::{Detector, TransportError, TransportResult};
use falcon_live::{
    AnnouncementEngine, DetectionLoop, FrameSource, LiveConfig, SpeechResult, SpeechSink,
    StillImageSource, Utterance,
};
use falcon_models::{BoundingBox, Detection, DetectionBatch, Frame};
use falcon_overlay::OverlayRenderer;
use image::DynamicImage;

pub const FRAME_W: u32 = 640;
pub const FRAME_H: u32 = 480;

pub fn batch(labels: &[&str]) -> DetectionBatch {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let x = 20.0 + 60.0 * i as f64;
            Detection::new(*label, 3, 0.8, BoundingBox::new(x, 100.0, x + 50.0, 200.0))
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn labels(batch: &DetectionBatch) -> Vec<String> {
    batch.iter().map(|d| d.class_label.clone()).collect()
}

pub enum Step {
    Respond(Duration, DetectionBatch),
    Fail(Duration),
}

pub fn ok_after(ms: u64, labels: &[&str]) -> Step {
    Step::Respond(Duration::from_millis(ms), batch(labels))
}

pub fn fail_after(ms: u64) -> Step {
    Step::Fail(Duration::from_millis(ms))
}

/// Answers calls in script order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedDetector {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, frame: &Frame) -> TransportResult<DetectionBatch> {
        assert_eq!((frame.width, frame.height), (FRAME_W, FRAME_H));
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(delay, batch)) => {
                tokio::time::sleep(delay).await;
                Ok(batch)
            }
            Some(Step::Fail(delay)) => {
                tokio::time::sleep(delay).await;
                Err(TransportError::Status {
                    status: 503,
                    body: "Model not loaded".into(),
                })
            }
            None => Err(TransportError::invalid_response("script exhausted")),
        }
    }

    async fn stats(&self) -> TransportResult<Option<serde_json::Value>> {
        Ok(Some(serde_json::json!({ "total_predictions": self.calls() })))
    }
}

/// Records utterances instead of playing them.
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechSink for RecordingSpeech {
    fn speak(&self, utterance: &Utterance) -> SpeechResult<()> {
        self.spoken.lock().unwrap().push(utterance.text.clone());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn still_source() -> Arc<StillImageSource> {
    let img = DynamicImage::new_rgb8(FRAME_W, FRAME_H);
    Arc::new(StillImageSource::from_image(&img, 80).unwrap())
}

pub fn build_loop(
    config: LiveConfig,
    detector: Arc<ScriptedDetector>,
    speech: Option<Arc<RecordingSpeech>>,
) -> DetectionLoop {
    build_loop_from(config, still_source(), detector, speech)
}

pub fn build_loop_from(
    config: LiveConfig,
    source: Arc<dyn FrameSource>,
    detector: Arc<ScriptedDetector>,
    speech: Option<Arc<RecordingSpeech>>,
) -> DetectionLoop {
    let speech = speech.map(|s| s as Arc<dyn SpeechSink>);
    let announcer = AnnouncementEngine::new(config.settle_window, config.voice.clone(), speech);
    DetectionLoop::new(
        config,
        source,
        detector,
        OverlayRenderer::default(),
        announcer,
    )
    .expect("valid loop config")
}

pub async fn advance_to(ms: u64, start: tokio::time::Instant) {
    tokio::time::sleep_until(start + Duration::from_millis(ms)).await;
}
